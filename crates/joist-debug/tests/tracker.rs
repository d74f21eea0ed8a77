//! Scenario tests driving the tracker through scripted build lifecycles.

use joist_build_model::{ScriptedBuild, SourceLocation};
use joist_debug::BuildDebugTracker;
use pretty_assertions::assert_eq;

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("build.xml", line)
}

#[test]
fn call_stack_mirrors_open_task_events() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(5));
    let javac = build.add_task(main, "javac", loc(6));
    let echo = build.add_task(main, "echo", loc(7));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);

    tracker.task_started(copy);
    tracker.task_started(javac);
    assert_eq!(tracker.call_stack(), vec![copy, javac]);

    tracker.task_finished();
    assert_eq!(tracker.call_stack(), vec![copy]);
    assert_eq!(tracker.last_task_finished(), Some(javac));
    assert_eq!(tracker.current_task(), None);

    tracker.task_started(echo);
    assert_eq!(tracker.call_stack(), vec![copy, echo]);

    tracker.task_finished();
    tracker.task_finished();
    assert_eq!(tracker.stack_depth(), 0);

    // A spurious extra event is tolerated.
    tracker.task_finished();
    assert_eq!(tracker.stack_depth(), 0);
}

#[test]
fn target_sequences_are_computed_once_per_project() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let init = build.add_target(project, "init", loc(2), &[]);
    let compile = build.add_target(project, "compile", loc(5), &["init"]);
    build.schedule(project, &["compile"]);

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();

    tracker.target_started(init, project);
    let calls = tracker.model().topo_sort_calls();
    assert_eq!(calls, 1);

    tracker.target_started(compile, project);
    assert_eq!(tracker.model().topo_sort_calls(), calls);
}

#[test]
fn task_location_wins_over_target_location() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(9));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();

    tracker.target_started(main, project);
    assert_eq!(tracker.breakpoint_location(), Some(loc(4)));

    tracker.task_started(copy);
    assert_eq!(tracker.breakpoint_location(), Some(loc(9)));

    tracker.task_finished();
    // Neither a task nor a considered target: no valid suspend point.
    assert_eq!(tracker.breakpoint_location(), None);
}

#[test]
fn property_deltas_report_new_keys_only() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(5));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);
    tracker.task_started(copy);

    tracker.model().set_property(project, "alpha", "1");
    assert_eq!(tracker.marshal_properties(true), "properties,5,alpha,1,1,2");

    tracker.model().set_property(project, "beta", "2");
    assert_eq!(tracker.marshal_properties(true), "properties,4,beta,1,2,2");

    // Same-size value replacement goes undetected: the diff short-circuits
    // on table size.
    tracker.model().set_property(project, "beta", "99");
    assert_eq!(tracker.marshal_properties(true), "");
}

#[test]
fn properties_are_classified_against_initial_and_user_tables() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(5));
    build.set_property(project, "os.name", "linux");
    build.set_user_property(project, "release", "true");

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);
    // The initial snapshot is captured here, before any runtime property
    // shows up.
    tracker.task_started(copy);

    assert_eq!(
        tracker.marshal_properties(true),
        "properties,7,os.name,5,linux,0,7,release,4,true,1"
    );

    tracker.model().set_property(project, "tstamp", "now");
    assert_eq!(tracker.marshal_properties(true), "properties,6,tstamp,3,now,2");
}

#[test]
fn property_values_with_line_breaks_are_escaped_on_request() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(5));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);
    tracker.task_started(copy);

    tracker.model().set_property(project, "banner", "a\nb");
    assert_eq!(tracker.marshal_properties(true), "properties,6,banner,4,a\\nb,2");
}

#[test]
fn marshals_stack_across_target_transitions() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let t1 = build.add_target(project, "T1", loc(5), &[]);
    let t2 = build.add_target(project, "T2", loc(8), &["T1"]);
    build.schedule(project, &["T1", "T2"]);
    let task_a = build.add_task(t1, "taskA", loc(10));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(t1, project);
    tracker.task_started(task_a);

    // T2 depends on the executing target, so it renders as a synthetic
    // frame below the live one.
    assert_eq!(
        tracker.marshal_stack(),
        "stack,T1,taskA,build.xml,10,T2,,build.xml,8,"
    );

    tracker.task_finished();
    tracker.target_started(t2, project);

    // Suspended at a target boundary: the target itself is the only frame.
    assert_eq!(tracker.marshal_stack(), "stack,T2,,build.xml,8,");

    tracker.build_finished();
    assert_eq!(tracker.stack_depth(), 0);
    assert_eq!(tracker.current_task(), None);
    assert_eq!(tracker.last_task_finished(), None);
    assert_eq!(tracker.last_sent_properties(), None);
    assert_eq!(tracker.initial_properties(), None);
}

#[test]
fn dependency_frames_cover_only_the_pending_slice() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let t1 = build.add_target(project, "T1", loc(3), &[]);
    let _t2 = build.add_target(project, "T2", loc(6), &["T1"]);
    let _t3 = build.add_target(project, "T3", loc(9), &["T2"]);
    build.schedule(project, &["T1", "T2", "T3"]);

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(t1, project);

    // Pending pointer sits at T2; T3 is beyond it and stays out of the
    // trace even though it transitively depends on T1.
    assert_eq!(
        tracker.marshal_stack(),
        "stack,T1,,build.xml,3,T2,,build.xml,6,"
    );
}

#[test]
fn sub_build_frames_switch_projects_in_the_trace() {
    let build = ScriptedBuild::new();
    let outer = build.add_project();
    let main = build.add_target(outer, "main", loc(3), &[]);
    build.schedule(outer, &["main"]);
    let ant = build.add_task(main, "ant", loc(5));

    let sub = build.add_project();
    let inner = build.add_target(sub, "inner", SourceLocation::new("sub.xml", 2), &[]);
    let echo = build.add_task(inner, "echo", SourceLocation::new("sub.xml", 4));

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, outer);
    tracker.task_started(ant);
    tracker.target_started(inner, sub);
    tracker.task_started(echo);

    assert_eq!(
        tracker.marshal_stack(),
        "stack,inner,echo,sub.xml,4,main,ant,build.xml,5,"
    );
}

#[test]
fn legacy_location_strings_feed_the_stack() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(9));
    build.use_legacy_locations();

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);
    tracker.task_started(copy);

    assert_eq!(tracker.breakpoint_location(), Some(loc(9)));
    assert_eq!(tracker.marshal_stack(), "stack,main,copy,build.xml,9,");
}

#[test]
fn unparsable_legacy_locations_degrade_to_line_zero() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(9));
    build.use_legacy_locations();
    build.set_task_legacy_location(copy, "build.xml: mangled: ");

    let tracker = BuildDebugTracker::new(build);
    tracker.build_started();
    tracker.target_started(main, project);
    tracker.task_started(copy);

    assert_eq!(
        tracker.breakpoint_location(),
        Some(SourceLocation {
            file: Some("build.xml".to_string()),
            line: 0,
        })
    );
}

#[test]
fn build_finished_clears_state_but_keeps_breakpoints() {
    let build = ScriptedBuild::new();
    let project = build.add_project();
    let main = build.add_target(project, "main", loc(4), &[]);
    let copy = build.add_task(main, "copy", loc(5));

    let tracker = BuildDebugTracker::new(build);
    tracker.add_breakpoint("build.xml", 99);
    tracker.build_started();
    tracker.target_started(main, project);
    tracker.task_started(copy);
    tracker.model().set_property(project, "alpha", "1");
    let _ = tracker.marshal_properties(false);

    tracker.build_finished();

    assert_eq!(tracker.stack_depth(), 0);
    assert_eq!(tracker.current_task(), None);
    assert_eq!(tracker.last_task_finished(), None);
    assert_eq!(tracker.last_sent_properties(), None);
    assert_eq!(tracker.initial_properties(), None);
    assert_eq!(tracker.breakpoint_location(), None);
    assert_eq!(tracker.breakpoint_count(), 1);
}
