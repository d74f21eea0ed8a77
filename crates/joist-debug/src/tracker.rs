use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};

use joist_build_model::{
    BuildModel, ContextRef, ProjectRef, PropertyTable, SourceLocation, TargetRef, TaskRef,
};

use crate::breakpoints::BreakpointSet;
use crate::events::{DebugListener, NullListener, ResumeMode, SuspendReason};
use crate::location::{self, LocationMode};

/// Task names that spawn a nested build. Stepping over any other task must
/// treat these as atomic when they finish underneath the step.
const COMPOSITE_TASK_NAMES: [&str; 2] = ["ant", "antcall"];

fn is_composite(name: &str) -> bool {
    COMPOSITE_TASK_NAMES.contains(&name)
}

/// Debug-side state machine for one build execution.
///
/// The build engine drives the lifecycle methods from its single build
/// thread; the debugger's command handler calls the resume/step/breakpoint
/// methods from its own thread. One mutex guards all mutable state, paired
/// with a condition variable that parks the build thread while suspended.
///
/// Construct a fresh tracker per build invocation; nothing survives
/// `build_finished` except the registered breakpoints.
pub struct BuildDebugTracker<M> {
    model: M,
    listener: Box<dyn DebugListener>,
    state: Mutex<TrackerState>,
    wake: Condvar,
}

pub(crate) struct TrackerState {
    pub(crate) location_mode: LocationMode,

    /// Live call stack; last element is the innermost task.
    pub(crate) frames: Vec<TaskRef>,
    /// Runtime contexts captured before their frame expires.
    contexts: HashMap<TaskRef, ContextRef>,
    pub(crate) current_task: Option<TaskRef>,
    last_task_finished: Option<TaskRef>,
    pub(crate) is_after_task_event: bool,
    consider_target_breakpoints: bool,

    pub(crate) targets_executing: Vec<TargetRef>,
    pub(crate) targets_to_execute: Vec<TargetRef>,
    /// Scheduled target names not yet consumed, per project. Key presence
    /// marks the project's schedule as already discovered.
    pending_targets: HashMap<ProjectRef, VecDeque<String>>,
    pub(crate) build_sequences: HashMap<ProjectRef, HashMap<TargetRef, Vec<TargetRef>>>,

    pub(crate) initial_properties: Option<PropertyTable>,
    pub(crate) last_sent_properties: Option<PropertyTable>,

    step_over_task: Option<TaskRef>,
    step_into_task: Option<TaskRef>,
    should_suspend: bool,
    client_suspend: bool,
    step_into_suspend: bool,
    suspended: bool,

    breakpoints: BreakpointSet,
    target_breakpoints_enabled: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            location_mode: LocationMode::default(),
            frames: Vec::new(),
            contexts: HashMap::new(),
            current_task: None,
            last_task_finished: None,
            is_after_task_event: false,
            consider_target_breakpoints: false,
            targets_executing: Vec::new(),
            targets_to_execute: Vec::new(),
            pending_targets: HashMap::new(),
            build_sequences: HashMap::new(),
            initial_properties: None,
            last_sent_properties: None,
            step_over_task: None,
            step_into_task: None,
            should_suspend: false,
            client_suspend: false,
            step_into_suspend: false,
            suspended: false,
            breakpoints: BreakpointSet::default(),
            target_breakpoints_enabled: true,
        }
    }
}

impl TrackerState {
    /// Reset to idle, keeping what belongs to the debugging session rather
    /// than to one build (breakpoints and their enablement).
    fn reset(&mut self) {
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let target_breakpoints_enabled = self.target_breakpoints_enabled;
        *self = Self::default();
        self.breakpoints = breakpoints;
        self.target_breakpoints_enabled = target_breakpoints_enabled;
    }

    fn target_to_execute(&self) -> Option<TargetRef> {
        self.targets_to_execute.last().copied()
    }

    /// `Some` pushes a new pointer (entering a schedule position or a nested
    /// project scope); `None` pops back to the enclosing scope.
    fn set_target_to_execute(&mut self, target: Option<TargetRef>) {
        match target {
            Some(target) => self.targets_to_execute.push(target),
            None => {
                self.targets_to_execute.pop();
            }
        }
    }
}

impl<M: BuildModel> BuildDebugTracker<M> {
    pub fn new(model: M) -> Self {
        Self::with_listener(model, NullListener)
    }

    pub fn with_listener(model: M, listener: impl DebugListener + 'static) -> Self {
        Self {
            model,
            listener: Box::new(listener),
            state: Mutex::new(TrackerState::default()),
            wake: Condvar::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub(crate) fn state_guard(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().expect("debug tracker lock poisoned")
    }

    // ---- lifecycle events (build thread) ----

    pub fn build_started(&self) {
        {
            let mut state = self.state_guard();
            state.reset();
            state.location_mode = if self.model.supports_source_locations() {
                LocationMode::Direct
            } else {
                LocationMode::Legacy
            };
        }
        tracing::debug!("build started");
        self.listener.build_started();
    }

    pub fn target_started(&self, target: TargetRef, project: ProjectRef) {
        {
            let mut state = self.state_guard();
            state.is_after_task_event = false;

            if !state.pending_targets.contains_key(&project) {
                let scheduled = self.model.scheduled_targets(project);
                if !scheduled.is_empty() {
                    let mut sequences = HashMap::new();
                    for name in &scheduled {
                        if let Some(scheduled_target) = self.model.target_by_name(project, name) {
                            sequences.insert(scheduled_target, self.model.topo_sort(project, name));
                        }
                    }
                    state.build_sequences.insert(project, sequences);

                    let mut queue: VecDeque<String> = scheduled.into();
                    let first = queue
                        .pop_front()
                        .and_then(|name| self.model.target_by_name(project, &name));
                    state.set_target_to_execute(first);
                    state.pending_targets.insert(project, queue);
                }
            }

            state.targets_executing.push(target);

            if state.target_to_execute() == Some(target) {
                // The target that was blocking execution has started; the
                // next scheduled target moves up.
                let next = state
                    .pending_targets
                    .get_mut(&project)
                    .and_then(|queue| queue.pop_front())
                    .and_then(|name| self.model.target_by_name(project, &name));
                state.set_target_to_execute(next);
            }

            state.consider_target_breakpoints = true;
        }
        self.wait_if_suspended();
    }

    pub fn task_started(&self, task: TaskRef) {
        {
            let mut state = self.state_guard();
            state.is_after_task_event = true;

            // Covers implicit top-level targets that never report a
            // target_started.
            if state.initial_properties.is_none() {
                if let Some(project) = self.model.task_project(task) {
                    state.initial_properties = Some(self.model.properties(project));
                }
            }

            state.current_task = Some(task);
            state.consider_target_breakpoints = false;

            // The parent's runtime context is only retrievable while the
            // parent is still executing; capture it before it expires.
            if let Some(&parent) = state.frames.last() {
                if !state.contexts.contains_key(&parent) {
                    if let Some(context) = self.model.task_runtime_context(parent) {
                        state.contexts.insert(parent, context);
                    }
                }
            }

            state.frames.push(task);
        }
        self.wait_if_suspended();
    }

    pub fn task_finished(&self) {
        {
            let mut state = self.state_guard();
            let Some(finished) = state.frames.pop() else {
                // Tolerate a spurious or duplicate event.
                return;
            };
            state.last_task_finished = Some(finished);
            state.current_task = None;
            let context = state.contexts.remove(&finished);

            if let Some(step_over) = state.step_over_task {
                let finished_composite = self
                    .model
                    .task_name(finished)
                    .is_some_and(|name| is_composite(&name));
                let over_composite = self
                    .model
                    .task_name(step_over)
                    .is_some_and(|name| is_composite(&name));
                if finished_composite && !over_composite {
                    // Stepping over a plain task must not land inside a
                    // nested build that finished underneath it.
                    state.should_suspend = true;
                } else if context.is_some_and(|c| self.model.context_is_macro_expansion(c)) {
                    state.should_suspend = true;
                }
            }
        }
        self.wait_if_suspended();
    }

    pub fn build_finished(&self) {
        {
            let mut state = self.state_guard();
            state.reset();
        }
        self.wake.notify_all();
        tracing::debug!("build finished");
        self.listener.build_finished();
    }

    // ---- commands (debugger thread) ----

    pub fn resume(&self) {
        let was_suspended = {
            let mut state = self.state_guard();
            let was = state.suspended;
            state.suspended = false;
            state.client_suspend = false;
            was
        };
        self.wake.notify_all();
        if was_suspended {
            self.listener.resumed(ResumeMode::ClientRequest);
        }
    }

    /// Ask the build to park at the next checkpoint.
    pub fn suspend(&self) {
        self.state_guard().client_suspend = true;
    }

    pub fn step_over(&self) {
        let was_suspended = {
            let mut state = self.state_guard();
            state.step_over_task = state.current_task;
            if state.current_task.is_none() {
                // Stepping from a target-level suspension; park again at the
                // next checkpoint.
                state.should_suspend = true;
            }
            let was = state.suspended;
            state.suspended = false;
            was
        };
        self.wake.notify_all();
        if was_suspended {
            self.listener.resumed(ResumeMode::Step);
        }
    }

    pub fn step_into(&self) {
        let was_suspended = {
            let mut state = self.state_guard();
            state.step_into_task = state.current_task;
            state.step_into_suspend = true;
            let was = state.suspended;
            state.suspended = false;
            was
        };
        self.wake.notify_all();
        if was_suspended {
            self.listener.resumed(ResumeMode::Step);
        }
    }

    pub fn add_breakpoint(&self, file: &str, line: u32) {
        self.state_guard().breakpoints.add(file, line);
    }

    pub fn remove_breakpoint(&self, file: &str, line: u32) -> bool {
        self.state_guard().breakpoints.remove(file, line)
    }

    pub fn set_target_breakpoints_enabled(&self, enabled: bool) {
        self.state_guard().target_breakpoints_enabled = enabled;
    }

    // ---- queries ----

    /// Where a suspension would be reported right now, if anywhere.
    ///
    /// Task granularity wins over target granularity whenever both are
    /// plausible.
    pub fn breakpoint_location(&self) -> Option<SourceLocation> {
        let state = self.state_guard();
        self.breakpoint_location_locked(&state)
    }

    pub fn current_task(&self) -> Option<TaskRef> {
        self.state_guard().current_task
    }

    pub fn last_task_finished(&self) -> Option<TaskRef> {
        self.state_guard().last_task_finished
    }

    pub fn step_into_task(&self) -> Option<TaskRef> {
        self.state_guard().step_into_task
    }

    pub fn call_stack(&self) -> Vec<TaskRef> {
        self.state_guard().frames.clone()
    }

    pub fn stack_depth(&self) -> usize {
        self.state_guard().frames.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.state_guard().suspended
    }

    /// Baseline table of the last property delta sent to the client.
    pub fn last_sent_properties(&self) -> Option<PropertyTable> {
        self.state_guard().last_sent_properties.clone()
    }

    pub fn initial_properties(&self) -> Option<PropertyTable> {
        self.state_guard().initial_properties.clone()
    }

    pub fn breakpoint_count(&self) -> usize {
        self.state_guard().breakpoints.len()
    }

    // ---- suspension machinery ----

    fn breakpoint_location_locked(&self, state: &TrackerState) -> Option<SourceLocation> {
        if state.is_after_task_event {
            if let Some(task) = state.current_task {
                return Some(location::task_location(&self.model, state.location_mode, task));
            }
        }
        if state.consider_target_breakpoints && state.target_breakpoints_enabled {
            if let Some(&target) = state.targets_executing.last() {
                return Some(location::target_location(
                    &self.model,
                    state.location_mode,
                    target,
                ));
            }
        }
        None
    }

    /// Checkpoint called on the build thread after every lifecycle mutation.
    /// Decides whether to park and, if so, blocks until released.
    fn wait_if_suspended(&self) {
        let mut state = self.state_guard();
        let Some(reason) = self.pending_suspend_reason(&mut state) else {
            return;
        };
        state.suspended = true;
        drop(state);

        tracing::debug!(?reason, "build suspended");
        self.listener.suspended(reason);

        let mut state = self.state_guard();
        while state.suspended {
            state = self
                .wake
                .wait(state)
                .expect("debug tracker lock poisoned");
        }
    }

    fn pending_suspend_reason(&self, state: &mut TrackerState) -> Option<SuspendReason> {
        if let Some(location) = self.breakpoint_location_locked(state) {
            if state.breakpoints.matches(&location) {
                return Some(SuspendReason::Breakpoint(location));
            }
        }

        if state.current_task.is_some() {
            if state.step_into_suspend {
                state.step_into_suspend = false;
                return Some(SuspendReason::Step);
            }
            let step_over_done = state.last_task_finished.is_some()
                && state.last_task_finished == state.step_over_task;
            if step_over_done || state.should_suspend {
                state.should_suspend = false;
                state.step_over_task = None;
                return Some(SuspendReason::Step);
            }
        } else if state.should_suspend {
            state.should_suspend = false;
            state.step_over_task = None;
            return Some(SuspendReason::Step);
        }

        if state.client_suspend {
            state.client_suspend = false;
            return Some(SuspendReason::ClientRequest);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_names_cover_nested_build_tasks_only() {
        assert!(is_composite("ant"));
        assert!(is_composite("antcall"));
        assert!(!is_composite("macrodef"));
        assert!(!is_composite("echo"));
    }
}
