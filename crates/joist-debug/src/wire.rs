//! Delimited wire format sent to the remote debugger client.
//!
//! Two message kinds leave this module: a `stack` message rendering the full
//! call chain (with synthetic frames for targets that will run because they
//! depend on what is currently running) and a `properties` message carrying
//! the delta of properties first seen since the previous send.

use joist_build_model::{BuildModel, ProjectRef, SourceLocation, TargetRef};

use crate::location;
use crate::properties;
use crate::tracker::{BuildDebugTracker, TrackerState};

/// Field delimiter of every outbound message.
pub const MSG_SEP: char = ',';
/// Tag of a call-stack message.
pub const STACK: &str = "stack";
/// Tag of a property-delta message.
pub const PROPERTIES: &str = "properties";

impl<M: BuildModel> BuildDebugTracker<M> {
    /// Render the current call chain as a `stack` message.
    ///
    /// Frames run innermost to outermost. A suspension at a target boundary
    /// (not after a task event) contributes one frame for the executing
    /// target itself, with an empty task field. Missing sequence or
    /// dependency data renders nothing for the affected frames; a partial
    /// trace beats failing the build.
    pub fn marshal_stack(&self) -> String {
        let state = self.state_guard();
        let mut out = String::new();
        out.push_str(STACK);
        out.push(MSG_SEP);

        let target_to_execute = state.targets_to_execute.last().copied();
        let target_executing = state.targets_executing.last().copied();

        let mut project_marker: Option<ProjectRef> = None;
        if !state.is_after_task_event {
            if let Some(target) = target_executing {
                let name = self.model().target_name(target).unwrap_or_default();
                let location =
                    location::target_location(self.model(), state.location_mode, target);
                append_frame(&mut out, &name, "", &location);
                project_marker = self.model().target_project(target);
            }
        } else if let Some(&innermost) = state.frames.last() {
            project_marker = self.model().task_project(innermost);
        }

        for &task in state.frames.iter().rev() {
            let project = self.model().task_project(task);
            if project != project_marker {
                // Crossed a sub-build boundary; render the outgoing
                // project's dependency frames first.
                self.append_dependency_frames(
                    &mut out,
                    &state,
                    target_to_execute,
                    target_executing,
                );
                project_marker = project;
            }

            let target_name = self
                .model()
                .task_owning_target(task)
                .and_then(|target| self.model().target_name(target))
                .unwrap_or_default();
            let task_name = self.model().task_name(task).unwrap_or_default();
            let location = location::task_location(self.model(), state.location_mode, task);
            append_frame(&mut out, &target_name, &task_name, &location);
        }

        self.append_dependency_frames(&mut out, &state, target_to_execute, target_executing);
        out
    }

    /// Synthetic frames for the targets scheduled between "executing" and
    /// "to execute" that depend on the executing target.
    fn append_dependency_frames(
        &self,
        out: &mut String,
        state: &TrackerState,
        target_to_execute: Option<TargetRef>,
        target_executing: Option<TargetRef>,
    ) {
        let (Some(to_execute), Some(executing)) = (target_to_execute, target_executing) else {
            return;
        };
        let Some(project) = self.model().target_project(to_execute) else {
            return;
        };
        let Some(sequence) = state
            .build_sequences
            .get(&project)
            .and_then(|sequences| sequences.get(&to_execute))
        else {
            return;
        };
        let Some(executing_name) = self.model().target_name(executing) else {
            return;
        };

        let start = sequence
            .iter()
            .position(|&t| t == executing)
            .map_or(0, |p| p + 1);
        let Some(end) = sequence.iter().position(|&t| t == to_execute) else {
            return;
        };

        for &candidate in sequence.iter().take(end + 1).skip(start) {
            if self.model().target_depends_on(candidate, &executing_name) {
                let name = self.model().target_name(candidate).unwrap_or_default();
                let location =
                    location::target_location(self.model(), state.location_mode, candidate);
                append_frame(out, &name, "", &location);
            }
        }
    }

    /// Render properties first seen since the last send as a `properties`
    /// message, updating the baseline. Returns an empty string when there is
    /// nothing to report: no frame context, or an unchanged table size
    /// (same-size value replacement is deliberately not detected).
    pub fn marshal_properties(&self, escape_line_sep: bool) -> String {
        let mut state = self.state_guard();
        let Some(&innermost) = state.frames.last() else {
            return String::new();
        };
        let Some(project) = self.model().task_project(innermost) else {
            return String::new();
        };

        let current = self.model().properties(project);
        if state
            .last_sent_properties
            .as_ref()
            .is_some_and(|last| last.len() == current.len())
        {
            return String::new();
        }

        let user = self.model().user_properties(project);
        let initial = state.initial_properties.clone().unwrap_or_default();

        let mut out = String::from(PROPERTIES);
        for (name, value) in &current {
            if state
                .last_sent_properties
                .as_ref()
                .is_some_and(|last| last.contains_key(name))
            {
                continue;
            }
            let kind = properties::classify(&initial, &user, name);
            let name = maybe_escape(name, escape_line_sep);
            let value = maybe_escape(value, escape_line_sep);

            for field in [
                name.len().to_string(),
                name,
                value.len().to_string(),
                value,
                kind.code().to_string(),
            ] {
                out.push(MSG_SEP);
                out.push_str(&field);
            }
        }

        state.last_sent_properties = Some(current);
        out
    }
}

fn append_frame(out: &mut String, target_name: &str, task_name: &str, location: &SourceLocation) {
    let line = location.line.to_string();
    for field in [target_name, task_name, location.file_name(), line.as_str()] {
        out.push_str(field);
        out.push(MSG_SEP);
    }
}

fn maybe_escape(value: &str, escape_line_sep: bool) -> String {
    if escape_line_sep {
        escape_line_breaks(value)
    } else {
        value.to_string()
    }
}

/// Escape line breaks so property values cannot corrupt the line-oriented
/// transport: `\n` and `\r` characters become the two-character sequences
/// `\n` / `\r`, and a literal backslash directly before `n` or `r` is
/// doubled so [`unescape_line_breaks`] can tell the cases apart.
pub fn escape_line_breaks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' if matches!(chars.peek(), Some('n') | Some('r')) => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape_line_breaks`].
pub fn unescape_line_breaks(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' {
            if i + 2 < chars.len() && chars[i + 1] == '\\' && matches!(chars[i + 2], 'n' | 'r') {
                out.push('\\');
                out.push(chars[i + 2]);
                i += 3;
                continue;
            }
            if i + 1 < chars.len() && chars[i + 1] == 'n' {
                out.push('\n');
                i += 2;
                continue;
            }
            if i + 1 < chars.len() && chars[i + 1] == 'r' {
                out.push('\r');
                i += 2;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}
