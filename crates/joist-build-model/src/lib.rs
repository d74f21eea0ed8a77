//! Read-only surface of a target/task build engine, as seen by the debug
//! tracker.
//!
//! The engine owns the live object graph (projects, targets, tasks); this
//! crate only defines opaque references into that graph plus the accessor
//! trait ([`BuildModel`]) the tracker queries through. A deterministic
//! in-memory implementation ([`ScriptedBuild`]) is exported for downstream
//! tests.

mod scripted;

use std::collections::BTreeMap;

pub use scripted::ScriptedBuild;

/// Opaque reference to a project (one per build file; nested sub-builds each
/// introduce a fresh one).
pub type ProjectRef = u64;
/// Opaque reference to a declared target.
pub type TargetRef = u64;
/// Opaque reference to a live task invocation.
pub type TaskRef = u64;
/// Opaque handle to the runtime context the engine may attach to a task.
///
/// Only valid while the task is on the call stack; consumers must capture it
/// before the task finishes.
pub type ContextRef = u64;

/// Complete key/value property table of a project.
pub type PropertyTable = BTreeMap<String, String>;

/// A position in a build file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    /// Build file the element was declared in, if known.
    pub file: Option<String>,
    /// 1-based line number, `0` if unknown.
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: None,
            line: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_none() && self.line == 0
    }

    /// File name for display/wire purposes; empty when unknown.
    pub fn file_name(&self) -> &str {
        self.file.as_deref().unwrap_or("")
    }
}

/// Accessor trait over the engine's live object graph.
///
/// All methods are lookups against engine-owned state; a reference that the
/// engine no longer knows about answers `None`. Engines predating direct
/// source-location queries report `supports_source_locations() == false` and
/// serve the colon-delimited legacy strings instead (`"file: line: "`).
pub trait BuildModel: Send + Sync {
    fn task_name(&self, task: TaskRef) -> Option<String>;
    fn task_owning_target(&self, task: TaskRef) -> Option<TargetRef>;
    fn task_project(&self, task: TaskRef) -> Option<ProjectRef>;
    fn task_location(&self, task: TaskRef) -> Option<SourceLocation>;
    fn task_location_legacy(&self, _task: TaskRef) -> Option<String> {
        None
    }

    /// Runtime context the engine attached to the task, if any.
    ///
    /// Retrievable only while the task executes; callers cache the handle.
    fn task_runtime_context(&self, _task: TaskRef) -> Option<ContextRef> {
        None
    }

    /// Whether a captured runtime context stands for an expanded macro body.
    fn context_is_macro_expansion(&self, _context: ContextRef) -> bool {
        false
    }

    fn target_name(&self, target: TargetRef) -> Option<String>;
    fn target_project(&self, target: TargetRef) -> Option<ProjectRef>;
    fn target_location(&self, target: TargetRef) -> Option<SourceLocation>;
    fn target_location_legacy(&self, _target: TargetRef) -> Option<String> {
        None
    }

    /// Whether `target` declares a direct dependency on the target named
    /// `dependency`.
    fn target_depends_on(&self, target: TargetRef, dependency: &str) -> bool;

    fn target_by_name(&self, project: ProjectRef, name: &str) -> Option<TargetRef>;

    /// The ordered list of target names the engine was asked to run for this
    /// project. Empty until the engine has registered the list.
    fn scheduled_targets(&self, project: ProjectRef) -> Vec<String>;

    /// Full dependency-ordered execution sequence for the named target; the
    /// named target is the last element. Empty when the target is unknown.
    fn topo_sort(&self, project: ProjectRef, target: &str) -> Vec<TargetRef>;

    fn properties(&self, project: ProjectRef) -> PropertyTable;

    /// Properties supplied by the user when the build was invoked.
    fn user_properties(&self, project: ProjectRef) -> PropertyTable;

    /// Whether direct [`SourceLocation`] queries are available.
    fn supports_source_locations(&self) -> bool {
        true
    }
}
