use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::{
    BuildModel, ContextRef, ProjectRef, PropertyTable, SourceLocation, TargetRef, TaskRef,
};

/// Deterministic, in-memory build model test double.
///
/// Registration methods take `&self` so tests can keep mutating the scripted
/// graph (most importantly the property tables) while a tracker holds the
/// model. Topological sorts are counted so cache behavior can be asserted.
pub struct ScriptedBuild {
    inner: RwLock<Inner>,
    topo_sort_calls: AtomicUsize,
}

struct Inner {
    next_ref: u64,
    direct_locations: bool,
    projects: HashMap<ProjectRef, ProjectEntry>,
    targets: HashMap<TargetRef, TargetEntry>,
    tasks: HashMap<TaskRef, TaskEntry>,
    macro_contexts: HashSet<ContextRef>,
    legacy_task_locations: HashMap<TaskRef, String>,
    legacy_target_locations: HashMap<TargetRef, String>,
}

#[derive(Default)]
struct ProjectEntry {
    scheduled: Vec<String>,
    properties: PropertyTable,
    user_properties: PropertyTable,
    targets_by_name: BTreeMap<String, TargetRef>,
}

struct TargetEntry {
    name: String,
    project: ProjectRef,
    location: SourceLocation,
    depends_on: Vec<String>,
}

struct TaskEntry {
    name: String,
    owner: TargetRef,
    project: ProjectRef,
    location: SourceLocation,
    context: Option<ContextRef>,
}

impl Default for ScriptedBuild {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBuild {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_ref: 0,
                direct_locations: true,
                projects: HashMap::new(),
                targets: HashMap::new(),
                tasks: HashMap::new(),
                macro_contexts: HashSet::new(),
                legacy_task_locations: HashMap::new(),
                legacy_target_locations: HashMap::new(),
            }),
            topo_sort_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_project(&self) -> ProjectRef {
        let mut inner = self.write();
        let project = inner.alloc();
        inner.projects.insert(project, ProjectEntry::default());
        project
    }

    pub fn add_target(
        &self,
        project: ProjectRef,
        name: &str,
        location: SourceLocation,
        depends_on: &[&str],
    ) -> TargetRef {
        let mut inner = self.write();
        let target = inner.alloc();
        inner.targets.insert(
            target,
            TargetEntry {
                name: name.to_string(),
                project,
                location,
                depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            },
        );
        inner
            .projects
            .entry(project)
            .or_default()
            .targets_by_name
            .insert(name.to_string(), target);
        target
    }

    pub fn add_task(&self, owner: TargetRef, name: &str, location: SourceLocation) -> TaskRef {
        let mut inner = self.write();
        let project = inner
            .targets
            .get(&owner)
            .map(|t| t.project)
            .unwrap_or_default();
        let task = inner.alloc();
        inner.tasks.insert(
            task,
            TaskEntry {
                name: name.to_string(),
                owner,
                project,
                location,
                context: None,
            },
        );
        task
    }

    /// Attach a runtime context handle to a task; `macro_expansion` marks the
    /// context as an expanded macro body.
    pub fn attach_context(&self, task: TaskRef, macro_expansion: bool) -> ContextRef {
        let mut inner = self.write();
        let context = inner.alloc();
        if macro_expansion {
            inner.macro_contexts.insert(context);
        }
        if let Some(entry) = inner.tasks.get_mut(&task) {
            entry.context = Some(context);
        }
        context
    }

    /// Register the ordered target-name list the engine was asked to run.
    pub fn schedule(&self, project: ProjectRef, names: &[&str]) {
        let mut inner = self.write();
        if let Some(entry) = inner.projects.get_mut(&project) {
            entry.scheduled = names.iter().map(|n| n.to_string()).collect();
        }
    }

    pub fn set_property(&self, project: ProjectRef, name: &str, value: &str) {
        let mut inner = self.write();
        if let Some(entry) = inner.projects.get_mut(&project) {
            entry
                .properties
                .insert(name.to_string(), value.to_string());
        }
    }

    /// User properties are visible in the full table as well, as the engine
    /// merges them in at invocation time.
    pub fn set_user_property(&self, project: ProjectRef, name: &str, value: &str) {
        let mut inner = self.write();
        if let Some(entry) = inner.projects.get_mut(&project) {
            entry
                .properties
                .insert(name.to_string(), value.to_string());
            entry
                .user_properties
                .insert(name.to_string(), value.to_string());
        }
    }

    /// Switch the model into legacy-location mode: direct location queries
    /// answer `None` and the colon-delimited strings are served instead.
    pub fn use_legacy_locations(&self) {
        self.write().direct_locations = false;
    }

    /// Override the legacy string served for a task (defaults to one derived
    /// from the registered location).
    pub fn set_task_legacy_location(&self, task: TaskRef, raw: &str) {
        self.write()
            .legacy_task_locations
            .insert(task, raw.to_string());
    }

    pub fn set_target_legacy_location(&self, target: TargetRef, raw: &str) {
        self.write()
            .legacy_target_locations
            .insert(target, raw.to_string());
    }

    pub fn topo_sort_calls(&self) -> usize {
        self.topo_sort_calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("scripted build lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("scripted build lock poisoned")
    }
}

impl Inner {
    fn alloc(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    fn visit(
        &self,
        project: &ProjectEntry,
        name: &str,
        seen: &mut HashSet<TargetRef>,
        out: &mut Vec<TargetRef>,
    ) {
        let Some(&target) = project.targets_by_name.get(name) else {
            return;
        };
        if !seen.insert(target) {
            return;
        }
        if let Some(entry) = self.targets.get(&target) {
            for dep in &entry.depends_on {
                self.visit(project, dep, seen, out);
            }
        }
        out.push(target);
    }
}

fn derived_legacy(location: &SourceLocation) -> Option<String> {
    location
        .file
        .as_ref()
        .map(|file| format!("{file}: {}: ", location.line))
}

impl BuildModel for ScriptedBuild {
    fn task_name(&self, task: TaskRef) -> Option<String> {
        self.read().tasks.get(&task).map(|t| t.name.clone())
    }

    fn task_owning_target(&self, task: TaskRef) -> Option<TargetRef> {
        self.read().tasks.get(&task).map(|t| t.owner)
    }

    fn task_project(&self, task: TaskRef) -> Option<ProjectRef> {
        self.read().tasks.get(&task).map(|t| t.project)
    }

    fn task_location(&self, task: TaskRef) -> Option<SourceLocation> {
        let inner = self.read();
        if !inner.direct_locations {
            return None;
        }
        inner.tasks.get(&task).map(|t| t.location.clone())
    }

    fn task_location_legacy(&self, task: TaskRef) -> Option<String> {
        let inner = self.read();
        if let Some(raw) = inner.legacy_task_locations.get(&task) {
            return Some(raw.clone());
        }
        inner
            .tasks
            .get(&task)
            .and_then(|t| derived_legacy(&t.location))
    }

    fn task_runtime_context(&self, task: TaskRef) -> Option<ContextRef> {
        self.read().tasks.get(&task).and_then(|t| t.context)
    }

    fn context_is_macro_expansion(&self, context: ContextRef) -> bool {
        self.read().macro_contexts.contains(&context)
    }

    fn target_name(&self, target: TargetRef) -> Option<String> {
        self.read().targets.get(&target).map(|t| t.name.clone())
    }

    fn target_project(&self, target: TargetRef) -> Option<ProjectRef> {
        self.read().targets.get(&target).map(|t| t.project)
    }

    fn target_location(&self, target: TargetRef) -> Option<SourceLocation> {
        let inner = self.read();
        if !inner.direct_locations {
            return None;
        }
        inner.targets.get(&target).map(|t| t.location.clone())
    }

    fn target_location_legacy(&self, target: TargetRef) -> Option<String> {
        let inner = self.read();
        if let Some(raw) = inner.legacy_target_locations.get(&target) {
            return Some(raw.clone());
        }
        inner
            .targets
            .get(&target)
            .and_then(|t| derived_legacy(&t.location))
    }

    fn target_depends_on(&self, target: TargetRef, dependency: &str) -> bool {
        self.read()
            .targets
            .get(&target)
            .is_some_and(|t| t.depends_on.iter().any(|d| d == dependency))
    }

    fn target_by_name(&self, project: ProjectRef, name: &str) -> Option<TargetRef> {
        self.read()
            .projects
            .get(&project)
            .and_then(|p| p.targets_by_name.get(name).copied())
    }

    fn scheduled_targets(&self, project: ProjectRef) -> Vec<String> {
        self.read()
            .projects
            .get(&project)
            .map(|p| p.scheduled.clone())
            .unwrap_or_default()
    }

    fn topo_sort(&self, project: ProjectRef, target: &str) -> Vec<TargetRef> {
        self.topo_sort_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.read();
        let Some(entry) = inner.projects.get(&project) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        inner.visit(entry, target, &mut seen, &mut out);
        out
    }

    fn properties(&self, project: ProjectRef) -> PropertyTable {
        self.read()
            .projects
            .get(&project)
            .map(|p| p.properties.clone())
            .unwrap_or_default()
    }

    fn user_properties(&self, project: ProjectRef) -> PropertyTable {
        self.read()
            .projects
            .get(&project)
            .map(|p| p.user_properties.clone())
            .unwrap_or_default()
    }

    fn supports_source_locations(&self) -> bool {
        self.read().direct_locations
    }
}
