//! Task and resource registry of one session run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use nekara_types::{ResourceId, TaskId};

use crate::error::{SchedulerError, SchedulerResult};
use crate::signal::ContinueSignal;
use crate::trace::TaskSnapshot;

/// Live tasks, declared resources, blocking relations and the current task.
///
/// The registry is not synchronized; the owning session guards it with its
/// own mutex. Ordered collections keep enumeration deterministic, which the
/// scheduler relies on when it indexes into the enabled set.
#[derive(Debug)]
pub struct ProgramState {
    tasks: BTreeMap<TaskId, ContinueSignal>,
    resources: BTreeSet<ResourceId>,
    /// Every key is a live task; every value is a non-empty set of declared
    /// resources.
    blocked: BTreeMap<TaskId, BTreeSet<ResourceId>>,
    current: TaskId,
    /// `CreateTask` calls not yet matched by `StartTask`.
    pending_creations: usize,
}

impl ProgramState {
    /// Creates a registry holding only the main task, already running.
    pub fn new() -> Self {
        let mut tasks = BTreeMap::new();
        tasks.insert(TaskId::MAIN, ContinueSignal::granted());
        Self {
            tasks,
            resources: BTreeSet::new(),
            blocked: BTreeMap::new(),
            current: TaskId::MAIN,
            pending_creations: 0,
        }
    }

    pub fn current_task(&self) -> TaskId {
        self.current
    }

    pub(crate) fn set_current(&mut self, task: TaskId) {
        self.current = task;
    }

    pub fn pending_creations(&self) -> usize {
        self.pending_creations
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn has_task(&self, task: TaskId) -> bool {
        self.tasks.contains_key(&task)
    }

    pub fn has_resource(&self, resource: ResourceId) -> bool {
        self.resources.contains(&resource)
    }

    pub fn is_blocked(&self, task: TaskId) -> bool {
        self.blocked.contains_key(&task)
    }

    pub fn signal_of(&self, task: TaskId) -> Option<&ContinueSignal> {
        self.tasks.get(&task)
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Announces that a task is about to start.
    pub fn declare_pending_task(&mut self) {
        self.pending_creations += 1;
    }

    /// Registers `task` with a fresh, ungranted signal and returns the signal.
    pub fn start_task(&mut self, task: TaskId) -> SchedulerResult<ContinueSignal> {
        if self.pending_creations == 0 {
            return Err(SchedulerError::UnexpectedStart(task));
        }
        // A rejected start still consumes its announcement.
        self.pending_creations -= 1;
        if self.tasks.contains_key(&task) {
            return Err(SchedulerError::DuplicateTask(task));
        }
        let signal = ContinueSignal::new();
        self.tasks.insert(task, signal.clone());
        Ok(signal)
    }

    /// Removes `task` and returns the signal it held.
    pub fn end_task(&mut self, task: TaskId) -> SchedulerResult<ContinueSignal> {
        let signal = self
            .tasks
            .remove(&task)
            .ok_or(SchedulerError::UnknownTask(task))?;
        self.blocked.remove(&task);
        Ok(signal)
    }

    /// Replaces the signal of `task` with a fresh one and returns it.
    pub fn renew_signal(&mut self, task: TaskId) -> Option<ContinueSignal> {
        let slot = self.tasks.get_mut(&task)?;
        *slot = ContinueSignal::new();
        Some(slot.clone())
    }

    /// Cancels every outstanding signal with `error`. Returns how many
    /// parked callers were released.
    pub fn release_all(&self, error: &SchedulerError) -> usize {
        self.tasks
            .values()
            .filter(|signal| signal.cancel(error.clone()))
            .count()
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    pub fn create_resource(&mut self, resource: ResourceId) -> SchedulerResult<()> {
        if !self.resources.insert(resource) {
            return Err(SchedulerError::DuplicateResource(resource));
        }
        Ok(())
    }

    /// Removes `resource`. Deleting a resource some task is still blocked on
    /// is an assertion failure, since that task could never be unblocked.
    pub fn delete_resource(&mut self, resource: ResourceId) -> SchedulerResult<()> {
        if !self.resources.contains(&resource) {
            return Err(SchedulerError::UnknownResource(resource));
        }
        if let Some(task) = self
            .blocked
            .iter()
            .find_map(|(task, set)| set.contains(&resource).then_some(*task))
        {
            return Err(SchedulerError::AssertionFailure(format!(
                "resource {resource} deleted while task {task} is blocked on it"
            )));
        }
        self.resources.remove(&resource);
        Ok(())
    }

    /// Blocks `task` until any of `resources` is signaled.
    pub fn block_on(&mut self, task: TaskId, resources: &[ResourceId]) -> SchedulerResult<()> {
        if resources.is_empty() {
            return Err(SchedulerError::InvalidArgument(
                "a task must block on at least one resource".to_string(),
            ));
        }
        if !self.tasks.contains_key(&task) {
            return Err(SchedulerError::UnknownTask(task));
        }
        if self.blocked.contains_key(&task) {
            return Err(SchedulerError::AlreadyBlocked(task));
        }
        if let Some(missing) = resources.iter().find(|r| !self.resources.contains(*r)) {
            return Err(SchedulerError::UnknownResource(*missing));
        }
        self.blocked.insert(task, resources.iter().copied().collect());
        Ok(())
    }

    /// Unblocks every task whose blocking set contains `resource` and returns
    /// them in ascending order.
    pub fn signal(&mut self, resource: ResourceId) -> SchedulerResult<Vec<TaskId>> {
        if !self.resources.contains(&resource) {
            return Err(SchedulerError::UnknownResource(resource));
        }
        let unblocked: Vec<TaskId> = self
            .blocked
            .iter()
            .filter(|(_, set)| set.contains(&resource))
            .map(|(task, _)| *task)
            .collect();
        for task in &unblocked {
            self.blocked.remove(task);
        }
        Ok(unblocked)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Live tasks that are not blocked, in ascending order.
    pub fn enabled_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .keys()
            .filter(|task| !self.blocked.contains_key(*task))
            .copied()
            .collect()
    }

    /// Snapshot of every live task and its blocking set, in ascending order.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.tasks
            .keys()
            .map(|task| {
                let blocked_on = self
                    .blocked
                    .get(task)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                TaskSnapshot::new(*task, blocked_on)
            })
            .collect()
    }

    /// Compact description for diagnostics, e.g. `*0, 1|3|4|, 2`.
    ///
    /// The current task is starred; blocked tasks list their resources.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, task) in self.tasks.keys().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if *task == self.current {
                out.push('*');
            }
            let _ = write!(out, "{task}");
            if let Some(set) = self.blocked.get(task) {
                out.push('|');
                for resource in set {
                    let _ = write!(out, "{resource}|");
                }
            }
        }
        out
    }
}

impl Default for ProgramState {
    fn default() -> Self {
        Self::new()
    }
}
