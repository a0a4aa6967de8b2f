//! Controlled tasks and locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use nekara_types::{ResourceId, TaskId};
use tracing::debug;

use crate::client::SessionClient;
use crate::error::{ClientError, ClientResult};

/// A task of the program under test, running on its own OS thread.
///
/// The thread only runs while the scheduler has handed control to the task.
/// Completion is published through a resource with the same ID as the
/// task, which [`ControlledTask::wait`] blocks on.
#[derive(Debug)]
pub struct ControlledTask {
    id: TaskId,
    completion: ResourceId,
    done: Arc<AtomicBool>,
    client: SessionClient,
    handle: JoinHandle<ClientResult<()>>,
}

impl ControlledTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks the calling task until this task has completed, then returns
    /// the body's result.
    pub fn wait(self) -> ClientResult<()> {
        while !self.done.load(Ordering::SeqCst) {
            self.client.blocked_on_resource(self.completion)?;
        }
        self.handle
            .join()
            .map_err(|_| ClientError::TaskPanicked(self.id))?
    }
}

impl SessionClient {
    /// Declares a new task and starts `body` on a thread of its own.
    ///
    /// The thread calls `StartTask` first and therefore waits until the
    /// scheduler picks the task. After `body` returns it signals completion
    /// and calls `EndTask`.
    pub fn spawn<F>(&self, body: F) -> ClientResult<ControlledTask>
    where
        F: FnOnce(&SessionClient) -> ClientResult<()> + Send + 'static,
    {
        let raw = self.reserve_id();
        let id = TaskId::new(raw);
        let completion = ResourceId::new(raw);
        self.create_resource(completion)?;
        self.create_task()?;

        let done = Arc::new(AtomicBool::new(false));
        let client = self.clone();
        let flag = Arc::clone(&done);
        let handle = thread::Builder::new()
            .name(format!("nekara-task-{id}"))
            .spawn(move || {
                client.start_task(id)?;
                let result = body(&client);
                if let Err(e) = &result {
                    debug!(task = %id, error = %e, "task body failed");
                }
                flag.store(true, Ordering::SeqCst);
                let ended = client
                    .signal_updated_resource(completion)
                    .and_then(|()| client.end_task(id));
                result.and(ended)
            })
            .map_err(|source| ClientError::Spawn { task: id, source })?;

        Ok(ControlledTask {
            id,
            completion,
            done,
            client: self.clone(),
            handle,
        })
    }
}

/// A mutual-exclusion lock modelled with one resource.
///
/// Clones refer to the same lock.
#[derive(Debug, Clone)]
pub struct ControlledLock {
    client: SessionClient,
    resource: ResourceId,
    held: Arc<AtomicBool>,
}

impl ControlledLock {
    pub fn new(client: &SessionClient) -> ClientResult<Self> {
        let resource = ResourceId::new(client.reserve_id());
        client.create_resource(resource)?;
        Ok(Self {
            client: client.clone(),
            resource,
            held: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Yields, then blocks until the lock is free and takes it.
    pub fn acquire(&self) -> ClientResult<()> {
        self.client.context_switch()?;
        while self.held.swap(true, Ordering::SeqCst) {
            self.client.blocked_on_resource(self.resource)?;
        }
        Ok(())
    }

    pub fn release(&self) -> ClientResult<()> {
        self.client.assert(
            self.held.load(Ordering::SeqCst),
            "released a lock that is not held",
        )?;
        self.held.store(false, Ordering::SeqCst);
        self.client.signal_updated_resource(self.resource)
    }
}
