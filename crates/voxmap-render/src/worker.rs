//! Named background worker queues.
//!
//! Each [`WorkerQueue`] owns one thread that runs submitted jobs strictly in
//! submission order. Queues are looked up by name through a [`WorkerPool`],
//! which replaces process-wide task manager singletons: the pool lives in the
//! map context and dies with it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error};
use voxmap_common::{MapError, MapResult};

/// Queue running tile refresh sweeps.
pub const REGION_QUEUE: &str = "region-data";
/// Queue writing tile images to disk.
pub const IO_QUEUE: &str = "io";
/// Queue sampling the world map raster.
pub const WORLDMAP_QUEUE: &str = "worldmap";

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One named FIFO worker thread.
pub struct WorkerQueue {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl std::fmt::Debug for WorkerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerQueue")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .field("running", &self.is_running())
            .finish()
    }
}

impl WorkerQueue {
    /// Spawns the worker thread.
    pub fn spawn(name: impl Into<String>) -> MapResult<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pending);
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("voxmap-{name}"))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(queue = %thread_name, "Background job panicked");
                    }
                    counter.fetch_sub(1, Ordering::AcqRel);
                }
                debug!(queue = %thread_name, "Worker stopped");
            })?;

        debug!(queue = %name, "Worker started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            pending,
        })
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submits a job. Returns `false` if the queue was stopped.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_execute(job).is_ok()
    }

    /// Submits a job, failing if the queue was stopped.
    pub fn try_execute<F>(&self, job: F) -> MapResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(MapError::WorkerStopped(self.name.clone()));
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::new(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(MapError::WorkerStopped(self.name.clone()));
        }
        Ok(())
    }

    /// Jobs submitted but not finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the queue still accepts jobs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Blocks until every job submitted before this call has finished.
    /// Returns immediately on a stopped queue or when called from the
    /// queue's own thread.
    pub fn wait_idle(&self) {
        if self.is_current_thread() {
            return;
        }
        let (done_tx, done_rx) = bounded::<()>(1);
        if self
            .execute(move || {
                let _ = done_tx.send(());
            })
        {
            let _ = done_rx.recv();
        }
    }

    /// Stops accepting jobs, lets queued jobs finish and joins the thread.
    /// Idempotent.
    pub fn stop(&self) {
        drop(self.sender.lock().take());
        if self.is_current_thread() {
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(queue = %self.name, "Worker thread panicked");
            }
        }
    }

    fn is_current_thread(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker queues keyed by name, created on first use.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    queues: Arc<DashMap<String, Arc<WorkerQueue>>>,
}

impl WorkerPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the queue called `name`, spawning it if needed. A stopped
    /// queue is replaced by a fresh one.
    pub fn queue(&self, name: &str) -> MapResult<Arc<WorkerQueue>> {
        if let Some(queue) = self.queues.get(name) {
            if queue.is_running() {
                return Ok(Arc::clone(queue.value()));
            }
        }
        let mut entry = self
            .queues
            .entry(name.to_owned())
            .or_try_insert_with(|| WorkerQueue::spawn(name).map(Arc::new))?;
        if !entry.is_running() {
            *entry = Arc::new(WorkerQueue::spawn(name)?);
        }
        Ok(Arc::clone(entry.value()))
    }

    /// Submits a job to the named queue. Returns `false` when the queue
    /// could not be started.
    pub fn execute<F>(&self, name: &str, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.queue(name) {
            Ok(queue) => queue.execute(job),
            Err(e) => {
                error!(queue = name, "Can't submit job: {e}");
                false
            },
        }
    }

    /// Waits for the named queue to drain, if it exists.
    pub fn wait_idle(&self, name: &str) {
        let queue = self.queues.get(name).map(|q| Arc::clone(q.value()));
        if let Some(queue) = queue {
            queue.wait_idle();
        }
    }

    /// Stops and forgets the named queue.
    pub fn stop(&self, name: &str) {
        if let Some((_, queue)) = self.queues.remove(name) {
            queue.stop();
        }
    }

    /// Stops every queue.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        for name in names {
            self.stop(&name);
        }
    }

    /// Names of the live queues.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }
}
