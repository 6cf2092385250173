//! Bounded worker pool absorbing blocking work.
//!
//! The pool owns a fixed number of named threads draining a bounded queue.
//! Submission never blocks the caller: a full queue is reported as
//! [`PoolError::Saturated`] and the caller decides how to fail. Jobs that
//! panic are logged and do not take their worker down.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use thiserror::Error;
use tracing::{debug, error};

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// A unit of work accepted by the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Failures reported when submitting work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The queue is full.
    #[error("worker pool '{pool}' is saturated ({capacity} queued jobs)")]
    Saturated {
        /// Pool name.
        pool: String,
        /// Queue capacity.
        capacity: usize,
    },
    /// The pool no longer accepts work.
    #[error("worker pool '{pool}' has shut down")]
    ShutDown {
        /// Pool name.
        pool: String,
    },
    /// A worker thread could not be started.
    #[error("failed to spawn worker for pool '{pool}': {message}")]
    Spawn {
        /// Pool name.
        pool: String,
        /// OS detail.
        message: String,
    },
}

/// Fixed-size pool of named worker threads fed by a bounded queue.
pub struct WorkerPool {
    id: usize,
    name: String,
    capacity: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts `threads` workers named `<name>-<n>` sharing a queue of
    /// `capacity` jobs. Zero values are raised to one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] when a worker thread cannot be started.
    pub fn new(name: impl Into<String>, threads: usize, capacity: usize) -> Result<Self, PoolError> {
        let name = name.into();
        let capacity = capacity.max(1);
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = bounded::<Job>(capacity);

        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || run_worker(id, &receiver))
                .map_err(|source| PoolError::Spawn {
                    pool: name.clone(),
                    message: source.to_string(),
                })?;
            workers.push(worker);
        }

        debug!(
            target: POOL_TARGET,
            pool = %name,
            threads = workers.len(),
            capacity,
            "worker pool started"
        );

        Ok(Self {
            id,
            name,
            capacity,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Pool name used for worker thread names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of queued jobs.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queues `job` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] when the queue is full and
    /// [`PoolError::ShutDown`] after [`WorkerPool::shutdown`].
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), PoolError> {
        self.try_submit(Box::new(job)).map_err(|(_, error)| error)
    }

    /// Queues `job`, running it on the calling thread when the pool cannot
    /// accept it.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Err((job, error)) = self.try_submit(Box::new(job)) {
            debug!(
                target: POOL_TARGET,
                pool = %self.name,
                %error,
                "running job on the calling thread"
            );
            job();
        }
    }

    /// Queues `job`, handing it back alongside the failure when rejected.
    ///
    /// # Errors
    ///
    /// Returns the rejected job with [`PoolError::Saturated`] or
    /// [`PoolError::ShutDown`].
    pub fn try_submit(&self, job: Job) -> Result<(), (Job, PoolError)> {
        let sender = self.sender.lock().ok().and_then(|guard| guard.clone());
        let Some(sender) = sender else {
            return Err((job, self.shut_down_error()));
        };
        sender.try_send(job).map_err(|error| match error {
            TrySendError::Full(job) => (
                job,
                PoolError::Saturated {
                    pool: self.name.clone(),
                    capacity: self.capacity,
                },
            ),
            TrySendError::Disconnected(job) => (job, self.shut_down_error()),
        })
    }

    /// Returns `true` when called from one of this pool's workers.
    #[must_use]
    pub fn owns_current_thread(&self) -> bool {
        CURRENT_POOL.with(Cell::get) == self.id
    }

    /// Returns `true` when called from any pool's worker.
    #[must_use]
    pub fn on_worker_thread() -> bool {
        CURRENT_POOL.with(Cell::get) != 0
    }

    /// Stops accepting work, lets queued jobs finish, and joins the workers.
    ///
    /// Safe to call repeatedly and from a worker thread; a worker never joins
    /// itself.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!(target: POOL_TARGET, pool = %self.name, "worker thread panicked");
            }
        }
    }

    fn shut_down_error(&self) -> PoolError {
        PoolError::ShutDown {
            pool: self.name.clone(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

fn run_worker(pool_id: usize, receiver: &Receiver<Job>) {
    CURRENT_POOL.with(|current| current.set(pool_id));
    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(target: POOL_TARGET, "worker job panicked");
        }
    }
}
