//! Execution contexts behind the thread modes.
//!
//! One [`Schedulers`] value owns every context a bus dispatches on:
//!
//! - a tokio multi-thread runtime whose workers form the computation pool
//!   and whose blocking pool is the I/O pool,
//! - a single long-lived worker thread fed by a FIFO channel,
//! - the main-thread queue, drained either by a dedicated thread or by the
//!   application through [`MainLoop`],
//! - ad-hoc threads for [`ThreadMode::NewThread`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tidings_config::MainThreadPolicy;
use tokio::runtime::{self, Handle, Runtime};
use tracing::{debug, error, warn};

use crate::error::{BusError, BusResult};
use crate::thread_mode::{ExecutionContext, ThreadMode};

/// A unit of work handed to an execution context.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sizing for the execution contexts.
#[derive(Debug, Clone)]
pub(crate) struct SchedulerSettings {
    pub(crate) main_thread: MainThreadPolicy,
    pub(crate) computation_threads: usize,
    pub(crate) io_max_threads: usize,
    pub(crate) io_keep_alive: Duration,
    pub(crate) thread_name_prefix: String,
}

/// The main-thread queue and the identity of the thread draining it.
#[derive(Debug)]
struct MainQueue {
    sender: Sender<Job>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl MainQueue {
    fn is_current(&self) -> bool {
        self.thread
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    fn enqueue(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("Main thread queue closed, event dropped");
        }
    }
}

/// Owns every execution context of one bus.
pub(crate) struct Schedulers {
    runtime: Option<Runtime>,
    handle: Handle,
    main: MainQueue,
    single: Sender<Job>,
    thread_name_prefix: String,
    spawned: AtomicU64,
}

impl std::fmt::Debug for Schedulers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedulers")
            .field("main_thread", &self.main.thread.get())
            .field("thread_name_prefix", &self.thread_name_prefix)
            .finish_non_exhaustive()
    }
}

impl Schedulers {
    /// Start every execution context.
    ///
    /// Returns the [`MainLoop`] when the main thread is driven manually.
    pub(crate) fn start(settings: &SchedulerSettings) -> BusResult<(Self, Option<MainLoop>)> {
        if settings.computation_threads == 0 {
            return Err(BusError::Scheduler(
                "computation pool needs at least one thread".to_string(),
            ));
        }
        if settings.io_max_threads == 0 {
            return Err(BusError::Scheduler(
                "I/O pool needs at least one thread".to_string(),
            ));
        }

        let prefix = settings.thread_name_prefix.clone();
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(settings.computation_threads)
            .max_blocking_threads(settings.io_max_threads)
            .thread_keep_alive(settings.io_keep_alive)
            .thread_name(format!("{prefix}-pool"))
            .build()
            .map_err(|e| BusError::Scheduler(format!("failed to start worker pools: {e}")))?;
        let handle = runtime.handle().clone();

        let (single, single_rx) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name(format!("{prefix}-single"))
            .spawn(move || drain(&single_rx))
            .map_err(|e| BusError::Scheduler(format!("failed to start single worker: {e}")))?;

        let (main_tx, main_rx) = mpsc::channel::<Job>();
        let main_thread = Arc::new(OnceLock::new());
        let main_loop = match settings.main_thread {
            MainThreadPolicy::Dedicated => {
                let worker = thread::Builder::new()
                    .name(format!("{prefix}-main"))
                    .spawn(move || drain(&main_rx))
                    .map_err(|e| {
                        BusError::Scheduler(format!("failed to start main thread: {e}"))
                    })?;
                // Set before any post can observe the queue.
                let _ = main_thread.set(worker.thread().id());
                None
            },
            MainThreadPolicy::Manual => Some(MainLoop {
                receiver: main_rx,
                thread: Arc::clone(&main_thread),
            }),
        };

        debug!(
            computation_threads = settings.computation_threads,
            io_max_threads = settings.io_max_threads,
            main_thread = ?settings.main_thread,
            "Execution contexts started"
        );

        Ok((
            Self {
                runtime: Some(runtime),
                handle,
                main: MainQueue {
                    sender: main_tx,
                    thread: main_thread,
                },
                single,
                thread_name_prefix: prefix,
                spawned: AtomicU64::new(0),
            },
            main_loop,
        ))
    }

    /// Whether the calling thread is the bus main thread.
    pub(crate) fn is_main_thread(&self) -> bool {
        self.main.is_current()
    }

    /// Run `job` on the context `mode` resolves to.
    pub(crate) fn schedule(&self, mode: ThreadMode, job: Job) {
        match mode.context() {
            ExecutionContext::Inline => job(),
            ExecutionContext::MainThread => {
                if self.main.is_current() {
                    job();
                } else {
                    self.main.enqueue(job);
                }
            },
            ExecutionContext::MainQueue => self.main.enqueue(job),
            ExecutionContext::IoPool => drop(self.handle.spawn_blocking(job)),
            ExecutionContext::ComputationPool => {
                drop(self.handle.spawn(async move { job() }));
            },
            ExecutionContext::SingleWorker => {
                if self.single.send(job).is_err() {
                    warn!("Single worker stopped, event dropped");
                }
            },
            ExecutionContext::NewThread => self.spawn_thread(job),
        }
    }

    fn spawn_thread(&self, job: Job) {
        let seq = self.spawned.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("{}-thread-{seq}", self.thread_name_prefix))
            .spawn(job);
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn thread, event dropped");
        }
    }
}

impl Drop for Schedulers {
    fn drop(&mut self) {
        // May run on one of the runtime's own threads.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn drain(receiver: &Receiver<Job>) {
    for job in receiver {
        job();
    }
}

/// Handle for driving the main-thread queue from an application thread.
///
/// Only available when the bus was built with
/// [`MainThreadPolicy::Manual`]. The first thread that drains the loop
/// becomes the bus main thread for the rest of its life; `Main`
/// subscriptions posted from that thread then run inline.
#[derive(Debug)]
pub struct MainLoop {
    receiver: Receiver<Job>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl MainLoop {
    /// Make the calling thread the main thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotMainThread`] if another thread is already the
    /// main thread.
    pub fn bind(&self) -> BusResult<()> {
        let current = thread::current().id();
        if *self.thread.get_or_init(|| current) == current {
            Ok(())
        } else {
            Err(BusError::NotMainThread)
        }
    }

    /// Run every queued job without blocking. Returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotMainThread`] if called off the main thread.
    pub fn run_pending(&self) -> BusResult<usize> {
        self.bind()?;
        let mut ran: usize = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran = ran.saturating_add(1);
        }
        Ok(ran)
    }

    /// Run queued jobs as they arrive until `timeout` has elapsed. Returns
    /// how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotMainThread`] if called off the main thread.
    pub fn run_for(&self, timeout: Duration) -> BusResult<usize> {
        self.bind()?;
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Unrepresentable deadline: run until the bus goes away.
            let mut ran: usize = 0;
            for job in &self.receiver {
                job();
                ran = ran.saturating_add(1);
            }
            return Ok(ran);
        };

        let mut ran: usize = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(job) => {
                    job();
                    ran = ran.saturating_add(1);
                },
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(ran)
    }
}
