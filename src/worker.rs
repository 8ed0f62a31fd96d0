//! Cooperative background loops.
//!
//! A [`CancellableWorker`] owns a [`Job`] and, once started, runs it
//! repeatedly on a tokio task until [`CancellableWorker::stop`] clears the
//! running flag. Stopping never aborts a `run` already in progress; owners that
//! need a blocked job to return promptly close the resource it is blocked on.
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──▶ Stopped
//! ```

use crate::log::Logger;
use crate::{log_debug, log_error, log_info, log_warn};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::{JoinError, JoinHandle};

/// One repeatable unit of work.
#[async_trait]
pub trait Job: Send + 'static {
    async fn run(&mut self) -> anyhow::Result<()>;
}

/// How a [`CancellableWorker::join`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joined {
    /// The background task has exited (or was never started).
    Finished,
    /// The wait was interrupted; the task may still be running.
    Interrupted,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{worker} job failed: {error:#}")]
    Job {
        worker: &'static str,
        error: anyhow::Error,
    },
    #[error("{worker} task panicked: {message}")]
    Panicked {
        worker: &'static str,
        message: String,
    },
}

enum Phase<J> {
    Idle(J),
    Running,
    Stopped,
}

struct State<J> {
    phase: Phase<J>,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

pub struct CancellableWorker<J: Job> {
    name: &'static str,
    running: Arc<AtomicBool>,
    state: Mutex<State<J>>,
    logger: Arc<dyn Logger>,
}

impl<J: Job> CancellableWorker<J> {
    pub fn new(name: &'static str, job: J, logger: Arc<dyn Logger>) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(State {
                phase: Phase::Idle(job),
                handle: None,
            }),
            logger,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True while the loop is live: started, not stopped, and the job has not failed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the loop. Returns `false` when nothing was spawned because the
    /// worker is already running or has been stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.state();
        let job = match std::mem::replace(&mut state.phase, Phase::Running) {
            Phase::Idle(job) => job,
            Phase::Running => return false,
            Phase::Stopped => {
                state.phase = Phase::Stopped;
                log_warn!(self.logger, "{} worker already stopped, not restarting", self.name);
                return false;
            }
        };

        self.running.store(true, Ordering::SeqCst);
        state.handle = Some(tokio::spawn(run_loop(
            self.name,
            job,
            Arc::clone(&self.running),
            Arc::clone(&self.logger),
        )));
        log_info!(self.logger, "{} worker started", self.name);
        true
    }

    /// Clear the running flag. No-op unless running.
    pub fn stop(&self) {
        let mut state = self.state();
        if matches!(state.phase, Phase::Running) {
            state.phase = Phase::Stopped;
            self.running.store(false, Ordering::SeqCst);
            log_info!(self.logger, "{} worker stopping", self.name);
        }
    }

    /// Wait for the background task, returning early on a shutdown signal.
    pub async fn join(&self) -> Result<Joined, WorkerError> {
        self.join_until(shutdown_signal()).await
    }

    /// Wait for the background task or for `interrupt`, whichever comes
    /// first. An interrupted wait leaves the task joinable later.
    pub async fn join_until<F>(&self, interrupt: F) -> Result<Joined, WorkerError>
    where
        F: Future<Output = ()>,
    {
        let Some(mut handle) = self.state().handle.take() else {
            return Ok(Joined::Finished);
        };

        tokio::select! {
            result = &mut handle => self.finished(result),
            _ = interrupt => {
                self.state().handle = Some(handle);
                Ok(Joined::Interrupted)
            }
        }
    }

    fn finished(
        &self,
        result: Result<anyhow::Result<()>, JoinError>,
    ) -> Result<Joined, WorkerError> {
        match result {
            Ok(Ok(())) => Ok(Joined::Finished),
            Ok(Err(error)) => Err(WorkerError::Job {
                worker: self.name,
                error,
            }),
            Err(e) => Err(WorkerError::Panicked {
                worker: self.name,
                message: e.to_string(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<J>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(unix)]
const SIGABRT: i32 = 6;

/// Resolves on Ctrl-C, and on unix also on SIGTERM or SIGABRT.
///
/// Handlers are registered when this is called, so a signal that arrives
/// before the future is first polled is not lost. Must be called from within
/// a tokio runtime. A handler that cannot be installed never fires.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    let [mut terminate, mut abort] = {
        use tokio::signal::unix::{signal, SignalKind};
        [SignalKind::terminate(), SignalKind::from_raw(SIGABRT)].map(|kind| signal(kind).ok())
    };

    async move {
        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c() => {}
            _ = recv(&mut terminate) => {}
            _ = recv(&mut abort) => {}
        }

        #[cfg(not(unix))]
        ctrl_c().await;
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn recv(signal: &mut Option<tokio::signal::unix::Signal>) {
    if let Some(signal) = signal {
        if signal.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

async fn run_loop<J: Job>(
    name: &'static str,
    mut job: J,
    running: Arc<AtomicBool>,
    logger: Arc<dyn Logger>,
) -> anyhow::Result<()> {
    while running.load(Ordering::SeqCst) {
        if let Err(e) = job.run().await {
            if !running.load(Ordering::SeqCst) {
                log_debug!(logger, "{} worker interrupted during stop: {:#}", name, e);
                break;
            }
            running.store(false, Ordering::SeqCst);
            log_error!(logger, "{} worker died: {:#}", name, e);
            return Err(e);
        }
    }
    log_info!(logger, "{} worker exited", name);
    Ok(())
}
