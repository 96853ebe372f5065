//! Exclusive command queue.
//!
//! Every external process SkillPad launches goes through one
//! [`CommandQueue`].  The `skills` CLI mutates a shared lock file and shared
//! install directories, so two invocations must never overlap.
//!
//! # Execution model
//!
//! ```text
//! caller A ──┐                       ┌──> reply A (oneshot)
//! caller B ──┼──> mpsc (FIFO) ──> worker ──> reply B
//! caller C ──┘                       └──> reply C
//! ```
//!
//! A single background worker drains a bounded channel and runs one job at a
//! time, in the order jobs were sent.  Job *N+1* is not started until job *N*
//! has exited or failed to launch.  Each caller awaits only its own reply, so a
//! failing job never fails or blocks the ones behind it; the worker simply
//! moves on to the next message.
//!
//! There is no priority, cancellation, or timeout here.  Callers that need a
//! deadline wrap the future returned by [`CommandQueue::execute`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{KernelError, Result};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};

/// Default number of jobs that may wait before `execute` starts awaiting
/// channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// Internal representation of a job waiting on the channel.
struct QueuedCommand {
    seq: u64,
    spec: CommandSpec,
    reply: oneshot::Sender<Result<CommandOutput>>,
}

/// Serializing front door for process launches.
///
/// Cheaply cloneable; all clones feed the same worker.  The worker exits once
/// every clone has been dropped and the backlog is drained.
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<QueuedCommand>,
    next_seq: Arc<AtomicU64>,
}

impl CommandQueue {
    /// Create a queue and spawn its worker onto the current tokio runtime.
    pub fn start(runner: Arc<dyn ProcessRunner>) -> (Self, JoinHandle<()>) {
        Self::with_capacity(runner, DEFAULT_CAPACITY)
    }

    /// Like [`CommandQueue::start`] with an explicit channel bound.
    pub fn with_capacity(runner: Arc<dyn ProcessRunner>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            info!("command queue worker started");
            Self::worker_loop(runner, rx).await;
            info!("command queue worker stopped");
        });
        let queue = Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(0)),
        };
        (queue, handle)
    }

    /// Enqueue `spec` and wait for its own outcome.
    ///
    /// Launch order equals the order in which calls reach the channel.
    pub async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let (reply, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        debug!(seq, command = %spec.display(), "command enqueued");

        self.tx
            .send(QueuedCommand { seq, spec, reply })
            .await
            .map_err(|_| KernelError::QueueClosed)?;

        rx.await.map_err(|_| KernelError::QueueClosed)?
    }

    /// Run a job at a time until every sender is gone.
    async fn worker_loop(runner: Arc<dyn ProcessRunner>, mut rx: mpsc::Receiver<QueuedCommand>) {
        while let Some(job) = rx.recv().await {
            debug!(seq = job.seq, command = %job.spec.display(), "command started");

            let outcome = runner.run(&job.spec).await;
            match &outcome {
                Ok(output) => debug!(seq = job.seq, exit_code = output.exit_code, "command finished"),
                Err(err) => warn!(seq = job.seq, error = %err, "command failed to run"),
            }

            // The caller may have stopped waiting; the queue carries on either way.
            if job.reply.send(outcome).is_err() {
                debug!(seq = job.seq, "caller dropped before reply");
            }
        }
    }
}
