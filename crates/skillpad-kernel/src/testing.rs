//! Test doubles for the kernel seams.
//!
//! Enabled with the `test-util` feature.  [`ScriptedRunner`] stands in for
//! the OS process launcher and [`MockTransport`] for the network; both record
//! every call so tests can assert on order and count.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{KernelError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&CommandSpec) -> Option<Result<CommandOutput>> + Send + Sync>;

/// A [`ProcessRunner`] that replays scripted outcomes.
///
/// Outcomes are consumed in launch order.  When the script is exhausted the
/// optional handler is consulted, and failing that an empty successful output
/// is returned.
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<std::result::Result<CommandOutput, String>>>,
    handler: Option<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<CommandSpec>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every launch, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer launches the script does not cover.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Option<Result<CommandOutput>> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Next launch exits 0 with `stdout`.
    pub fn push_ok(&self, stdout: impl Into<String>) -> &Self {
        self.push_exit(0, stdout, "")
    }

    /// Next launch exits with `code`.
    pub fn push_exit(&self, code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> &Self {
        lock(&self.script).push_back(Ok(CommandOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
        self
    }

    /// Next launch fails before the process starts.
    pub fn push_spawn_error(&self, reason: impl Into<String>) -> &Self {
        lock(&self.script).push_back(Err(reason.into()));
        self
    }

    /// Every launch so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Argument vectors of every launch so far.
    pub fn call_args(&self) -> Vec<Vec<String>> {
        lock(&self.calls).iter().map(|c| c.args.clone()).collect()
    }

    /// Highest number of launches observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        lock(&self.calls).push(spec.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock(&self.script).pop_front();
        let outcome = match scripted {
            Some(Ok(output)) => Ok(output),
            Some(Err(reason)) => Err(KernelError::Spawn {
                program: spec.program.clone(),
                reason,
            }),
            None => self
                .handler
                .as_ref()
                .and_then(|h| h(spec))
                .unwrap_or_else(|| Ok(CommandOutput::default())),
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// An [`HttpTransport`] that answers from a per-`(method, url)` table.
///
/// Each route holds a queue of outcomes; the last one is sticky so a route
/// registered once answers every request.  Unrouted requests get a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<std::result::Result<HttpResponse, String>>>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `status` and `body`.
    pub fn route(&self, method: HttpMethod, url: &str, status: u16, body: impl Into<String>) -> &Self {
        lock(&self.routes)
            .entry((method, url.to_owned()))
            .or_default()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Shorthand for a GET route.
    pub fn get(&self, url: &str, status: u16, body: impl Into<String>) -> &Self {
        self.route(HttpMethod::Get, url, status, body)
    }

    /// Fail `method url` at the transport level.
    pub fn fail(&self, method: HttpMethod, url: &str, reason: impl Into<String>) -> &Self {
        lock(&self.routes)
            .entry((method, url.to_owned()))
            .or_default()
            .push_back(Err(reason.into()));
        self
    }

    /// Every request so far, in order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        lock(&self.calls).clone()
    }

    /// `"METHOD url"` for every request so far.
    pub fn call_log(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method, request.url.clone());
        lock(&self.calls).push(request);

        let mut routes = lock(&self.routes);
        let Some(queue) = routes.get_mut(&key) else {
            return Ok(HttpResponse::new(404, ""));
        };
        let outcome = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(KernelError::Transport(reason)),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}
