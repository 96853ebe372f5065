//! Self-update state machine.
//!
//! ```text
//! idle --check--> checking --(nothing newer)--> idle
//! checking --(newer, binary reachable)--> available{version}
//! checking --(newer, binary not reachable yet)--> idle
//! checking --(failure)--> error{message}      (idle when silent)
//! available --download--> downloading --> ready | error{message}
//! ready --restart--> process relaunches
//! ```
//!
//! The last check time is persisted before every check so automatic checks
//! honor the cooldown even when a check fails.

pub mod release;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use skillpad_kernel::{HttpRequest, HttpTransport};
use skillpad_store::{DocumentStore, LAST_UPDATE_CHECK_KEY};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Minimum time between two automatic checks.
pub const UPDATE_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Where the application is in the update flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppUpdateState {
    Idle,
    Checking,
    Available { version: String },
    Downloading,
    Ready,
    Error { message: String },
}

impl fmt::Display for AppUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Checking => f.write_str("checking"),
            Self::Available { version } => write!(f, "available ({version})"),
            Self::Downloading => f.write_str("downloading"),
            Self::Ready => f.write_str("ready"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Answers "is there a newer release?".
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn check(&self) -> anyhow::Result<Option<Arc<dyn PendingUpdate>>>;
}

/// A newer release that has not been installed yet.
#[async_trait]
pub trait PendingUpdate: Send + Sync {
    fn version(&self) -> &str;

    /// First published binary URL; probed with HEAD before the update is
    /// offered.
    fn probe_url(&self) -> Option<&str>;

    async fn download_and_install(&self) -> anyhow::Result<()>;
}

/// Platform restart primitive.
pub trait Relauncher: Send + Sync {
    fn relaunch(&self) -> anyhow::Result<()>;
}

pub struct UpdateController {
    source: Arc<dyn UpdateSource>,
    transport: Arc<dyn HttpTransport>,
    relauncher: Arc<dyn Relauncher>,
    store: DocumentStore,
    cooldown: Duration,
    state: watch::Sender<AppUpdateState>,
    pending: Mutex<Option<Arc<dyn PendingUpdate>>>,
}

impl UpdateController {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        transport: Arc<dyn HttpTransport>,
        relauncher: Arc<dyn Relauncher>,
        store: DocumentStore,
    ) -> Self {
        let (state, _) = watch::channel(AppUpdateState::Idle);
        Self {
            source,
            transport,
            relauncher,
            store,
            cooldown: UPDATE_COOLDOWN,
            state,
            pending: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn state(&self) -> AppUpdateState {
        self.state.borrow().clone()
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<AppUpdateState> {
        self.state.subscribe()
    }

    /// Look for a newer release.  Returns `true` when one is available for
    /// download.  In `silent` mode failures end in `idle` instead of `error`.
    pub async fn check_for_update(&self, silent: bool) -> bool {
        self.record_check().await;
        self.transition(AppUpdateState::Checking);

        let update = match self.source.check().await {
            Ok(Some(update)) => update,
            Ok(None) => {
                info!("no update available");
                self.transition(AppUpdateState::Idle);
                return false;
            }
            Err(e) if silent => {
                warn!(error = %format!("{e:#}"), "silent update check failed");
                self.transition(AppUpdateState::Idle);
                return false;
            }
            Err(e) => {
                self.transition(AppUpdateState::Error {
                    message: format!("{e:#}"),
                });
                return false;
            }
        };

        let version = update.version().to_owned();
        if !self.binary_published(update.as_ref()).await {
            info!(%version, "release announced but binary not downloadable yet");
            self.transition(AppUpdateState::Idle);
            return false;
        }

        *self.pending_slot() = Some(update);
        self.transition(AppUpdateState::Available { version });
        true
    }

    /// Download and install the update found by the last check.  No-op when
    /// there is none.
    pub async fn download_update(&self) {
        let Some(update) = self.pending_slot().clone() else {
            debug!("download requested without a pending update");
            return;
        };

        self.transition(AppUpdateState::Downloading);
        match update.download_and_install().await {
            Ok(()) => {
                info!(version = %update.version(), "update installed");
                self.transition(AppUpdateState::Ready);
            }
            Err(e) => self.transition(AppUpdateState::Error {
                message: format!("{e:#}"),
            }),
        }
    }

    /// Relaunch into the installed update.
    pub fn restart_to_update(&self) -> anyhow::Result<()> {
        self.relauncher.relaunch()
    }

    /// Check in the background: skipped within the cooldown, otherwise a
    /// silent check that downloads (but never restarts) when it finds
    /// something.  Returns whether an update was found.
    pub async fn auto_check(&self) -> bool {
        if let Some(last) = self.store.get::<i64>(LAST_UPDATE_CHECK_KEY).await {
            let elapsed_ms = Utc::now().timestamp_millis().saturating_sub(last);
            if elapsed_ms < self.cooldown.as_millis() as i64 {
                debug!(elapsed_ms, "update check within cooldown, skipping");
                return false;
            }
        }

        let found = self.check_for_update(true).await;
        if found {
            self.download_update().await;
        }
        found
    }

    async fn record_check(&self) {
        let now = Utc::now().timestamp_millis();
        if let Err(e) = self.store.put(LAST_UPDATE_CHECK_KEY, &now).await {
            warn!(error = %e, "failed to persist update check time");
        }
    }

    async fn binary_published(&self, update: &dyn PendingUpdate) -> bool {
        let Some(url) = update.probe_url() else {
            return false;
        };
        match self.transport.send(HttpRequest::head(url)).await {
            Ok(r) if r.is_success() => true,
            Ok(r) => {
                debug!(url, status = r.status, "release binary probe missed");
                false
            }
            Err(e) => {
                debug!(url, error = %e, "release binary probe failed");
                false
            }
        }
    }

    fn transition(&self, next: AppUpdateState) {
        debug!(state = %next, "update state");
        self.state.send_replace(next);
    }

    fn pending_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn PendingUpdate>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `command` while the background automatic check, if any, carries on.
///
/// The check is never awaited or aborted here: if it is still running when
/// `command` completes its result is simply ignored.
pub async fn run_alongside<F: Future>(check: Option<JoinHandle<bool>>, command: F) -> F::Output {
    let output = command.await;
    if let Some(handle) = check {
        if !handle.is_finished() {
            debug!("automatic update check still running, its result will be ignored");
        }
        drop(handle);
    }
    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use skillpad_kernel::HttpMethod;
    use skillpad_kernel::testing::MockTransport;

    use super::*;

    const BINARY: &str = "https://dl.test/skillpad-linux-x86_64.tar.gz";

    struct FakeUpdate {
        install: Result<(), String>,
        installs: AtomicUsize,
    }

    #[async_trait]
    impl PendingUpdate for FakeUpdate {
        fn version(&self) -> &str {
            "1.0.0"
        }

        fn probe_url(&self) -> Option<&str> {
            Some(BINARY)
        }

        async fn download_and_install(&self) -> anyhow::Result<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            self.install.clone().map_err(anyhow::Error::msg)
        }
    }

    enum Outcome {
        Nothing,
        Update(Arc<FakeUpdate>),
        Fail(&'static str),
    }

    struct FakeSource {
        outcome: Outcome,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl UpdateSource for FakeSource {
        async fn check(&self) -> anyhow::Result<Option<Arc<dyn PendingUpdate>>> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Outcome::Nothing => Ok(None),
                Outcome::Update(u) => Ok(Some(u.clone() as Arc<dyn PendingUpdate>)),
                Outcome::Fail(reason) => Err(anyhow::anyhow!(*reason)),
            }
        }
    }

    #[derive(Default)]
    struct FakeRelauncher {
        launches: AtomicUsize,
    }

    impl Relauncher for FakeRelauncher {
        fn relaunch(&self) -> anyhow::Result<()> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        controller: UpdateController,
        source: Arc<FakeSource>,
        transport: Arc<MockTransport>,
        relauncher: Arc<FakeRelauncher>,
        store: DocumentStore,
    }

    fn update(install: Result<(), String>) -> Arc<FakeUpdate> {
        Arc::new(FakeUpdate {
            install,
            installs: AtomicUsize::new(0),
        })
    }

    fn harness(outcome: Outcome) -> Harness {
        let source = Arc::new(FakeSource {
            outcome,
            checks: AtomicUsize::new(0),
        });
        let transport = Arc::new(MockTransport::new());
        let relauncher = Arc::new(FakeRelauncher::default());
        let store = DocumentStore::in_memory();
        let controller = UpdateController::new(
            source.clone(),
            transport.clone(),
            relauncher.clone(),
            store.clone(),
        );
        Harness {
            controller,
            source,
            transport,
            relauncher,
            store,
        }
    }

    fn publish_binary(h: &Harness) {
        h.transport.route(HttpMethod::Head, BINARY, 200, "");
    }

    #[tokio::test]
    async fn nothing_newer_returns_to_idle() {
        let h = harness(Outcome::Nothing);
        assert!(!h.controller.check_for_update(false).await);
        assert_eq!(h.controller.state(), AppUpdateState::Idle);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn verified_release_becomes_available() {
        let h = harness(Outcome::Update(update(Ok(()))));
        publish_binary(&h);

        assert!(h.controller.check_for_update(false).await);
        assert_eq!(
            h.controller.state(),
            AppUpdateState::Available {
                version: "1.0.0".into()
            }
        );
        assert_eq!(h.transport.call_log(), vec![format!("HEAD {BINARY}")]);
    }

    #[tokio::test]
    async fn unpublished_binary_is_treated_as_no_update() {
        let h = harness(Outcome::Update(update(Ok(()))));
        assert!(!h.controller.check_for_update(false).await);
        assert_eq!(h.controller.state(), AppUpdateState::Idle);

        // Nothing retained, so download is a no-op.
        h.controller.download_update().await;
        assert_eq!(h.controller.state(), AppUpdateState::Idle);
    }

    #[tokio::test]
    async fn failed_check_surfaces_error_unless_silent() {
        let h = harness(Outcome::Fail("manifest unreachable"));
        assert!(!h.controller.check_for_update(false).await);
        assert_eq!(
            h.controller.state(),
            AppUpdateState::Error {
                message: "manifest unreachable".into()
            }
        );

        assert!(!h.controller.check_for_update(true).await);
        assert_eq!(h.controller.state(), AppUpdateState::Idle);
        assert_eq!(h.source.checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn every_check_records_timestamp() {
        let h = harness(Outcome::Fail("offline"));
        let before = Utc::now().timestamp_millis();
        h.controller.check_for_update(true).await;
        let recorded: i64 = h.store.get(LAST_UPDATE_CHECK_KEY).await.unwrap();
        assert!(recorded >= before);
    }

    #[tokio::test]
    async fn download_moves_to_ready() {
        let pending = update(Ok(()));
        let h = harness(Outcome::Update(pending.clone()));
        publish_binary(&h);
        let mut states = h.controller.subscribe();

        h.controller.check_for_update(false).await;
        h.controller.download_update().await;

        assert_eq!(h.controller.state(), AppUpdateState::Ready);
        assert_eq!(pending.installs.load(Ordering::SeqCst), 1);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), AppUpdateState::Ready);
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let h = harness(Outcome::Update(update(Err("disk full".into()))));
        publish_binary(&h);

        h.controller.check_for_update(false).await;
        h.controller.download_update().await;
        assert_eq!(
            h.controller.state(),
            AppUpdateState::Error {
                message: "disk full".into()
            }
        );
    }

    #[tokio::test]
    async fn restart_uses_relauncher() {
        let h = harness(Outcome::Nothing);
        h.controller.restart_to_update().unwrap();
        assert_eq!(h.relauncher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_check_respects_cooldown() {
        let h = harness(Outcome::Nothing);
        let half_hour_ago = Utc::now().timestamp_millis() - 30 * 60 * 1000;
        h.store.put(LAST_UPDATE_CHECK_KEY, &half_hour_ago).await.unwrap();

        assert!(!h.controller.auto_check().await);
        assert_eq!(h.source.checks.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.state(), AppUpdateState::Idle);
    }

    #[tokio::test]
    async fn auto_check_after_cooldown_downloads_without_restart() {
        let pending = update(Ok(()));
        let h = harness(Outcome::Update(pending.clone()));
        publish_binary(&h);
        let two_hours_ago = Utc::now().timestamp_millis() - 2 * 60 * 60 * 1000;
        h.store.put(LAST_UPDATE_CHECK_KEY, &two_hours_ago).await.unwrap();

        assert!(h.controller.auto_check().await);
        assert_eq!(h.source.checks.load(Ordering::SeqCst), 1);
        assert_eq!(pending.installs.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.state(), AppUpdateState::Ready);
        assert_eq!(h.relauncher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn background_check_runs_while_command_executes() {
        let h = harness(Outcome::Update(update(Ok(()))));
        publish_binary(&h);
        let controller = Arc::new(h.controller);

        let check = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.auto_check().await })
        };
        let output = run_alongside(Some(check), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "listed"
        })
        .await;

        assert_eq!(output, "listed");
        assert_eq!(h.transport.call_log(), vec![format!("HEAD {BINARY}")]);
        assert_eq!(h.source.checks.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), AppUpdateState::Ready);
    }

    #[tokio::test]
    async fn command_runs_without_background_check() {
        assert_eq!(run_alongside(None, async { 7 }).await, 7);
    }

    #[tokio::test]
    async fn auto_check_failure_stays_idle() {
        let h = harness(Outcome::Fail("offline")).controller_with_cooldown(Duration::ZERO);
        assert!(!h.controller.auto_check().await);
        assert_eq!(h.controller.state(), AppUpdateState::Idle);
    }

    impl Harness {
        fn controller_with_cooldown(mut self, cooldown: Duration) -> Self {
            self.controller = self.controller.with_cooldown(cooldown);
            self
        }
    }
}
