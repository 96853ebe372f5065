//! Composition root.
//!
//! Every long-lived component is built exactly once here and shared by
//! reference (or `Arc`) with the command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use skillpad_kernel::{CommandQueue, HttpTransport, ReqwestTransport, TokioProcessRunner};
use skillpad_skills::{GalleryClient, InstalledSkillsCache, SkillsCli, SourceResolver};
use skillpad_store::{DocumentStore, PreferencesStore, ProjectStore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::update::UpdateController;
use crate::update::release::{ManifestSource, ProcessRelauncher};

pub struct App {
    pub preferences: PreferencesStore,
    pub projects: ProjectStore,
    pub installed: InstalledSkillsCache,
    pub gallery: GalleryClient,
    pub resolver: SourceResolver,
    pub updater: Arc<UpdateController>,
}

impl App {
    /// Build every component from `config`.  `relaunch_args` are passed to
    /// the new executable after a self-update restart.
    pub async fn build(config: &AppConfig, relaunch_args: Vec<String>) -> Result<Self> {
        let store_path = config.store_path();
        let store = DocumentStore::open(&store_path)
            .await
            .with_context(|| format!("failed to open store {}", store_path.display()))?;
        let preferences = PreferencesStore::new(store.clone());
        let projects = ProjectStore::new(store.clone());

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);

        // The worker lives as long as the runtime; dropping the handle
        // detaches it.
        let (queue, _worker) = CommandQueue::start(Arc::new(TokioProcessRunner));

        let mut cli = SkillsCli::new(
            queue,
            preferences.clone(),
            transport.clone(),
            &config.endpoints,
        );
        if let Some(lock_file) = config.lock_file_path() {
            cli = cli.with_lock_file(lock_file);
        }
        debug!(lock_file = %cli.lock_file().display(), "skills gateway ready");

        let updater = UpdateController::new(
            Arc::new(ManifestSource::new(
                transport.clone(),
                config.update.manifest_url.clone(),
            )),
            transport.clone(),
            Arc::new(ProcessRelauncher::new(relaunch_args)),
            store,
        );

        info!(store = %store_path.display(), "skillpad initialized");
        Ok(Self {
            preferences,
            projects,
            installed: InstalledSkillsCache::new(Arc::new(cli)),
            gallery: GalleryClient::new(transport.clone(), config.endpoints.clone()),
            resolver: SourceResolver::new(transport, config.endpoints.clone()),
            updater: Arc::new(updater),
        })
    }

    pub fn cli(&self) -> &SkillsCli {
        self.installed.cli()
    }

    /// Start the automatic update check when the preference allows it.
    pub async fn spawn_auto_check(&self) -> Option<JoinHandle<bool>> {
        if !self.preferences.load().await.auto_check_updates {
            debug!("automatic update checks disabled");
            return None;
        }
        let updater = self.updater.clone();
        Some(tokio::spawn(async move { updater.auto_check().await }))
    }
}
