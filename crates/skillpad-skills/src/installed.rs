//! Installed-skills cache, one entry per scope.
//!
//! Each scope (global, or one project directory) is fetched, cached and
//! failed independently.  Entries are replaced whole, never patched field by
//! field; a slow fetch that settles last wins.  On failure the previous
//! skill list is kept next to the error.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::gateway::SkillsCli;
use crate::types::{InstalledSkill, ListOptions, RemoveOptions, SkillUpdateStatus, UpdateAllResult};

/// How long a fetched list or update check stays fresh.
pub const CACHE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Update-check errors that only mean the CLI has no baseline hash yet.
const CACHE_MISS_MARKERS: [&str; 2] = ["No cached hash", "may need reinstall"];

/// Where skills are installed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Project(PathBuf),
}

impl Scope {
    /// Cache key: `global`, or the project path.
    pub fn key(&self) -> String {
        match self {
            Self::Global => "global".to_owned(),
            Self::Project(path) => path.display().to_string(),
        }
    }

    pub fn list_options(&self) -> ListOptions {
        match self {
            Self::Global => ListOptions {
                global: true,
                ..ListOptions::default()
            },
            Self::Project(path) => ListOptions {
                global: false,
                cwd: Some(path.clone()),
                ..ListOptions::default()
            },
        }
    }

    pub fn remove_options(&self, agents: Vec<String>) -> RemoveOptions {
        let list = self.list_options();
        RemoveOptions {
            global: list.global,
            agents,
            cwd: list.cwd,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Cached state of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeCacheEntry {
    pub skills: Vec<InstalledSkill>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetched_at: Option<Instant>,
}

impl ScopeCacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.error.is_none() && self.last_fetched_at.is_some_and(|t| t.elapsed() < ttl)
    }
}

/// Update statuses of one scope's skills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeUpdateStatus {
    /// Keyed by skill name.
    pub statuses: BTreeMap<String, SkillUpdateStatus>,
    /// `(name, message)` for skills the endpoint reported errors for.
    pub errors: Vec<(String, String)>,
    pub last_checked_at: Option<Instant>,
}

/// Multi-scope cache in front of [`SkillsCli::list`].
pub struct InstalledSkillsCache {
    cli: Arc<SkillsCli>,
    ttl: Duration,
    entries: DashMap<String, ScopeCacheEntry>,
    loading_scope: Mutex<Option<String>>,
    updates: DashMap<String, ScopeUpdateStatus>,
    checking_scope: Mutex<Option<String>>,
    updating_all: AtomicBool,
}

impl InstalledSkillsCache {
    pub fn new(cli: Arc<SkillsCli>) -> Self {
        Self {
            cli,
            ttl: CACHE_DURATION,
            entries: DashMap::new(),
            loading_scope: Mutex::new(None),
            updates: DashMap::new(),
            checking_scope: Mutex::new(None),
            updating_all: AtomicBool::new(false),
        }
    }

    /// Override the freshness window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cli(&self) -> &Arc<SkillsCli> {
        &self.cli
    }

    // -- installed lists ----------------------------------------------------

    /// Current entry for `scope`, if it was ever fetched.
    pub fn snapshot(&self, scope: &Scope) -> Option<ScopeCacheEntry> {
        self.entries.get(&scope.key()).map(|e| e.clone())
    }

    /// The scope whose list is being fetched right now.
    pub fn loading_scope(&self) -> Option<String> {
        self.loading_scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the cached list for `scope`, fetching it when missing, stale,
    /// in error, or when `force` is set.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn fetch_for_scope(&self, scope: &Scope, force: bool) -> ScopeCacheEntry {
        let key = scope.key();

        if !force {
            if let Some(entry) = self.entries.get(&key) {
                if entry.is_fresh(self.ttl) {
                    debug!("installed skills served from cache");
                    return entry.clone();
                }
            }
        }

        let previous = self.snapshot(scope).unwrap_or_default();
        self.entries.insert(
            key.clone(),
            ScopeCacheEntry {
                loading: true,
                ..previous.clone()
            },
        );
        set_marker(&self.loading_scope, &key);

        let entry = match self.cli.list(&scope.list_options()).await {
            Ok(skills) => {
                info!(count = skills.len(), "installed skills refreshed");
                ScopeCacheEntry {
                    skills,
                    loading: false,
                    error: None,
                    last_fetched_at: Some(Instant::now()),
                }
            }
            Err(e) => {
                warn!(error = %e, "installed skills fetch failed, keeping previous list");
                ScopeCacheEntry {
                    skills: previous.skills,
                    loading: false,
                    error: Some(e.to_string()),
                    last_fetched_at: Some(Instant::now()),
                }
            }
        };

        self.entries.insert(key.clone(), entry.clone());
        clear_marker(&self.loading_scope, &key);
        entry
    }

    /// Remove `name` from `scope`, then force-refetch the scope whatever
    /// the removal's outcome.  The removal's error, if any, is returned.
    pub async fn remove_and_refetch(
        &self,
        scope: &Scope,
        name: &str,
        agents: Vec<String>,
    ) -> Result<ScopeCacheEntry> {
        let removed = self.cli.remove(name, &scope.remove_options(agents)).await;
        let entry = self.fetch_for_scope(scope, true).await;
        removed.map(|()| entry)
    }

    /// Drop cached entries for `scopes`, or every entry when `None`.
    pub fn invalidate(&self, scopes: Option<&[Scope]>) {
        match scopes {
            None => self.entries.clear(),
            Some(scopes) => {
                for scope in scopes {
                    self.entries.remove(&scope.key());
                }
            }
        }
        debug!(scopes = ?scopes, "installed cache invalidated");
    }

    // -- update statuses ----------------------------------------------------

    pub fn update_statuses(&self, scope: &Scope) -> Option<ScopeUpdateStatus> {
        self.updates.get(&scope.key()).map(|s| s.clone())
    }

    pub fn checking_scope(&self) -> Option<String> {
        self.checking_scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_updating_all(&self) -> bool {
        self.updating_all.load(Ordering::SeqCst)
    }

    /// Compute update statuses for the skills cached in `scope`.
    ///
    /// Skipped when the last check is fresh (unless `force`) or the scope
    /// has no cached skills.  A failed check is logged and leaves the
    /// previous statuses in place.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn check_updates(&self, scope: &Scope, force: bool) -> Option<ScopeUpdateStatus> {
        let key = scope.key();
        let cached = self.update_statuses(scope);

        let fresh = cached
            .as_ref()
            .and_then(|c| c.last_checked_at)
            .is_some_and(|t| t.elapsed() < self.ttl);
        if !force && fresh {
            return cached;
        }

        let skills = self.snapshot(scope).map(|e| e.skills).unwrap_or_default();
        if skills.is_empty() {
            return cached;
        }

        set_marker(&self.checking_scope, &key);
        let result = self.cli.check_updates_api().await;
        clear_marker(&self.checking_scope, &key);

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "failed to check updates");
                return cached;
            }
        };

        let mut status = ScopeUpdateStatus {
            last_checked_at: Some(Instant::now()),
            ..ScopeUpdateStatus::default()
        };
        for skill in &skills {
            status
                .statuses
                .insert(skill.name.clone(), SkillUpdateStatus::UpToDate);
        }
        for update in result.updates_available {
            status.statuses.insert(
                update.name,
                SkillUpdateStatus::UpdateAvailable {
                    source: update.source,
                },
            );
        }
        for err in result.errors {
            if CACHE_MISS_MARKERS.iter().any(|m| err.error.contains(m)) {
                continue;
            }
            status.statuses.insert(
                err.name.clone(),
                SkillUpdateStatus::Error {
                    message: err.error.clone(),
                },
            );
            status.errors.push((err.name, err.error));
        }

        info!(
            skills = status.statuses.len(),
            errors = status.errors.len(),
            "update statuses refreshed"
        );
        self.updates.insert(key, status.clone());
        Some(status)
    }

    /// Update every skill, then refresh the scope's list and statuses.
    pub async fn update_all(&self, scope: &Scope) -> Result<UpdateAllResult> {
        let _flag = UpdatingAllFlag::raise(&self.updating_all);

        if let Some(mut status) = self.updates.get_mut(&scope.key()) {
            for value in status.statuses.values_mut() {
                if matches!(value, SkillUpdateStatus::UpdateAvailable { .. }) {
                    *value = SkillUpdateStatus::Updating;
                }
            }
        }

        let result = match self.cli.update_all().await {
            Ok(result) => result,
            Err(e) => {
                warn!(scope = %scope, error = %e, "failed to update skills");
                return Err(e);
            }
        };

        self.fetch_for_scope(scope, true).await;
        self.check_updates(scope, true).await;
        Ok(result)
    }
}

fn set_marker(marker: &Mutex<Option<String>>, key: &str) {
    *marker.lock().unwrap_or_else(PoisonError::into_inner) = Some(key.to_owned());
}

/// Clear `marker` only if `key` still owns it; a later scope may have
/// taken it over in the meantime.
fn clear_marker(marker: &Mutex<Option<String>>, key: &str) {
    let mut current = marker.lock().unwrap_or_else(PoisonError::into_inner);
    if current.as_deref() == Some(key) {
        *current = None;
    }
}

/// Holds the `updating_all` flag up until dropped.
struct UpdatingAllFlag<'a>(&'a AtomicBool);

impl<'a> UpdatingAllFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for UpdatingAllFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_keys() {
        assert_eq!(Scope::Global.key(), "global");
        assert_eq!(Scope::Project(PathBuf::from("/work/app")).key(), "/work/app");
    }

    #[test]
    fn scope_options() {
        assert!(Scope::Global.list_options().global);
        let project = Scope::Project(PathBuf::from("/work/app"));
        let opts = project.remove_options(vec!["cursor".into()]);
        assert!(!opts.global);
        assert_eq!(opts.cwd, Some(PathBuf::from("/work/app")));
        assert_eq!(opts.agents, vec!["cursor"]);
    }

    #[test]
    fn errored_entries_are_never_fresh() {
        let entry = ScopeCacheEntry {
            error: Some("boom".into()),
            last_fetched_at: Some(Instant::now()),
            ..ScopeCacheEntry::default()
        };
        assert!(!entry.is_fresh(CACHE_DURATION));

        let ok = ScopeCacheEntry {
            last_fetched_at: Some(Instant::now()),
            ..ScopeCacheEntry::default()
        };
        assert!(ok.is_fresh(CACHE_DURATION));
        assert!(!ok.is_fresh(Duration::ZERO));
    }
}
