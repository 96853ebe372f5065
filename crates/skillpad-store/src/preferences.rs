//! User preferences.
//!
//! Persisted under [`PREFERENCES_KEY`].  Loading merges whatever fields are
//! present over [`Preferences::default`], so records written by older builds
//! (or edited by hand) keep working.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{DocumentStore, PREFERENCES_KEY};
use crate::error::{StoreError, StoreResult};

/// Package runner used to invoke the `skills` CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npx,
    Pnpx,
    Bunx,
}

impl PackageManager {
    /// Program name to launch.
    pub fn program(self) -> &'static str {
        match self {
            Self::Npx => "npx",
            Self::Pnpx => "pnpx",
            Self::Bunx => "bunx",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

impl std::str::FromStr for PackageManager {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npx" => Ok(Self::Npx),
            "pnpx" => Ok(Self::Pnpx),
            "bunx" => Ok(Self::Bunx),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown package manager `{other}` (expected npx, pnpx or bunx)"
            ))),
        }
    }
}

/// The persisted preference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Agents pre-selected when installing a skill.
    pub default_agents: Vec<String>,
    pub package_manager: PackageManager,
    /// Run the automatic update check on launch.
    pub auto_check_updates: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_agents: Vec::new(),
            package_manager: PackageManager::Npx,
            auto_check_updates: true,
        }
    }
}

/// Every field optional, for merging over defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialPreferences {
    default_agents: Option<Vec<String>>,
    package_manager: Option<PackageManager>,
    auto_check_updates: Option<bool>,
}

impl PartialPreferences {
    fn merge_over(self, base: Preferences) -> Preferences {
        Preferences {
            default_agents: self.default_agents.unwrap_or(base.default_agents),
            package_manager: self.package_manager.unwrap_or(base.package_manager),
            auto_check_updates: self.auto_check_updates.unwrap_or(base.auto_check_updates),
        }
    }
}

/// Read/write access to [`Preferences`].
#[derive(Clone)]
pub struct PreferencesStore {
    store: DocumentStore,
}

impl PreferencesStore {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Persisted preferences merged over the defaults.
    pub async fn load(&self) -> Preferences {
        let partial = self
            .store
            .get::<PartialPreferences>(PREFERENCES_KEY)
            .await
            .unwrap_or_default();
        let prefs = partial.merge_over(Preferences::default());
        debug!(package_manager = %prefs.package_manager, "preferences loaded");
        prefs
    }

    /// Convenience: the configured package runner.
    pub async fn package_manager(&self) -> PackageManager {
        self.load().await.package_manager
    }

    /// Replace the stored record and persist.
    pub async fn save(&self, prefs: &Preferences) -> StoreResult<()> {
        self.store.put(PREFERENCES_KEY, prefs).await?;
        info!(
            package_manager = %prefs.package_manager,
            auto_check_updates = prefs.auto_check_updates,
            agents = prefs.default_agents.len(),
            "preferences saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn absent_record_yields_defaults() {
        let prefs = PreferencesStore::new(DocumentStore::in_memory()).load().await;
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.auto_check_updates);
        assert_eq!(prefs.package_manager, PackageManager::Npx);
    }

    #[tokio::test]
    async fn partial_record_is_merged_over_defaults() {
        let store = DocumentStore::in_memory();
        store
            .set(PREFERENCES_KEY, &json!({ "packageManager": "bunx" }))
            .await
            .unwrap();

        let prefs = PreferencesStore::new(store).load().await;
        assert_eq!(prefs.package_manager, PackageManager::Bunx);
        assert!(prefs.auto_check_updates);
        assert!(prefs.default_agents.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = PreferencesStore::new(DocumentStore::in_memory());
        let prefs = Preferences {
            default_agents: vec!["claude-code".into(), "cursor".into()],
            package_manager: PackageManager::Pnpx,
            auto_check_updates: false,
        };
        store.save(&prefs).await.unwrap();
        assert_eq!(store.load().await, prefs);
    }

    #[test]
    fn serialized_with_camel_case_keys() {
        let v = serde_json::to_value(Preferences::default()).unwrap();
        assert_eq!(
            v,
            json!({ "defaultAgents": [], "packageManager": "npx", "autoCheckUpdates": true })
        );
    }

    #[test]
    fn package_manager_parses_case_insensitively() {
        assert_eq!("PNPX".parse::<PackageManager>().unwrap(), PackageManager::Pnpx);
        assert!("yarn".parse::<PackageManager>().is_err());
    }
}
