//! Skill type definitions.
//!
//! Gallery entries come from the remote catalog, installed entries from
//! parsing `skills list` output.  Update-check payloads mirror the JSON the
//! update endpoint speaks, hence the camelCase renames.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A catalog entry shown in the gallery or in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    /// Opaque id, unique within its source.
    pub id: String,
    pub name: String,
    pub installs: u64,
    /// `owner/repo`, a URL, or empty.
    pub top_source: String,
}

/// A skill installed in some scope.  Identity is `name` within the scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSkill {
    pub name: String,
    /// Absolute install path as printed by the CLI.
    pub path: String,
    /// Linked agents; empty when not linked.
    pub agents: Vec<String>,
}

// --- command options ---

/// Options for `skills list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub global: bool,
    pub agents: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Options for `skills add`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    pub global: bool,
    pub agents: Vec<String>,
    /// Subset of skills to install from a multi-skill source.
    pub skills: Vec<String>,
    /// Skip the CLI's confirmation prompts.
    pub yes: bool,
    pub cwd: Option<PathBuf>,
}

/// Options for `skills remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub global: bool,
    pub agents: Vec<String>,
    pub cwd: Option<PathBuf>,
}

// --- `skills check` ---

/// One `↑ name` entry from `skills check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliUpdate {
    pub name: String,
    pub source: String,
}

/// Structured reading of `skills check` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliCheckReport {
    pub total_checked: usize,
    pub updates_available: Vec<CliUpdate>,
    pub could_not_check: usize,
}

// --- update-check API ---

/// A skill whose upstream content hash changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillUpdate {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub current_hash: String,
    #[serde(default)]
    pub latest_hash: String,
}

/// A skill the update endpoint could not check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCheckError {
    pub name: String,
    #[serde(default)]
    pub source: String,
    pub error: String,
}

/// Result of [`crate::SkillsCli::check_updates_api`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResult {
    /// Number of lock-file entries submitted.
    pub total_checked: usize,
    pub updates_available: Vec<SkillUpdate>,
    pub errors: Vec<SkillCheckError>,
}

// --- `skills update` ---

/// Result of [`crate::SkillsCli::update_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllResult {
    pub updated_count: usize,
    pub updated_skills: Vec<String>,
}

/// Per-skill update state shown next to an installed skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SkillUpdateStatus {
    Idle,
    Checking,
    UpdateAvailable { source: String },
    UpToDate,
    Error { message: String },
    Updating,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_status_uses_tagged_kebab_case() {
        let v = serde_json::to_value(SkillUpdateStatus::UpdateAvailable {
            source: "user/repo".into(),
        })
        .unwrap();
        assert_eq!(v, json!({ "status": "update-available", "source": "user/repo" }));
        assert_eq!(
            serde_json::to_value(SkillUpdateStatus::UpToDate).unwrap(),
            json!({ "status": "up-to-date" })
        );
    }

    #[test]
    fn update_check_response_entries_decode() {
        let update: SkillUpdate = serde_json::from_value(json!({
            "name": "skill-1",
            "source": "github:user/repo1",
            "currentHash": "hash1",
            "latestHash": "hash1-new"
        }))
        .unwrap();
        assert_eq!(update.latest_hash, "hash1-new");

        let err: SkillCheckError =
            serde_json::from_value(json!({ "name": "skill-1", "error": "Network timeout" })).unwrap();
        assert_eq!(err.source, "");
    }
}
