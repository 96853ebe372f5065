//! The `skills` CLI lock file.
//!
//! Written by the CLI at `~/.agents/.skill-lock.json`; SkillPad only reads
//! it, to submit installed skills and their content hashes to the update
//! endpoint.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, SkillError};

/// Lock file location relative to the home directory.
const LOCK_FILE_RELATIVE: &str = ".agents/.skill-lock.json";

/// Default lock file path, if a home directory is known.
pub fn default_lock_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(LOCK_FILE_RELATIVE))
}

/// Parsed lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLock {
    #[serde(default)]
    pub version: u32,
    /// Keyed by skill name.
    #[serde(default)]
    pub skills: BTreeMap<String, LockEntry>,
}

/// One installed skill as recorded by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockEntry {
    pub source: String,
    pub source_type: String,
    pub source_url: String,
    pub skill_path: Option<String>,
    pub skill_folder_hash: String,
    pub installed_at: String,
    pub updated_at: String,
}

impl SkillLock {
    /// Read and parse the lock file at `path`.
    pub async fn read(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SkillError::LockFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let lock: Self = serde_json::from_str(&raw).map_err(|e| SkillError::LockFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), skills = lock.skills.len(), "lock file read");
        Ok(lock)
    }

    /// Request body for the update-check endpoint.
    pub fn update_check_payload(&self) -> Value {
        let skills: Vec<Value> = self
            .skills
            .iter()
            .map(|(name, entry)| {
                json!({
                    "name": name,
                    "source": entry.source,
                    "path": entry.skill_path,
                    "skillFolderHash": entry.skill_folder_hash,
                })
            })
            .collect();
        json!({ "skills": skills })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 1,
        "skills": {
            "skill-2": {
                "source": "github:user/repo2",
                "sourceType": "github",
                "sourceUrl": "https://github.com/user/repo2",
                "skillFolderHash": "hash2",
                "installedAt": "2024-01-02",
                "updatedAt": "2024-01-02"
            },
            "skill-1": {
                "source": "github:user/repo1",
                "sourceType": "github",
                "sourceUrl": "https://github.com/user/repo1",
                "skillPath": "skills/skill-1/SKILL.md",
                "skillFolderHash": "hash1",
                "installedAt": "2024-01-01",
                "updatedAt": "2024-01-01"
            }
        }
    }"#;

    #[tokio::test]
    async fn reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".skill-lock.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let lock = SkillLock::read(&path).await.unwrap();
        assert_eq!(lock.version, 1);
        assert_eq!(lock.skills.len(), 2);
        assert_eq!(lock.skills["skill-1"].skill_folder_hash, "hash1");
        assert_eq!(lock.skills["skill-2"].skill_path, None);
    }

    #[tokio::test]
    async fn missing_file_is_lock_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SkillLock::read(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, SkillError::LockFile { .. }));
        assert!(err.to_string().starts_with("Failed to check updates via API"));
    }

    #[tokio::test]
    async fn garbage_is_lock_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".skill-lock.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SkillLock::read(&path).await.unwrap_err(),
            SkillError::LockFile { .. }
        ));
    }

    #[test]
    fn payload_lists_every_entry() {
        let lock: SkillLock = serde_json::from_str(SAMPLE).unwrap();
        let payload = lock.update_check_payload();
        let skills = payload["skills"].as_array().unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0]["name"], "skill-1");
        assert_eq!(skills[0]["path"], "skills/skill-1/SKILL.md");
        assert_eq!(skills[0]["skillFolderHash"], "hash1");
        assert_eq!(skills[1]["path"], Value::Null);
    }
}
