//! Error types for the skills subsystem.

use std::path::PathBuf;

use skillpad_kernel::KernelError;
use skillpad_store::StoreError;

/// Skill-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    // -- skills CLI ---------------------------------------------------------
    /// The `skills` CLI exited non-zero or could not be launched.
    #[error("Failed to {action}: {message}")]
    Cli {
        action: &'static str,
        message: String,
    },

    /// No `SKILL.md` could be read from an installed skill's directory.
    #[error("No local SKILL.md found at {path}")]
    LocalDocumentationNotFound { path: String },

    /// The skill lock file is missing or unparseable.
    #[error("Failed to check updates via API: cannot read lock file `{path}`: {reason}")]
    LockFile { path: PathBuf, reason: String },

    // -- remote APIs --------------------------------------------------------
    /// HTTP failure.  `status` is `None` when no response arrived at all.
    #[error("{message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    /// The GitHub contents API answered 403.
    #[error("GitHub API rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Every documentation candidate for a source was exhausted.
    #[error("Failed to fetch SKILL.md for {origin}")]
    DocumentationNotFound { origin: String },

    // -- wrapped ------------------------------------------------------------
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SkillError {
    pub(crate) fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Api {
            message: message.into(),
            status,
        }
    }

    /// HTTP status carried by an [`SkillError::Api`] failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::RateLimited => Some(403),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SkillError>;
