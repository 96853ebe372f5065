//! Skill management for SkillPad.
//!
//! This crate provides:
//!
//! - **[`SkillsCli`]** -- typed gateway to the external `skills` CLI.  Every
//!   invocation goes through the kernel's exclusive command queue; output is
//!   sanitized and parsed by [`parser`].
//!
//! - **[`GalleryClient`]** -- the remote skill catalog (search, gallery,
//!   GitHub repository listings).
//!
//! - **[`SourceResolver`]** -- install-source resolution and documentation
//!   lookup over ordered fallback candidates, with TTL caches.
//!
//! - **[`InstalledSkillsCache`]** -- per-scope cache of installed skills and
//!   their update statuses.
//!
//! # Example
//!
//! ```rust,ignore
//! use skillpad_skills::{InstalledSkillsCache, Scope, SkillsCli};
//!
//! let cli = Arc::new(SkillsCli::new(queue, preferences, transport, &endpoints));
//! let cache = InstalledSkillsCache::new(cli);
//! let entry = cache.fetch_for_scope(&Scope::Global, false).await;
//! ```

pub mod endpoints;
pub mod error;
pub mod gallery;
pub mod gateway;
pub mod installed;
pub mod lockfile;
pub mod parser;
pub mod resolver;
pub mod types;

pub use endpoints::Endpoints;
pub use error::{Result, SkillError};
pub use gallery::{GalleryClient, SEARCH_LIMIT, is_repo_query};
pub use gateway::{SkillsCli, build_args, expand_tilde, failure_message};
pub use installed::{CACHE_DURATION, InstalledSkillsCache, Scope, ScopeCacheEntry, ScopeUpdateStatus};
pub use lockfile::{LockEntry, SkillLock, default_lock_file};
pub use parser::{parse_check_output, parse_skill_list, parse_update_output};
pub use resolver::{SourceResolver, doc_candidates, doc_paths};
pub use types::{
    AddOptions, CliCheckReport, CliUpdate, InstalledSkill, ListOptions, RemoveOptions,
    SkillCheckError, SkillSummary, SkillUpdate, SkillUpdateStatus, UpdateAllResult,
    UpdateCheckResult,
};
