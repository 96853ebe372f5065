//! # skillpad-store
//!
//! Persistence for SkillPad.
//!
//! One JSON document on disk holds everything that survives a restart
//! (preferences, tracked projects, the last update-check timestamp).  Remote
//! lookups share process-lifetime TTL caches built on `moka`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  PreferencesStore     ProjectStore       │
//! ├──────────────────────────────────────────┤
//! │  DocumentStore (JSON object, atomic save)│
//! └──────────────────────────────────────────┘
//!   TtlCache (moka, lazy expiry, in-memory)
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use skillpad_store::{DocumentStore, PreferencesStore, ProjectStore};
//!
//! let store = DocumentStore::open("skillpad.json").await?;
//! let prefs = PreferencesStore::new(store.clone()).load().await;
//! let projects = ProjectStore::new(store).list().await;
//! ```

pub mod cache;
pub mod document;
pub mod error;
pub mod preferences;
pub mod projects;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{CacheStats, DEFAULT_TTL, TtlCache, TtlCacheBuilder, source_key};
pub use document::{DocumentStore, LAST_UPDATE_CHECK_KEY, PREFERENCES_KEY, PROJECTS_KEY};
pub use error::{StoreError, StoreResult};
pub use preferences::{PackageManager, Preferences, PreferencesStore};
pub use projects::{Project, ProjectStore};
