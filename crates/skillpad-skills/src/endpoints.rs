//! Remote endpoints SkillPad talks to.

use serde::{Deserialize, Serialize};

pub const DEFAULT_GALLERY_API: &str = "https://skills.sh/api";
pub const DEFAULT_GALLERY_SITE: &str = "https://skills.sh";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_RAW_CONTENT: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_UPDATE_CHECK: &str = "https://add-skill.vercel.sh/check-updates";

/// Base URLs, without trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Gallery search API.
    pub gallery_api: String,
    /// Gallery website; skill pages live at `{site}/{source}/{skill}`.
    pub gallery_site: String,
    pub github_api: String,
    /// Raw file host, `{raw}/{owner}/{repo}/{branch}/{path}`.
    pub raw_content: String,
    /// Update-check endpoint that compares lock-file hashes.
    pub update_check: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gallery_api: DEFAULT_GALLERY_API.into(),
            gallery_site: DEFAULT_GALLERY_SITE.into(),
            github_api: DEFAULT_GITHUB_API.into(),
            raw_content: DEFAULT_RAW_CONTENT.into(),
            update_check: DEFAULT_UPDATE_CHECK.into(),
        }
    }
}

impl Endpoints {
    /// Strip trailing slashes so URLs can be joined with `format!`.
    pub fn normalized(mut self) -> Self {
        for url in [
            &mut self.gallery_api,
            &mut self.gallery_site,
            &mut self.github_api,
            &mut self.raw_content,
            &mut self.update_check,
        ] {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
        self
    }
}
