//! Install-source resolution and documentation lookup.
//!
//! Both lookups walk an ordered list of candidates and stop at the first
//! one that answers.  Results are kept in TTL caches keyed by
//! `(source, skill)`; no eviction runs in the background.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use skillpad_kernel::{HttpRequest, HttpTransport};
use skillpad_store::{DEFAULT_TTL, TtlCache, source_key};
use tracing::{debug, info, warn};

use crate::endpoints::Endpoints;
use crate::error::{Result, SkillError};
use crate::gallery::{GITHUB_ACCEPT, is_repo_query};

/// Branches tried, in order, when reading documentation from a repository.
pub const DOC_BRANCHES: [&str; 2] = ["main", "master"];

static INSTALL_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:npx|pnpx|bunx)\s+skills\s+add\s+(https?://[^\s"'<>`]+)"#)
        .expect("pattern compiles")
});

/// Repository paths that may hold a skill's `SKILL.md`, most specific first.
pub fn doc_paths(skill: Option<&str>) -> Vec<String> {
    let mut paths = Vec::with_capacity(3);
    if let Some(skill) = skill {
        paths.push(format!("skills/{skill}/SKILL.md"));
        paths.push(format!("{skill}/SKILL.md"));
    }
    paths.push("SKILL.md".to_owned());
    paths
}

/// Raw-content URLs tried for `owner/repo` documentation: every path on
/// `main`, then every path on `master`.
pub fn doc_candidates(raw_base: &str, source: &str, skill: Option<&str>) -> Vec<String> {
    let paths = doc_paths(skill);
    DOC_BRANCHES
        .iter()
        .flat_map(|branch| {
            paths
                .iter()
                .map(move |path| format!("{raw_base}/{source}/{branch}/{path}"))
        })
        .collect()
}

/// First `<runner> skills add <url>` URL embedded in `html`.
pub fn extract_install_url(html: &str) -> Option<String> {
    INSTALL_COMMAND
        .captures(html)
        .map(|c| c[1].trim_end_matches(['.', ',', ';', ')']).to_owned())
}

fn is_http_url(source: &str) -> bool {
    source.starts_with("https://") || source.starts_with("http://")
}

#[derive(Debug, Default, Deserialize)]
struct WellKnownIndex {
    #[serde(default)]
    skills: Vec<WellKnownSkill>,
}

#[derive(Debug, Deserialize)]
struct WellKnownSkill {
    name: String,
    #[serde(default)]
    files: Vec<String>,
}

/// Resolves install sources and fetches skill documentation.
pub struct SourceResolver {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    sources: TtlCache<String>,
    docs: TtlCache<String>,
}

impl SourceResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints: endpoints.normalized(),
            sources: TtlCache::builder("install_sources").ttl(DEFAULT_TTL).build(),
            docs: TtlCache::builder("skill_docs").ttl(DEFAULT_TTL).build(),
        }
    }

    /// Replace both caches with ones using `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.sources = TtlCache::builder("install_sources").ttl(ttl).build();
        self.docs = TtlCache::builder("skill_docs").ttl(ttl).build();
        self
    }

    // -- install sources ----------------------------------------------------

    /// The source to pass to `skills add` for `skill`.
    ///
    /// An existing GitHub `owner/repo` is returned as is.  Otherwise the
    /// gallery page is scanned for an install command with an explicit URL.
    /// Falls back to `source` unchanged; never fails.
    pub async fn resolve_install_source(&self, source: &str, skill: &str) -> String {
        let key = source_key(source, Some(skill));
        if let Some(cached) = self.sources.get(&key).await {
            return cached;
        }

        let resolved = self.resolve_uncached(source, skill).await;
        info!(source, skill, %resolved, "install source resolved");
        self.sources.insert(&key, resolved.clone()).await;
        resolved
    }

    async fn resolve_uncached(&self, source: &str, skill: &str) -> String {
        if is_repo_query(source) {
            let url = format!("{}/repos/{source}", self.endpoints.github_api);
            match self
                .transport
                .send(HttpRequest::head(&url).header("Accept", GITHUB_ACCEPT))
                .await
            {
                Ok(r) if r.is_success() => return source.to_owned(),
                Ok(r) => debug!(source, status = r.status, "not a reachable GitHub repository"),
                Err(e) => debug!(source, error = %e, "GitHub repository check failed"),
            }
        }

        let page = format!("{}/{source}/{skill}", self.endpoints.gallery_site);
        match self.transport.send(HttpRequest::get(&page)).await {
            Ok(r) if r.is_success() => {
                if let Some(url) = extract_install_url(&r.body) {
                    return url;
                }
                debug!(%page, "no install command on gallery page");
            }
            Ok(r) => debug!(%page, status = r.status, "gallery page unavailable"),
            Err(e) => debug!(%page, error = %e, "gallery page fetch failed"),
        }

        source.to_owned()
    }

    // -- documentation ------------------------------------------------------

    /// Documentation for `skill` published by `source`.
    ///
    /// HTTP(S) sources go through the well-known discovery flow; anything
    /// else is read as a GitHub `owner/repo` via [`doc_candidates`].
    pub async fn fetch_skill_docs(&self, source: &str, skill: Option<&str>) -> Result<String> {
        let key = source_key(source, skill);
        self.docs
            .get_or_try_insert_with(&key, || async {
                if is_http_url(source) {
                    return self.fetch_well_known_readme(source, skill).await;
                }
                for url in doc_candidates(&self.endpoints.raw_content, source, skill) {
                    if let Some(body) = self.get_text(&url).await {
                        debug!(%url, "documentation found");
                        return Ok(body);
                    }
                }
                warn!(source, skill, "no documentation candidate answered");
                Err(SkillError::DocumentationNotFound {
                    origin: source.to_owned(),
                })
            })
            .await
    }

    /// Documentation from a host publishing `/.well-known/skills`.
    ///
    /// Tries the matching entry's markdown files in manifest order, then
    /// `{source_url}/SKILL.md`.
    pub async fn fetch_well_known_readme(
        &self,
        source_url: &str,
        skill: Option<&str>,
    ) -> Result<String> {
        let base = source_url.trim_end_matches('/');
        let index_url = format!("{base}/.well-known/skills");

        if let Some(index) = self.fetch_index(&index_url).await {
            let entry = match skill {
                Some(name) => index.skills.iter().find(|s| s.name == name),
                None => index.skills.first(),
            };
            if let Some(entry) = entry {
                for file in entry.files.iter().filter(|f| f.ends_with(".md")) {
                    let url = format!(
                        "{index_url}/{}/{}",
                        entry.name,
                        file.trim_start_matches('/')
                    );
                    if let Some(body) = self.get_text(&url).await {
                        return Ok(body);
                    }
                }
            }
        }

        if let Some(body) = self.get_text(&format!("{base}/SKILL.md")).await {
            return Ok(body);
        }

        warn!(source_url, skill, "well-known documentation not found");
        Err(SkillError::DocumentationNotFound {
            origin: source_url.to_owned(),
        })
    }

    async fn fetch_index(&self, url: &str) -> Option<WellKnownIndex> {
        let body = self.get_text(url).await?;
        match serde_json::from_str(&body) {
            Ok(index) => Some(index),
            Err(e) => {
                debug!(url, error = %e, "well-known index unparseable");
                None
            }
        }
    }

    /// Body of a 2xx GET, or `None` for any other outcome.
    async fn get_text(&self, url: &str) -> Option<String> {
        match self.transport.send(HttpRequest::get(url)).await {
            Ok(r) if r.is_success() => Some(r.body),
            Ok(r) => {
                debug!(url, status = r.status, "candidate missed");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "candidate failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "https://raw.githubusercontent.com";

    #[test]
    fn candidates_with_skill_name() {
        assert_eq!(
            doc_candidates(RAW, "vercel/skills", Some("react")),
            vec![
                format!("{RAW}/vercel/skills/main/skills/react/SKILL.md"),
                format!("{RAW}/vercel/skills/main/react/SKILL.md"),
                format!("{RAW}/vercel/skills/main/SKILL.md"),
                format!("{RAW}/vercel/skills/master/skills/react/SKILL.md"),
                format!("{RAW}/vercel/skills/master/react/SKILL.md"),
                format!("{RAW}/vercel/skills/master/SKILL.md"),
            ]
        );
    }

    #[test]
    fn candidates_without_skill_name() {
        assert_eq!(
            doc_candidates(RAW, "o/r", None),
            vec![format!("{RAW}/o/r/main/SKILL.md"), format!("{RAW}/o/r/master/SKILL.md")]
        );
    }

    #[test]
    fn install_url_is_extracted_from_html() {
        let html = r#"<pre><code>npx skills add https://docs.example.com/skills</code></pre>"#;
        assert_eq!(
            extract_install_url(html).as_deref(),
            Some("https://docs.example.com/skills")
        );
        let html = "Run `bunx skills add https://x.dev`.";
        assert_eq!(extract_install_url(html).as_deref(), Some("https://x.dev"));
        assert_eq!(extract_install_url("npx skills add vercel/skills"), None);
    }

    #[test]
    fn http_sources_are_detected() {
        assert!(is_http_url("https://x.dev"));
        assert!(is_http_url("http://localhost:3000"));
        assert!(!is_http_url("vercel/skills"));
    }
}
