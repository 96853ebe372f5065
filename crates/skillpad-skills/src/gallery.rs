//! Gallery client: the skills.sh catalog and GitHub repository listings.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use skillpad_kernel::{HttpRequest, HttpResponse, HttpTransport, KernelError};
use tracing::{debug, warn};

use crate::endpoints::Endpoints;
use crate::error::{Result, SkillError};
use crate::types::SkillSummary;

/// Broad query the gallery view is populated with.
const GALLERY_QUERY: &str = "sk";
const GALLERY_LIMIT: usize = 200;
/// Default page size for interactive search.
pub const SEARCH_LIMIT: usize = 20;
/// Queries shorter than this (after trimming) are not sent.
const MIN_QUERY_CHARS: usize = 2;

pub(crate) const GITHUB_ACCEPT: &str = "application/vnd.github+json";

static REPO_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("pattern compiles"));

/// Whether `query` names a single `owner/repo`.
pub fn is_repo_query(query: &str) -> bool {
    REPO_QUERY.is_match(query.trim())
}

/// Percent-encode a query component the way browsers' `encodeURIComponent`
/// does for the characters that matter here (space becomes `%20`).
pub(crate) fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `ApiError` for a request that never got a response.
pub(crate) fn network_error(err: KernelError) -> SkillError {
    let reason = match err {
        KernelError::Transport(reason) => reason,
        other => other.to_string(),
    };
    SkillError::api(format!("Network error: {reason}"), None)
}

// --- API response types ---

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    skills: Vec<ApiSkill>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSkill {
    #[serde(default)]
    id: String,
    #[serde(default)]
    skill_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    installs: u64,
    #[serde(default)]
    source: String,
}

impl From<ApiSkill> for SkillSummary {
    fn from(s: ApiSkill) -> Self {
        Self {
            id: if s.id.is_empty() { s.skill_id } else { s.id },
            name: s.name,
            installs: s.installs,
            top_source: s.source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// HTTP client for the remote skill catalog.
pub struct GalleryClient {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
}

impl GalleryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints: endpoints.normalized(),
        }
    }

    /// The catalog shown on the gallery page.
    pub async fn fetch_gallery(&self) -> Result<Vec<SkillSummary>> {
        self.search_endpoint(GALLERY_QUERY, GALLERY_LIMIT, "fetch skills")
            .await
    }

    /// Search the catalog.  Queries under two characters return nothing
    /// without touching the network.
    pub async fn search_skills(&self, query: &str, limit: usize) -> Result<Vec<SkillSummary>> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }
        self.search_endpoint(query, limit, "search skills").await
    }

    async fn search_endpoint(
        &self,
        query: &str,
        limit: usize,
        action: &str,
    ) -> Result<Vec<SkillSummary>> {
        let url = format!(
            "{}/search?q={}&limit={limit}",
            self.endpoints.gallery_api,
            encode_component(query)
        );

        let response = self
            .transport
            .send(HttpRequest::get(&url))
            .await
            .map_err(network_error)?;
        if !response.is_success() {
            return Err(SkillError::api(
                format!("Failed to {action}: {}", response.reason()),
                Some(response.status),
            ));
        }

        let body = match response.json::<SearchResponse>(&url) {
            Ok(body) => body,
            Err(e) => {
                warn!(%url, error = %e, "malformed gallery response, treating as empty");
                SearchResponse::default()
            }
        };
        debug!(query, count = body.skills.len(), "gallery search");
        Ok(body.skills.into_iter().map(SkillSummary::from).collect())
    }

    /// Skills published in a GitHub repository.
    ///
    /// Lists `skills/` via the contents API; when that directory is absent,
    /// a root `SKILL.md` makes the whole repository one skill.
    pub async fn fetch_repo_skills(&self, owner: &str, repo: &str) -> Result<Vec<SkillSummary>> {
        let base = format!("{}/repos/{owner}/{repo}/contents", self.endpoints.github_api);
        let listing = self.github_get(&format!("{base}/skills")).await?;

        if listing.is_success() {
            if let Ok(entries) = serde_json::from_str::<Vec<ContentEntry>>(&listing.body) {
                let skills: Vec<SkillSummary> = entries
                    .into_iter()
                    .filter(|e| e.kind == "dir")
                    .map(|e| SkillSummary {
                        id: format!("repo:{owner}/{repo}:{}", e.name),
                        name: e.name,
                        installs: 0,
                        top_source: format!("{owner}/{repo}"),
                    })
                    .collect();
                debug!(owner, repo, count = skills.len(), "repository skills listed");
                return Ok(skills);
            }
            debug!(owner, repo, "skills/ is not a directory, checking root");
        } else if listing.status != 404 {
            return Err(repo_error(&listing));
        }

        let root = self.github_get(&format!("{base}/SKILL.md")).await?;
        match root.status {
            s if (200..300).contains(&s) => Ok(vec![SkillSummary {
                id: format!("repo:{owner}/{repo}"),
                name: repo.to_owned(),
                installs: 0,
                top_source: format!("{owner}/{repo}"),
            }]),
            404 => Ok(Vec::new()),
            _ => Err(repo_error(&root)),
        }
    }

    async fn github_get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .transport
            .send(HttpRequest::get(url).header("Accept", GITHUB_ACCEPT))
            .await
            .map_err(network_error)?;
        if response.status == 403 {
            warn!(url, "GitHub API rate limit hit");
            return Err(SkillError::RateLimited);
        }
        Ok(response)
    }
}

fn repo_error(response: &HttpResponse) -> SkillError {
    SkillError::api(
        format!("Failed to fetch repository skills: {}", response.reason()),
        Some(response.status),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_query_classifier() {
        assert!(is_repo_query("xoul/skills"));
        assert!(is_repo_query("  vercel-labs/agent.skills  "));
        assert!(!is_repo_query("xoul/skills/extra"));
        assert!(!is_repo_query("xoul"));
        assert!(!is_repo_query("react hooks"));
        assert!(!is_repo_query("/skills"));
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("React Native"), "React%20Native");
        assert_eq!(encode_component("a+b&c"), "a%2Bb%26c");
    }

    #[test]
    fn network_error_keeps_reason_only() {
        let err = network_error(KernelError::Transport("Connection refused".into()));
        assert_eq!(err.to_string(), "Network error: Connection refused");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn api_skill_maps_source_to_top_source() {
        let skill: ApiSkill = serde_json::from_str(
            r#"{"id":"1","skillId":"react","name":"React","installs":1000,"source":"opencode/skills"}"#,
        )
        .unwrap();
        let summary = SkillSummary::from(skill);
        assert_eq!(summary.id, "1");
        assert_eq!(summary.top_source, "opencode/skills");
        assert_eq!(summary.installs, 1000);
    }
}
