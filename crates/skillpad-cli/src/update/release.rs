//! Release backend for `skillpad self-update`.
//!
//! Reads the published update manifest, compares its version with the
//! running binary, and downloads and atomically replaces the current
//! executable.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use skillpad_kernel::{HttpRequest, HttpTransport};
use tracing::{debug, info, warn};

use super::{PendingUpdate, Relauncher, UpdateSource};

pub const DEFAULT_MANIFEST_URL: &str =
    "https://github.com/devxoul/skillpad/releases/latest/download/latest.json";

/// Version of the running binary.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(windows)]
const BINARY_NAME: &str = "skillpad.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "skillpad";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// The published `latest.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub platforms: Platforms,
}

/// Platform assets in the order the manifest lists them.
#[derive(Debug, Clone, Default)]
pub struct Platforms(Vec<(String, PlatformAsset)>);

impl Platforms {
    fn get(&self, key: &str) -> Option<&PlatformAsset> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, asset)| asset)
    }

    fn first(&self) -> Option<&PlatformAsset> {
        self.0.first().map(|(_, asset)| asset)
    }
}

impl<'de> Deserialize<'de> for Platforms {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PlatformsVisitor;

        impl<'de> Visitor<'de> for PlatformsVisitor {
            type Value = Platforms;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of platform keys to assets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Platforms, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, asset)) = map.next_entry::<String, PlatformAsset>()? {
                    entries.push((key, asset));
                }
                Ok(Platforms(entries))
            }
        }

        deserializer.deserialize_map(PlatformsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlatformAsset {
    pub url: String,
    #[serde(default)]
    pub signature: String,
}

impl Manifest {
    /// Asset for `key`, or the first published one.
    pub fn asset_for(&self, key: &str) -> Option<&PlatformAsset> {
        self.platforms.get(key).or_else(|| self.platforms.first())
    }

    /// URL of the first platform binary, probed before offering the update.
    pub fn first_url(&self) -> Option<&str> {
        self.platforms.first().map(|a| a.url.as_str())
    }
}

/// `<os>-<arch>` key of the running platform, e.g. `darwin-aarch64`.
pub fn platform_key() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    format!("{os}-{}", std::env::consts::ARCH)
}

// ---------------------------------------------------------------------------
// Release versions
// ---------------------------------------------------------------------------

/// Dotted numeric release version.  A leading `v` and any pre-release or
/// build suffix (`-beta.1`, `+sha`) are ignored; missing trailing
/// components compare as zero, so `1.2` equals `1.2.0`.
#[derive(Debug, Clone)]
struct ReleaseVersion(Vec<u64>);

impl ReleaseVersion {
    fn parse(raw: &str) -> Self {
        let core = raw.trim().trim_start_matches('v');
        let core = core.split(['-', '+']).next().unwrap_or_default();
        Self(core.split('.').map(|part| part.parse().unwrap_or(0)).collect())
    }

    fn component(&self, i: usize) -> u64 {
        self.0.get(i).copied().unwrap_or(0)
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Whether the published `latest` release is strictly newer than `running`.
pub fn is_newer(latest: &str, running: &str) -> bool {
    ReleaseVersion::parse(latest) > ReleaseVersion::parse(running)
}

// ---------------------------------------------------------------------------
// UpdateSource
// ---------------------------------------------------------------------------

/// [`UpdateSource`] backed by the published manifest.
pub struct ManifestSource {
    transport: Arc<dyn HttpTransport>,
    manifest_url: String,
    current_version: String,
}

impl ManifestSource {
    pub fn new(transport: Arc<dyn HttpTransport>, manifest_url: impl Into<String>) -> Self {
        Self {
            transport,
            manifest_url: manifest_url.into(),
            current_version: CURRENT_VERSION.to_owned(),
        }
    }

    /// Compare against `version` instead of the running binary's.
    #[cfg(test)]
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }
}

#[async_trait]
impl UpdateSource for ManifestSource {
    async fn check(&self) -> Result<Option<Arc<dyn PendingUpdate>>> {
        let response = self
            .transport
            .send(HttpRequest::get(&self.manifest_url))
            .await
            .context("failed to reach the update manifest")?;
        if !response.is_success() {
            bail!("update manifest returned {} {}", response.status, response.reason());
        }
        let manifest: Manifest = response
            .json(&self.manifest_url)
            .context("failed to parse the update manifest")?;

        if !is_newer(&manifest.version, &self.current_version) {
            debug!(latest = %manifest.version, current = %self.current_version, "no newer release");
            return Ok(None);
        }

        info!(latest = %manifest.version, current = %self.current_version, "newer release published");
        Ok(Some(Arc::new(ReleaseUpdate::new(manifest)?)))
    }
}

// ---------------------------------------------------------------------------
// PendingUpdate
// ---------------------------------------------------------------------------

/// A newer release, ready to be downloaded.
pub struct ReleaseUpdate {
    manifest: Manifest,
    client: reqwest::Client,
}

impl ReleaseUpdate {
    pub fn new(manifest: Manifest) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("skillpad/{CURRENT_VERSION}"))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { manifest, client })
    }
}

#[async_trait]
impl PendingUpdate for ReleaseUpdate {
    fn version(&self) -> &str {
        &self.manifest.version
    }

    fn probe_url(&self) -> Option<&str> {
        self.manifest.first_url()
    }

    async fn download_and_install(&self) -> Result<()> {
        let key = platform_key();
        let Some(asset) = self.manifest.asset_for(&key) else {
            bail!("release {} publishes no binaries", self.manifest.version);
        };
        info!(platform = %key, url = %asset.url, "downloading release");
        debug!(signature = %asset.signature, "release signature");

        let download = download_to_temp(&self.client, &asset.url).await?;

        let replaced = if is_archive(&asset.url) {
            let bin_tmp = tempfile::NamedTempFile::new()
                .context("failed to create temp file for extracted binary")?;
            extract_binary_from_targz(download.path(), bin_tmp.path()).with_context(|| {
                format!("release {} archive {} is unusable", self.manifest.version, asset.url)
            })?;
            replace_binary(bin_tmp.path())
        } else {
            replace_binary(download.path())
        };
        replaced.with_context(|| format!("failed to install skillpad {}", self.manifest.version))?;

        info!(version = %self.manifest.version, "release installed");
        Ok(())
    }
}

fn is_archive(url: &str) -> bool {
    url.ends_with(".tar.gz") || url.ends_with(".tgz")
}

// ---------------------------------------------------------------------------
// Binary replacement
// ---------------------------------------------------------------------------

/// Downloads `url` into a temp file.
async fn download_to_temp(client: &reqwest::Client, url: &str) -> Result<tempfile::NamedTempFile> {
    let bytes = client
        .get(url)
        .send()
        .await
        .context("HTTP request failed")?
        .error_for_status()
        .context("server returned an error status")?
        .bytes()
        .await
        .context("failed to read response body")?;

    let mut tmp = tempfile::NamedTempFile::new().context("failed to create temp file")?;
    tmp.write_all(&bytes)
        .context("failed to write download to temp file")?;
    debug!(url, bytes = bytes.len(), "download complete");
    Ok(tmp)
}

/// Unpacks the first regular file named [`BINARY_NAME`] from a release
/// `.tar.gz` into `dest`.  Directory entries and links with that name
/// (e.g. a `skillpad/` folder) are skipped.
fn extract_binary_from_targz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .with_context(|| format!("cannot open release archive {}", archive_path.display()))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));

    let entries = archive.entries().context("release archive is not a tar.gz")?;
    for entry in entries {
        let mut entry = entry.context("corrupt entry in release archive")?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let entry_path = entry.path().context("release archive entry has no path")?.into_owned();
        if entry_path.file_name().and_then(|n| n.to_str()) != Some(BINARY_NAME) {
            continue;
        }

        debug!(entry = %entry_path.display(), "found release binary");
        entry
            .unpack(dest)
            .with_context(|| format!("cannot unpack {} from release archive", entry_path.display()))?;
        return Ok(());
    }

    bail!("release archive does not contain '{BINARY_NAME}'")
}

/// Replaces the running executable with `new_bin`.
fn replace_binary(new_bin: &Path) -> Result<()> {
    let current_exe = std::env::current_exe().context("failed to locate current executable")?;
    // Resolve symlinks so we write to the real file.
    let current_exe = fs::canonicalize(&current_exe).unwrap_or(current_exe);
    replace_binary_at(&current_exe, new_bin)
}

/// Copy `new_bin` next to `target`, move `target` aside, rename the copy
/// into place, then delete the old file.
fn replace_binary_at(target: &Path, new_bin: &Path) -> Result<()> {
    let new_path = target.with_extension("new");
    let old_path = target.with_extension("old");

    // Same filesystem as the target, so the renames are atomic.
    fs::copy(new_bin, &new_path).context("failed to copy new binary into place")?;

    #[cfg(unix)]
    {
        let mut perms = fs::metadata(&new_path)
            .context("failed to read new binary metadata")?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&new_path, perms).context("failed to chmod new binary")?;
    }

    fs::rename(target, &old_path).context("failed to move current binary aside")?;
    if let Err(e) = fs::rename(&new_path, target) {
        // Put the running binary back so skillpad stays launchable.
        if let Err(restore) = fs::rename(&old_path, target) {
            warn!(path = %target.display(), error = %restore, "could not restore previous binary");
        }
        let _ = fs::remove_file(&new_path);
        return Err(e).context("failed to move new binary into place");
    }

    if let Err(e) = fs::remove_file(&old_path) {
        debug!(path = %old_path.display(), error = %e, "old binary left behind");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Relauncher
// ---------------------------------------------------------------------------

/// Starts the (replaced) executable again and exits this process.
pub struct ProcessRelauncher {
    args: Vec<String>,
}

impl ProcessRelauncher {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl Relauncher for ProcessRelauncher {
    fn relaunch(&self) -> Result<()> {
        let exe: PathBuf = std::env::current_exe().context("failed to locate current executable")?;
        std::process::Command::new(&exe)
            .args(&self.args)
            .spawn()
            .with_context(|| format!("failed to relaunch {}", exe.display()))?;
        info!(exe = %exe.display(), "relaunched, exiting");
        std::process::exit(0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
