//! Gateway to the external `skills` CLI.
//!
//! Every invocation is routed through the shared [`CommandQueue`], so two
//! CLI processes never touch the lock file or install directories at the
//! same time.  Output is ANSI-stripped before it is parsed or quoted in an
//! error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use skillpad_kernel::{CommandOutput, CommandQueue, CommandSpec, HttpRequest, HttpTransport, strip_ansi};
use skillpad_store::{PackageManager, PreferencesStore};
use tracing::{debug, info, instrument, warn};

use crate::endpoints::Endpoints;
use crate::error::{Result, SkillError};
use crate::lockfile::{SkillLock, default_lock_file};
use crate::parser::{parse_check_output, parse_skill_list, parse_update_output, strip_runner_noise};
use crate::types::{
    AddOptions, CliCheckReport, InstalledSkill, ListOptions, RemoveOptions, SkillCheckError,
    SkillUpdate, UpdateAllResult, UpdateCheckResult,
};

/// Printed by the CLI when a scope has no skills directory yet.
const MISSING_DIR: &str = "No such file or directory";

/// Prefix for update-check API failures.
const API_CHECK_FAILED: &str = "Failed to check updates via API";

/// Argument vector for `skills <subcommand...>` under `pm`.
///
/// `npx` gets a leading `-y` so it never prompts to install the package.
pub fn build_args<I, S>(pm: PackageManager, subcommand: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = Vec::new();
    if pm == PackageManager::Npx {
        args.push("-y".to_owned());
    }
    args.push("skills".to_owned());
    args.extend(subcommand.into_iter().map(Into::into));
    args
}

fn push_list_flag(args: &mut Vec<String>, flag: &str, values: &[String]) {
    if !values.is_empty() {
        args.push(flag.to_owned());
        args.push(values.join(","));
    }
}

/// Human-readable failure text for a non-zero exit.
///
/// Prefers stderr (minus package-runner chatter), then stdout, then the
/// exit code.
pub fn failure_message(output: &CommandOutput) -> String {
    let stderr = strip_runner_noise(&strip_ansi(&output.stderr));
    let stderr = stderr.trim();
    let stdout = strip_ansi(&output.stdout);
    let stdout = stdout.trim();

    if !stderr.is_empty() {
        stderr.to_owned()
    } else if !stdout.is_empty() {
        stdout.to_owned()
    } else {
        format!("Command exited with code {}", output.exit_code)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[derive(Debug, serde::Deserialize)]
struct CheckUpdatesResponse {
    #[serde(default)]
    updates: Vec<SkillUpdate>,
    #[serde(default)]
    errors: Vec<SkillCheckError>,
}

/// Typed front end for the `skills` CLI and its update-check endpoint.
pub struct SkillsCli {
    queue: CommandQueue,
    preferences: PreferencesStore,
    transport: Arc<dyn HttpTransport>,
    update_check_url: String,
    lock_file: PathBuf,
}

impl SkillsCli {
    pub fn new(
        queue: CommandQueue,
        preferences: PreferencesStore,
        transport: Arc<dyn HttpTransport>,
        endpoints: &Endpoints,
    ) -> Self {
        Self {
            queue,
            preferences,
            transport,
            update_check_url: endpoints.update_check.clone(),
            lock_file: default_lock_file().unwrap_or_else(|| PathBuf::from(".skill-lock.json")),
        }
    }

    /// Read the lock file from `path` instead of the home directory.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = path.into();
        self
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Launch `skills <subcommand>` through the queue.  Only launch failures
    /// are errors here; the exit code is left to the caller.
    async fn launch(
        &self,
        action: &'static str,
        subcommand: Vec<String>,
        cwd: Option<PathBuf>,
    ) -> Result<CommandOutput> {
        let pm = self.preferences.package_manager().await;
        let spec = CommandSpec::new(pm.program(), build_args(pm, subcommand)).current_dir(cwd);
        debug!(command = %spec.display(), "queueing skills command");

        self.queue.execute(spec).await.map_err(|e| {
            warn!(action, error = %e, "skills command did not launch");
            SkillError::Cli {
                action,
                message: e.to_string(),
            }
        })
    }

    /// [`Self::launch`], with a non-zero exit mapped to [`SkillError::Cli`].
    async fn run(
        &self,
        action: &'static str,
        subcommand: Vec<String>,
        cwd: Option<PathBuf>,
    ) -> Result<CommandOutput> {
        let output = self.launch(action, subcommand, cwd).await?;
        if !output.success() {
            let message = failure_message(&output);
            warn!(action, exit_code = output.exit_code, %message, "skills command failed");
            return Err(SkillError::Cli { action, message });
        }
        Ok(output)
    }

    /// `skills list`.
    #[instrument(skip(self, options), fields(global = options.global))]
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<InstalledSkill>> {
        let mut args = vec!["list".to_owned()];
        if options.global {
            args.push("-g".to_owned());
        }
        push_list_flag(&mut args, "-a", &options.agents);

        let action = "list skills";
        let output = self.launch(action, args, options.cwd.clone()).await?;
        if !output.success() {
            let message = failure_message(&output);
            if message.contains(MISSING_DIR) {
                debug!("skills directory absent, treating as empty");
                return Ok(Vec::new());
            }
            warn!(action, exit_code = output.exit_code, %message, "skills command failed");
            return Err(SkillError::Cli { action, message });
        }

        let skills = parse_skill_list(&strip_ansi(&output.stdout));
        debug!(count = skills.len(), "skills listed");
        Ok(skills)
    }

    /// `skills add <source>`.
    #[instrument(skip(self, options))]
    pub async fn add(&self, source: &str, options: &AddOptions) -> Result<()> {
        let mut args = vec!["add".to_owned(), source.to_owned()];
        if options.global {
            args.push("-g".to_owned());
        }
        push_list_flag(&mut args, "-a", &options.agents);
        push_list_flag(&mut args, "-s", &options.skills);
        if options.yes {
            args.push("-y".to_owned());
        }

        self.run("add skill", args, options.cwd.clone()).await?;
        info!(source, "skill added");
        Ok(())
    }

    /// `skills remove <name> -y`.
    #[instrument(skip(self, options))]
    pub async fn remove(&self, name: &str, options: &RemoveOptions) -> Result<()> {
        let mut args = vec!["remove".to_owned(), name.to_owned(), "-y".to_owned()];
        if options.global {
            args.push("-g".to_owned());
        }
        push_list_flag(&mut args, "-a", &options.agents);

        self.run("remove skill", args, options.cwd.clone()).await?;
        info!(name, "skill removed");
        Ok(())
    }

    /// `skills check`, returning sanitized stdout.
    pub async fn check(&self) -> Result<String> {
        let output = self.run("check updates", vec!["check".to_owned()], None).await?;
        Ok(strip_ansi(&output.stdout))
    }

    /// `skills check`, parsed.
    pub async fn check_report(&self) -> Result<CliCheckReport> {
        Ok(parse_check_output(&self.check().await?))
    }

    /// `skills update`.
    pub async fn update_all(&self) -> Result<UpdateAllResult> {
        let output = self.run("update skills", vec!["update".to_owned()], None).await?;
        let result = parse_update_output(&strip_ansi(&output.stdout));
        info!(updated = result.updated_count, "skills updated");
        Ok(result)
    }

    /// Submit the lock file to the update-check endpoint.
    pub async fn check_updates_api(&self) -> Result<UpdateCheckResult> {
        let lock = SkillLock::read(&self.lock_file).await?;
        let url = self.update_check_url.as_str();

        let request = HttpRequest::post_json(url, lock.update_check_payload())
            .header("Content-Type", "application/json");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| SkillError::api(format!("{API_CHECK_FAILED}: {e}"), None))?;

        if !response.is_success() {
            return Err(SkillError::api(
                format!("{API_CHECK_FAILED}: {} {}", response.status, response.reason()),
                Some(response.status),
            ));
        }

        let body: CheckUpdatesResponse = response
            .json(url)
            .map_err(|e| SkillError::api(format!("{API_CHECK_FAILED}: {e}"), Some(response.status)))?;

        info!(
            checked = lock.skills.len(),
            updates = body.updates.len(),
            errors = body.errors.len(),
            "update check finished"
        );
        Ok(UpdateCheckResult {
            total_checked: lock.skills.len(),
            updates_available: body.updates,
            errors: body.errors,
        })
    }

    /// Read an installed skill's documentation from disk.
    ///
    /// Tries `{path}/SKILL.md`, then `path` itself.  Whitespace-only files
    /// count as missing.
    pub async fn read_local_skill_md(&self, install_path: &str) -> Result<String> {
        let base = expand_tilde(install_path);
        for candidate in [base.join("SKILL.md"), base] {
            match tokio::fs::read_to_string(&candidate).await {
                Ok(content) if !content.trim().is_empty() => return Ok(content),
                Ok(_) => debug!(path = %candidate.display(), "local SKILL.md is empty"),
                Err(e) => debug!(path = %candidate.display(), error = %e, "local SKILL.md unreadable"),
            }
        }
        Err(SkillError::LocalDocumentationNotFound {
            path: install_path.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npx_gets_yes_flag() {
        assert_eq!(build_args(PackageManager::Npx, ["list"]), vec!["-y", "skills", "list"]);
        assert_eq!(build_args(PackageManager::Bunx, ["list"]), vec!["skills", "list"]);
        assert_eq!(build_args(PackageManager::Pnpx, ["check"]), vec!["skills", "check"]);
    }

    #[test]
    fn failure_prefers_stderr_then_stdout_then_code() {
        let out = |code, stdout: &str, stderr: &str| CommandOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        };

        assert_eq!(failure_message(&out(1, "", "\x1B[31mError\x1B[0m")), "Error");
        assert_eq!(
            failure_message(&out(
                1,
                "Failed to clone repository",
                "Resolving dependencies\nResolved, downloaded and extracted [2]\nSaved lockfile"
            )),
            "Failed to clone repository"
        );
        assert_eq!(
            failure_message(&out(1, "", "Resolving dependencies\nSaved lockfile")),
            "Command exited with code 1"
        );
    }

    #[test]
    fn tilde_expansion() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/.agents/skills/x"), home.join(".agents/skills/x"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("~other/x"), PathBuf::from("~other/x"));
    }
}
