//! CLI argument definitions for SkillPad.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! wiring and dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SkillPad -- manage agent skills from the terminal.
#[derive(Parser)]
#[command(
    name = "skillpad",
    version,
    about = "SkillPad -- browse, install and update agent skills",
    long_about = "Browse the skills gallery, install skills globally or into projects, \
                  and keep them up to date. Skill operations are delegated to the \
                  `skills` CLI through your package runner."
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed skills, globally or in a project.
    List {
        /// Project directory; global skills when omitted.
        #[arg(long, short)]
        project: Option<PathBuf>,
        /// Ignore the cached list.
        #[arg(long)]
        refresh: bool,
    },

    /// Install skills from a source (owner/repo or URL).
    Add {
        source: String,
        /// Install into this project instead of globally.
        #[arg(long, short)]
        project: Option<PathBuf>,
        /// Target agents (comma-separated). Defaults to the preferred agents.
        #[arg(long, short, value_delimiter = ',')]
        agents: Vec<String>,
        /// Only these skills from the source (comma-separated).
        #[arg(long, short, value_delimiter = ',')]
        skills: Vec<String>,
        /// Skip confirmation prompts.
        #[arg(long, short)]
        yes: bool,
    },

    /// Remove an installed skill.
    Remove {
        name: String,
        #[arg(long, short)]
        project: Option<PathBuf>,
        #[arg(long, short, value_delimiter = ',')]
        agents: Vec<String>,
    },

    /// Check installed skills for updates.
    Check {
        /// Use the update-check API instead of `skills check`.
        #[arg(long)]
        api: bool,
        /// Show per-skill statuses for this project.
        #[arg(long, short)]
        project: Option<PathBuf>,
    },

    /// Update every installed skill.
    UpdateAll {
        #[arg(long, short)]
        project: Option<PathBuf>,
    },

    /// Show the skills gallery.
    Gallery,

    /// Search the skills gallery.
    Search {
        query: String,
        /// Maximum number of results.
        #[arg(long, short, default_value_t = skillpad_skills::SEARCH_LIMIT)]
        limit: usize,
    },

    /// List the skills published in a GitHub repository.
    Repo {
        /// `owner/repo`.
        repo: String,
    },

    /// Print a skill's SKILL.md.
    Docs {
        /// `owner/repo` or a URL.
        source: String,
        #[arg(long, short)]
        skill: Option<String>,
        /// Read an installed copy at this path instead of fetching.
        #[arg(long)]
        local: Option<String>,
    },

    /// Print the source `add` should use for a gallery skill.
    Resolve { source: String, skill: String },

    /// Manage registered projects.
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Show or change preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Check for a newer SkillPad release and install it.
    SelfUpdate {
        /// Only check; do not download.
        #[arg(long, short)]
        check: bool,
        /// Run the automatic check (honors the one-hour cooldown).
        #[arg(long, conflicts_with = "check")]
        auto: bool,
        /// Relaunch after installing.
        #[arg(long, conflicts_with = "check")]
        restart: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List registered projects in order.
    List,
    /// Register a project directory.
    Add { path: PathBuf },
    /// Unregister a project by id.
    Remove { id: String },
    /// Move a project to a new position (0-based).
    Move { id: String, to: usize },
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print the effective preferences.
    Show,
    /// Change one or more preferences.
    Set {
        /// `npx`, `pnpx` or `bunx`.
        #[arg(long)]
        package_manager: Option<String>,
        /// Default agents for `add` (comma-separated).
        #[arg(long, value_delimiter = ',')]
        default_agents: Option<Vec<String>>,
        #[arg(long)]
        auto_check_updates: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_splits_comma_lists() {
        let cli = Cli::parse_from([
            "skillpad", "add", "vercel/skills", "-a", "claude,cursor", "-s", "react", "-y",
        ]);
        match cli.command {
            Commands::Add {
                source,
                agents,
                skills,
                yes,
                project,
            } => {
                assert_eq!(source, "vercel/skills");
                assert_eq!(agents, vec!["claude", "cursor"]);
                assert_eq!(skills, vec!["react"]);
                assert!(yes);
                assert!(project.is_none());
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["skillpad", "list", "--verbose", "--refresh"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::List { refresh: true, .. }));
    }

    #[test]
    fn self_update_flags_conflict() {
        assert!(Cli::try_parse_from(["skillpad", "self-update", "--check", "--restart"]).is_err());
        assert!(Cli::try_parse_from(["skillpad", "self-update", "--auto"]).is_ok());
    }
}
