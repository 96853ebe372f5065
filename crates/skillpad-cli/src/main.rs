//! CLI entry point for SkillPad.
//!
//! This binary provides the `skillpad` command: browse the skills gallery,
//! manage installed skills per scope, manage projects and preferences, and
//! update SkillPad itself.

mod app;
mod cli;
mod commands;
mod config;
mod update;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    let config = AppConfig::load().context("failed to load configuration")?;
    let relaunch_args = std::env::args().skip(1).filter(|a| a != "--restart").collect();
    let app = App::build(&config, relaunch_args).await?;

    // An explicit `self-update` drives the updater itself.
    let auto_check = match &cli.command {
        Commands::SelfUpdate { auto: false, .. } => None,
        _ => app.spawn_auto_check().await,
    };

    let result = match cli.command {
        Commands::SelfUpdate { auto: true, .. } => match auto_check {
            Some(handle) => {
                let found = handle.await.context("automatic update check panicked")?;
                debug!(found, "automatic update check finished");
                commands::report_update_state(&app.updater.state());
                return Ok(());
            }
            None => {
                println!("Automatic update checks are disabled (prefs set --auto-check-updates true).");
                return Ok(());
            }
        },
        command => update::run_alongside(auto_check, dispatch(&app, command)).await,
    };

    if let Err(ref e) = result {
        warn!(error = %format!("{e:#}"), "command failed");
    }
    result
}

async fn dispatch(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::List { project, refresh } => commands::list(app, project, refresh).await,
        Commands::Add {
            source,
            project,
            agents,
            skills,
            yes,
        } => commands::add(app, &source, project, agents, skills, yes).await,
        Commands::Remove {
            name,
            project,
            agents,
        } => commands::remove(app, &name, project, agents).await,
        Commands::Check { api, project } => commands::check(app, api, project).await,
        Commands::UpdateAll { project } => commands::update_all(app, project).await,
        Commands::Gallery => commands::gallery(app).await,
        Commands::Search { query, limit } => commands::search(app, &query, limit).await,
        Commands::Repo { repo } => commands::repo(app, &repo).await,
        Commands::Docs {
            source,
            skill,
            local,
        } => commands::docs(app, &source, skill.as_deref(), local.as_deref()).await,
        Commands::Resolve { source, skill } => commands::resolve(app, &source, &skill).await,
        Commands::Projects { action } => commands::projects(app, action).await,
        Commands::Prefs { action } => commands::prefs(app, action).await,
        Commands::SelfUpdate { check, restart, .. } => {
            commands::self_update(app, check, restart).await
        }
    }
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
