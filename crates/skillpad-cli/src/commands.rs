//! Subcommand handlers.
//!
//! Each handler drives one core operation through the [`App`] and prints a
//! plain-text rendering of the result.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use skillpad_skills::{
    AddOptions, InstalledSkill, Scope, SkillSummary, SkillUpdateStatus, is_repo_query,
};
use skillpad_store::PackageManager;
use tracing::info;

use crate::app::App;
use crate::cli::{PrefsAction, ProjectAction};
use crate::update::AppUpdateState;

// ═══════════════════════════════════════════════════════════════════════
//  Installed skills
// ═══════════════════════════════════════════════════════════════════════

/// `Scope::Global` without a project, else the project's absolute path.
pub fn scope_for(project: Option<PathBuf>) -> Result<Scope> {
    match project {
        None => Ok(Scope::Global),
        Some(path) => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("invalid project path {}", path.display()))?;
            Ok(Scope::Project(path))
        }
    }
}

pub async fn list(app: &App, project: Option<PathBuf>, refresh: bool) -> Result<()> {
    let scope = scope_for(project)?;
    let entry = app.installed.fetch_for_scope(&scope, refresh).await;
    if let Some(error) = entry.error {
        bail!(error);
    }

    if entry.skills.is_empty() {
        println!("No skills installed ({scope}).");
        return Ok(());
    }
    println!("Installed skills ({scope}):");
    for skill in &entry.skills {
        println!("{}", format_installed(skill));
    }
    Ok(())
}

pub async fn add(
    app: &App,
    source: &str,
    project: Option<PathBuf>,
    agents: Vec<String>,
    skills: Vec<String>,
    yes: bool,
) -> Result<()> {
    let scope = scope_for(project)?;
    let agents = if agents.is_empty() {
        app.preferences.load().await.default_agents
    } else {
        agents
    };

    let list = scope.list_options();
    let options = AddOptions {
        global: list.global,
        agents,
        skills,
        yes,
        cwd: list.cwd,
    };
    app.cli().add(source, &options).await?;
    app.installed.invalidate(Some(&[scope.clone()]));

    println!("Installed {source} ({scope}).");
    Ok(())
}

pub async fn remove(
    app: &App,
    name: &str,
    project: Option<PathBuf>,
    agents: Vec<String>,
) -> Result<()> {
    let scope = scope_for(project)?;
    let entry = app.installed.remove_and_refetch(&scope, name, agents).await?;
    println!(
        "Removed {name} ({scope}); {} skill(s) remain.",
        entry.skills.len()
    );
    Ok(())
}

pub async fn check(app: &App, api: bool, project: Option<PathBuf>) -> Result<()> {
    if !api && project.is_none() {
        let report = app.cli().check_report().await?;
        println!("Checked {} skill(s).", report.total_checked);
        for update in &report.updates_available {
            println!("  ↑ {}  ({})", update.name, update.source);
        }
        if report.could_not_check > 0 {
            println!("Could not check {} skill(s).", report.could_not_check);
        }
        if report.updates_available.is_empty() {
            println!("All skills are up to date.");
        }
        return Ok(());
    }

    let scope = scope_for(project)?;
    let entry = app.installed.fetch_for_scope(&scope, false).await;
    if let Some(error) = entry.error {
        bail!(error);
    }
    if entry.skills.is_empty() {
        println!("No skills installed ({scope}).");
        return Ok(());
    }

    let Some(status) = app.installed.check_updates(&scope, true).await else {
        bail!("Failed to check updates; see the log for details");
    };
    for (name, state) in &status.statuses {
        println!("{name:<32} {}", describe_status(state));
    }
    Ok(())
}

pub async fn update_all(app: &App, project: Option<PathBuf>) -> Result<()> {
    let scope = scope_for(project)?;
    let result = app.installed.update_all(&scope).await?;
    if result.updated_count == 0 {
        println!("No skills were updated.");
    } else {
        println!("Updated {} skill(s).", result.updated_count);
        for name in &result.updated_skills {
            println!("  {name}");
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Gallery
// ═══════════════════════════════════════════════════════════════════════

pub async fn gallery(app: &App) -> Result<()> {
    print_summaries(&app.gallery.fetch_gallery().await?);
    Ok(())
}

/// Search the gallery, or list a repository when the query is `owner/repo`.
pub async fn search(app: &App, query: &str, limit: usize) -> Result<()> {
    if is_repo_query(query) {
        return repo(app, query).await;
    }
    let results = app.gallery.search_skills(query, limit).await?;
    if results.is_empty() {
        println!("No skills match \"{}\".", query.trim());
        return Ok(());
    }
    print_summaries(&results);
    Ok(())
}

pub async fn repo(app: &App, repo: &str) -> Result<()> {
    let Some((owner, name)) = repo.trim().split_once('/').filter(|_| is_repo_query(repo)) else {
        bail!("expected owner/repo, got `{repo}`");
    };
    let skills = app.gallery.fetch_repo_skills(owner, name).await?;
    if skills.is_empty() {
        println!("No skills found in {owner}/{name}.");
        return Ok(());
    }
    print_summaries(&skills);
    Ok(())
}

pub async fn docs(
    app: &App,
    source: &str,
    skill: Option<&str>,
    local: Option<&str>,
) -> Result<()> {
    let text = match local {
        Some(path) => app.cli().read_local_skill_md(path).await?,
        None => app.resolver.fetch_skill_docs(source, skill).await?,
    };
    println!("{text}");
    Ok(())
}

pub async fn resolve(app: &App, source: &str, skill: &str) -> Result<()> {
    println!("{}", app.resolver.resolve_install_source(source, skill).await);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Projects & preferences
// ═══════════════════════════════════════════════════════════════════════

pub async fn projects(app: &App, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::List => {
            let projects = app.projects.list().await;
            if projects.is_empty() {
                println!("No projects registered.");
            }
            for (i, project) in projects.iter().enumerate() {
                println!("{i:>3}  {}  {}  {}", project.id, project.name, project.path);
            }
        }
        ProjectAction::Add { path } => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("invalid project path {}", path.display()))?;
            let project = app.projects.add(&path.to_string_lossy()).await?;
            println!("Added project {} ({})", project.name, project.id);
        }
        ProjectAction::Remove { id } => {
            if app.projects.find(&id).await.is_none() {
                bail!("no project with id {id}");
            }
            app.projects.remove(&id).await?;
            println!("Removed project {id}");
        }
        ProjectAction::Move { id, to } => {
            let projects = app.projects.move_to(&id, to).await?;
            for (i, project) in projects.iter().enumerate() {
                println!("{i:>3}  {}", project.name);
            }
        }
    }
    Ok(())
}

pub async fn prefs(app: &App, action: PrefsAction) -> Result<()> {
    match action {
        PrefsAction::Show => {}
        PrefsAction::Set {
            package_manager,
            default_agents,
            auto_check_updates,
        } => {
            let mut prefs = app.preferences.load().await;
            if let Some(pm) = package_manager {
                prefs.package_manager = pm.parse::<PackageManager>()?;
            }
            if let Some(agents) = default_agents {
                prefs.default_agents = agents;
            }
            if let Some(enabled) = auto_check_updates {
                prefs.auto_check_updates = enabled;
            }
            app.preferences.save(&prefs).await?;
            info!("preferences updated");
        }
    }

    let prefs = app.preferences.load().await;
    println!("package manager     {}", prefs.package_manager);
    println!("default agents      {}", join_or_dash(&prefs.default_agents));
    println!("auto-check updates  {}", prefs.auto_check_updates);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Self-update
// ═══════════════════════════════════════════════════════════════════════

/// `self-update [--check] [--restart]`.
pub async fn self_update(app: &App, check_only: bool, restart: bool) -> Result<()> {
    let updater = &app.updater;
    let mut states = updater.subscribe();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            if matches!(state, AppUpdateState::Checking | AppUpdateState::Downloading) {
                println!("{}...", capitalize(&state.to_string()));
            }
        }
    });

    let found = updater.check_for_update(false).await;
    if found && !check_only {
        updater.download_update().await;
    }
    progress.abort();

    report_update_state(&updater.state());
    match updater.state() {
        AppUpdateState::Error { message } => bail!(message),
        AppUpdateState::Ready if restart => updater.restart_to_update(),
        AppUpdateState::Ready => {
            println!("Run `skillpad self-update --restart` or start skillpad again.");
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn report_update_state(state: &AppUpdateState) {
    match state {
        AppUpdateState::Idle => println!("SkillPad is up to date."),
        AppUpdateState::Available { version } => println!("Update available: {version}"),
        AppUpdateState::Ready => println!("Update installed."),
        other => println!("Update {other}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Formatting
// ═══════════════════════════════════════════════════════════════════════

fn format_installed(skill: &InstalledSkill) -> String {
    format!(
        "  {:<28} {}  [{}]",
        skill.name,
        skill.path,
        join_or_dash(&skill.agents)
    )
}

fn print_summaries(skills: &[SkillSummary]) {
    for skill in skills {
        println!(
            "{:<32} {:<40} {:>8}",
            skill.name,
            skill.top_source,
            format_installs(skill.installs)
        );
    }
}

/// Compact install count: `999`, `1.2K`, `3.4M`.
pub fn format_installs(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

pub fn describe_status(status: &SkillUpdateStatus) -> String {
    match status {
        SkillUpdateStatus::Idle => "-".to_owned(),
        SkillUpdateStatus::Checking => "checking".to_owned(),
        SkillUpdateStatus::UpdateAvailable { source } => format!("update available ({source})"),
        SkillUpdateStatus::UpToDate => "up to date".to_owned(),
        SkillUpdateStatus::Error { message } => format!("error: {message}"),
        SkillUpdateStatus::Updating => "updating".to_owned(),
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(", ")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
