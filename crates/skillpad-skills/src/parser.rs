//! Parsers for `skills` CLI output.
//!
//! All inputs are expected to be ANSI-stripped already.  The parsers are
//! lenient: anything they do not recognise is skipped, never an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{CliCheckReport, CliUpdate, InstalledSkill, UpdateAllResult};

/// Section headers printed by `skills list`.
const LIST_HEADERS: [&str; 2] = ["Global Skills", "Project Skills"];

/// Line prefixes package runners print on stderr even when nothing went wrong.
const RUNNER_NOISE: &[&str] = &[
    "Resolving dependencies",
    "Resolved, downloaded and extracted",
    "Saved lockfile",
    "Progress: resolved",
    "Packages: +",
    "npm warn",
    "npm WARN",
];

static CHECK_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Checking (\d+) skill\(s\) for updates").expect("pattern compiles"));
static CHECK_UNCHECKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Could not check (\d+) skill").expect("pattern compiles"));
static UPDATE_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[✓✔]\s*)?Updated\s+(\d+)\s+skill").expect("pattern compiles")
});
static UPDATE_ONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[✓✔]\s*)?Updated\s+(\S+)").expect("pattern compiles"));

/// Parse `skills list` output into installed skills.
///
/// A line `<name> <path>` (path starting with `/` or `~`) opens a record; an
/// `Agents:` line closes it.  A record still open when the next one starts,
/// or at end of input, is kept with the agents it has.
pub fn parse_skill_list(output: &str) -> Vec<InstalledSkill> {
    let mut skills = Vec::new();
    let mut pending: Option<InstalledSkill> = None;

    for line in output.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || LIST_HEADERS.contains(&trimmed) {
            continue;
        }

        if let Some(agents) = trimmed.strip_prefix("Agents:") {
            if let Some(mut skill) = pending.take() {
                skill.agents = parse_agents(agents);
                skills.push(skill);
                continue;
            }
        }

        let Some((name, rest)) = trimmed.split_once(char::is_whitespace) else {
            continue;
        };
        let path = rest.trim_start();
        let informational =
            name == "No" || name == "Try" || !(path.starts_with('/') || path.starts_with('~'));
        if informational {
            continue;
        }

        if let Some(prev) = pending.take() {
            skills.push(prev);
        }
        pending = Some(InstalledSkill {
            name: name.to_owned(),
            path: path.to_owned(),
            agents: Vec::new(),
        });
    }

    skills.extend(pending);
    skills
}

fn parse_agents(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "not linked" {
        return Vec::new();
    }
    raw.split(',').map(|a| a.trim().to_owned()).collect()
}

/// Parse `skills check` output.
pub fn parse_check_output(output: &str) -> CliCheckReport {
    let mut report = CliCheckReport::default();

    if let Some(n) = capture_count(&CHECK_TOTAL, output) {
        report.total_checked = n;
    }
    if let Some(n) = capture_count(&CHECK_UNCHECKED, output) {
        report.could_not_check = n;
    }

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix('↑') {
            report.updates_available.push(CliUpdate {
                name: name.trim().to_owned(),
                source: String::new(),
            });
        } else if let Some(source) = trimmed.strip_prefix("source:") {
            if let Some(last) = report.updates_available.last_mut() {
                if last.source.is_empty() {
                    last.source = source.trim().to_owned();
                }
            }
        }
    }

    report
}

/// Parse `skills update` output.
///
/// Per-skill `Updated <name>` lines are collected; a `Updated N skill(s)`
/// line, when present, is the authoritative count.
pub fn parse_update_output(output: &str) -> UpdateAllResult {
    let mut total = None;
    let mut updated = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(caps) = UPDATE_TOTAL.captures(trimmed) {
            total = caps[1].parse().ok();
        } else if let Some(caps) = UPDATE_ONE.captures(trimmed) {
            updated.push(caps[1].trim_end_matches([':', '.']).to_owned());
        }
    }

    UpdateAllResult {
        updated_count: total.unwrap_or(updated.len()),
        updated_skills: updated,
    }
}

/// Drop package-runner progress chatter, keeping everything else verbatim.
pub fn strip_runner_noise(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let line = line.trim_start();
            !RUNNER_NOISE.iter().any(|noise| line.starts_with(noise))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn capture_count(pattern: &Regex, text: &str) -> Option<usize> {
    pattern.captures(text).and_then(|c| c[1].parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, path: &str, agents: &[&str]) -> InstalledSkill {
        InstalledSkill {
            name: name.into(),
            path: path.into(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn list_with_agents() {
        let out = "Global Skills\n\nmy-skill    /Users/test/.skills/my-skill\n  Agents: claude, cursor";
        assert_eq!(
            parse_skill_list(out),
            vec![skill("my-skill", "/Users/test/.skills/my-skill", &["claude", "cursor"])]
        );
    }

    #[test]
    fn empty_project_listing() {
        let out = "Project Skills\n\nNo project skills found.\nTry listing global skills with -g";
        assert!(parse_skill_list(out).is_empty());
    }

    #[test]
    fn not_linked_means_no_agents() {
        let out = "a  ~/.agents/skills/a\n  Agents: not linked\nb  ~/.agents/skills/b\n  Agents:";
        assert_eq!(
            parse_skill_list(out),
            vec![
                skill("a", "~/.agents/skills/a", &[]),
                skill("b", "~/.agents/skills/b", &[]),
            ]
        );
    }

    #[test]
    fn record_without_agents_line_is_kept() {
        let out = "one /p/one\ntwo /p/two\n  Agents: cursor\nthree /p/three";
        assert_eq!(
            parse_skill_list(out),
            vec![
                skill("one", "/p/one", &[]),
                skill("two", "/p/two", &["cursor"]),
                skill("three", "/p/three", &[]),
            ]
        );
    }

    #[test]
    fn non_path_lines_are_noise() {
        let out = "Found 2 skills\nAgents: orphan\nfoo relative/path\nbar /abs/bar\r\n  Agents: claude\r\n";
        assert_eq!(parse_skill_list(out), vec![skill("bar", "/abs/bar", &["claude"])]);
    }

    #[test]
    fn paths_with_spaces_survive() {
        let out = "doc   /Users/me/My Skills/doc\n  Agents: claude";
        assert_eq!(parse_skill_list(out)[0].path, "/Users/me/My Skills/doc");
    }

    #[test]
    fn check_output_with_updates() {
        let out = "Checking 23 skill(s) for updates...\n\n11 update(s) available:\n\n  ↑ analytics-tracking\n    source: coreyhaines31/marketingskills\n  ↑ competitor-alternatives\n    source: coreyhaines31/marketingskills\n\nRun npx skills update to update all skills";
        let report = parse_check_output(out);
        assert_eq!(report.total_checked, 23);
        assert_eq!(report.could_not_check, 0);
        assert_eq!(
            report.updates_available,
            vec![
                CliUpdate {
                    name: "analytics-tracking".into(),
                    source: "coreyhaines31/marketingskills".into()
                },
                CliUpdate {
                    name: "competitor-alternatives".into(),
                    source: "coreyhaines31/marketingskills".into()
                },
            ]
        );
    }

    #[test]
    fn check_output_all_up_to_date() {
        let report = parse_check_output("Checking 5 skill(s) for updates...\n\nAll 5 skill(s) are up to date");
        assert_eq!(
            report,
            CliCheckReport {
                total_checked: 5,
                ..CliCheckReport::default()
            }
        );
    }

    #[test]
    fn check_output_with_unchecked_skills() {
        let out = "Checking 20 skill(s) for updates...\n\n1 update(s) available:\n\n  ↑ my-skill\n    source: user/repo\n\nCould not check 5 skill(s) (may need reinstall)";
        let report = parse_check_output(out);
        assert_eq!(report.total_checked, 20);
        assert_eq!(report.could_not_check, 5);
        assert_eq!(report.updates_available.len(), 1);
        assert_eq!(report.updates_available[0].source, "user/repo");
    }

    #[test]
    fn check_output_empty() {
        assert_eq!(parse_check_output(""), CliCheckReport::default());
    }

    #[test]
    fn update_output_with_total_line() {
        let out = "✓ Updated frontend-design\n✓ Updated react-hooks\n\nUpdated 2 skill(s)";
        let result = parse_update_output(out);
        assert_eq!(result.updated_count, 2);
        assert_eq!(result.updated_skills, vec!["frontend-design", "react-hooks"]);
    }

    #[test]
    fn update_output_without_total_counts_lines() {
        let out = "Updating...\nUpdated alpha\nUpdated beta\nUpdated gamma";
        let result = parse_update_output(out);
        assert_eq!(result.updated_count, 3);
        assert_eq!(result.updated_skills.len(), 3);
    }

    #[test]
    fn update_output_nothing_to_do() {
        let result = parse_update_output("All skills are up to date");
        assert_eq!(result, UpdateAllResult::default());
    }

    #[test]
    fn runner_noise_is_removed() {
        let stderr = "Resolving dependencies\nResolved, downloaded and extracted [2]\nSaved lockfile\nActual error message";
        assert_eq!(strip_runner_noise(stderr), "Actual error message");
        assert_eq!(
            strip_runner_noise("Resolving dependencies\nSaved lockfile").trim(),
            ""
        );
    }
}
