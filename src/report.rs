use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cluster::PositionClusters;
use crate::combinations::TeamCombinations;
use crate::rankings::Rankings;
use crate::team::{BestEleven, TeamImprovement};
use crate::templates::RoleTemplates;

const MARKDOWN_TOP_N: usize = 10;
const MARKDOWN_SEPARATION_N: usize = 5;
const MARKDOWN_LINKS_N: usize = 20;
const MARKDOWN_PAIRS_N: usize = 5;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub generated_at: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamReport<'a> {
    pub teams: &'a [TeamImprovement],
    pub best_11: &'a [BestEleven],
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serialize report")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

pub fn roles_markdown(templates: &RoleTemplates, clusters: &[PositionClusters]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Role definitions\n");
    for (position, roles) in templates.positions() {
        let _ = writeln!(out, "## {position}\n");
        let _ = writeln!(out, "| Role | Players | Match | Description |");
        let _ = writeln!(out, "|---|---:|---:|---|");
        for (name, entry) in roles {
            let players = entry
                .player_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "prior".to_string());
            let ratio = entry
                .match_ratio
                .map(|r| format!("{:.0}%", r * 100.0))
                .unwrap_or_default();
            let _ = writeln!(out, "| {name} | {players} | {ratio} | {} |", entry.description);
        }

        if let Some(pc) = clusters.iter().find(|c| c.position == position)
            && !pc.separation.is_empty()
        {
            let mut by_effect: Vec<_> = pc.separation.iter().collect();
            by_effect.sort_by(|a, b| b.eta_squared.total_cmp(&a.eta_squared));
            let _ = writeln!(out, "\nMost separating metrics (eta²):\n");
            for s in by_effect.into_iter().take(MARKDOWN_SEPARATION_N) {
                let f = s
                    .f_statistic
                    .map(|f| format!("{f:.1}"))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(out, "- {}: {:.2} (F = {f})", s.metric, s.eta_squared);
            }
        }
        out.push('\n');
    }
    out
}

pub fn rankings_markdown(rankings: &Rankings, best: &[BestEleven]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Role rankings\n");
    let _ = writeln!(
        out,
        "{} roles, {} ranked players.\n",
        rankings.roles.len(),
        rankings.assignments.len()
    );
    for (key, ranking) in &rankings.roles {
        let _ = writeln!(out, "## {key}\n");
        if !ranking.description.is_empty() {
            let _ = writeln!(out, "{}\n", ranking.description);
        }
        let _ = writeln!(out, "| # | Player | Team | Games | Score | Raw | Confidence |");
        let _ = writeln!(out, "|---:|---|---|---:|---:|---:|---:|");
        for p in ranking.top(MARKDOWN_TOP_N) {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {:.1} | {:.1} | {:.2} |",
                p.rank,
                p.player_name,
                p.team_name,
                p.games,
                p.fit.final_score,
                p.fit.raw_score,
                p.fit.confidence
            );
        }
        out.push('\n');
    }

    if !best.is_empty() {
        let _ = writeln!(out, "# Best XI\n");
        for xi in best {
            let _ = writeln!(out, "## {}\n", xi.formation);
            for p in &xi.players {
                let _ = writeln!(
                    out,
                    "- {}: {} ({}, {}) {:.1}",
                    p.slot, p.player_name, p.team_name, p.role, p.fit_score
                );
            }
            out.push('\n');
        }
    }
    out
}

pub fn combinations_markdown(teams: &[TeamCombinations]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Player combinations\n");
    for team in teams {
        let _ = writeln!(out, "## {}\n", team.team_name);

        if let Some(network) = &team.pass_network {
            let _ = writeln!(out, "### Pass network ({} passes)\n", network.total_passes);
            let _ = writeln!(out, "| Passer | Receiver | Passes | Success | Avg length |");
            let _ = writeln!(out, "|---|---|---:|---:|---:|");
            for link in network.links.iter().take(MARKDOWN_LINKS_N) {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {:.1}% | {:.1} |",
                    link.passer_name,
                    link.receiver_name,
                    link.count,
                    link.success_rate * 100.0,
                    link.average_length
                );
            }
            let _ = writeln!(out, "\nHubs:\n");
            for hub in network.hubs.iter().take(MARKDOWN_TOP_N) {
                let _ = writeln!(
                    out,
                    "- {}: {} out, {} in",
                    hub.player_name, hub.passes_out, hub.passes_in
                );
            }
            out.push('\n');
        }

        if !team.role_pairs.is_empty() {
            let _ = writeln!(out, "### Role pairs\n");
            for pair in team.role_pairs.iter().take(MARKDOWN_PAIRS_N) {
                let r = &pair.record;
                let _ = writeln!(
                    out,
                    "- {} + {}: {} games, {}W {}D {}L, win rate {:.1}%, goal difference {:+.2}",
                    pair.first,
                    pair.second,
                    r.games,
                    r.wins,
                    r.draws,
                    r.losses,
                    pair.win_rate * 100.0,
                    pair.goal_difference
                );
            }
            out.push('\n');
        }

        if !team.synergies.is_empty() {
            let _ = writeln!(out, "### Synergy\n");
            let _ = writeln!(out, "| Pair | Together | Apart | Win rate change | Goals change |");
            let _ = writeln!(out, "|---|---:|---:|---:|---:|");
            for s in team.synergies.iter().take(MARKDOWN_TOP_N) {
                let _ = writeln!(
                    out,
                    "| {} + {} | {} | {} | {:+.1}% | {:+.2} |",
                    s.player_a_name,
                    s.player_b_name,
                    s.together.games,
                    s.apart.games,
                    s.win_rate_improvement * 100.0,
                    s.goals_improvement
                );
            }
            out.push('\n');
        }

        if let Some(coverage) = &team.coverage {
            let _ = writeln!(
                out,
                "### Coverage\n\n{} players, {}/9 zones, variance x {:.1} y {:.1}\n",
                coverage.players.len(),
                coverage.cells_covered,
                coverage.x_variance,
                coverage.y_variance
            );
        }
    }
    out
}
