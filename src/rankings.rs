use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::{AnalysisConfig, RankingConfig};
use crate::profile::{PlayerSample, Profile};
use crate::scoring::{Evidence, FitScore, best_role, fit_score};
use crate::templates::{RoleEntry, RoleTemplates};

#[derive(Debug, Clone, Serialize)]
pub struct RankedPlayer {
    pub rank: usize,
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,
    pub team_name: String,
    pub games: usize,
    pub events: usize,
    pub war: f64,
    pub team_win_rate: Option<f64>,
    pub fit: FitScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleRanking {
    pub position: String,
    pub role: String,
    pub description: String,
    pub players: Vec<RankedPlayer>,
}

impl RoleRanking {
    pub fn top(&self, n: usize) -> &[RankedPlayer] {
        &self.players[..n.min(self.players.len())]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerAssignment {
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,
    pub team_name: String,
    pub position: String,
    pub games: usize,
    pub events: usize,
    pub best_role: String,
    pub fit: FitScore,
    pub role_rank: Option<usize>,
    pub role_size: usize,
}

impl PlayerAssignment {
    pub fn role_key(&self) -> String {
        role_key(&self.position, &self.best_role)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Rankings {
    /// Keyed by `POSITION_Role Name`.
    pub roles: BTreeMap<String, RoleRanking>,
    pub assignments: Vec<PlayerAssignment>,
}

pub fn role_key(position: &str, role: &str) -> String {
    format!("{position}_{role}")
}

pub fn is_eligible(sample: &PlayerSample, cfg: &RankingConfig) -> bool {
    sample.games() >= cfg.min_games as usize && sample.events() >= cfg.min_events
}

fn rank_one(
    position: &str,
    role: &str,
    description: &str,
    template: &Profile,
    players: &[&PlayerSample],
    cfg: &AnalysisConfig,
) -> RoleRanking {
    let mut scored: Vec<(&PlayerSample, FitScore)> = players
        .iter()
        .map(|s| {
            let fit = fit_score(&s.profile, template, &Evidence::from(*s), &cfg.scoring);
            (*s, fit)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.final_score
            .total_cmp(&a.1.final_score)
            .then_with(|| a.0.player_id().cmp(&b.0.player_id()))
    });
    RoleRanking {
        position: position.to_string(),
        role: role.to_string(),
        description: description.to_string(),
        players: scored
            .into_iter()
            .enumerate()
            .map(|(idx, (s, fit))| RankedPlayer {
                rank: idx + 1,
                player_id: s.player_id(),
                player_name: s.info.name.clone(),
                team_id: s.info.team_id,
                team_name: s.info.team_name.clone(),
                games: s.games(),
                events: s.events(),
                war: s.impact.war,
                team_win_rate: s.impact.team_win_rate,
                fit,
            })
            .collect(),
    }
}

/// Scores every eligible player against every template of their position.
pub fn rank_players(
    samples: &[PlayerSample],
    templates: &RoleTemplates,
    cfg: &AnalysisConfig,
) -> Rankings {
    let mut by_position: BTreeMap<&str, Vec<&PlayerSample>> = BTreeMap::new();
    for sample in samples.iter().filter(|s| is_eligible(s, &cfg.ranking)) {
        if let Some(pos) = sample.position() {
            by_position.entry(pos).or_default().push(sample);
        }
    }

    let jobs: Vec<(&str, &str, &RoleEntry)> = templates
        .roles()
        .filter(|(pos, _, _)| by_position.contains_key(pos))
        .collect();
    let roles: BTreeMap<String, RoleRanking> = jobs
        .par_iter()
        .map(|(pos, role, entry)| {
            let ranking = rank_one(
                pos,
                role,
                &entry.description,
                &entry.template,
                &by_position[pos],
                cfg,
            );
            (role_key(pos, role), ranking)
        })
        .collect();

    let mut assignments: Vec<PlayerAssignment> = by_position
        .par_iter()
        .flat_map_iter(|(pos, players)| {
            let roles_for_pos = templates.for_position(pos);
            players.iter().filter_map(move |s| {
                let (role, fit) =
                    best_role(&s.profile, roles_for_pos?, &Evidence::from(*s), &cfg.scoring)?;
                Some(PlayerAssignment {
                    player_id: s.player_id(),
                    player_name: s.info.name.clone(),
                    team_id: s.info.team_id,
                    team_name: s.info.team_name.clone(),
                    position: pos.to_string(),
                    games: s.games(),
                    events: s.events(),
                    best_role: role.to_string(),
                    fit,
                    role_rank: None,
                    role_size: 0,
                })
            })
        })
        .collect();
    assignments.sort_by_key(|a| a.player_id);
    for a in &mut assignments {
        if let Some(ranking) = roles.get(&a.role_key()) {
            a.role_rank = ranking
                .players
                .iter()
                .find(|p| p.player_id == a.player_id)
                .map(|p| p.rank);
            a.role_size = ranking.players.len();
        }
    }

    info!(
        roles = roles.len(),
        players = assignments.len(),
        "ranked players"
    );
    Rankings { roles, assignments }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamPlayer {
    pub player_id: u64,
    pub player_name: String,
    pub position: String,
    pub best_role: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRoster {
    pub team_id: u64,
    pub team_name: String,
    pub players: Vec<TeamPlayer>,
}

/// Assigned players grouped by primary team; players sorted by score, best first.
pub fn team_rosters(rankings: &Rankings) -> Vec<TeamRoster> {
    let mut teams: BTreeMap<u64, TeamRoster> = BTreeMap::new();
    for a in &rankings.assignments {
        teams
            .entry(a.team_id)
            .or_insert_with(|| TeamRoster {
                team_id: a.team_id,
                team_name: a.team_name.clone(),
                players: Vec::new(),
            })
            .players
            .push(TeamPlayer {
                player_id: a.player_id,
                player_name: a.player_name.clone(),
                position: a.position.clone(),
                best_role: a.best_role.clone(),
                score: a.fit.final_score,
            });
    }
    let mut out: Vec<TeamRoster> = teams.into_values().collect();
    for team in &mut out {
        team.players.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
    }
    out
}
