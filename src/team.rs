use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::RankingConfig;
use crate::rankings::PlayerAssignment;

const POSITION_CANDIDATES: usize = 10;
const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct PositionCoverage {
    pub count: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleCoverage {
    pub count: usize,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityGap {
    pub position: String,
    pub average_score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamWeaknesses {
    pub position_coverage: BTreeMap<String, PositionCoverage>,
    pub role_coverage: BTreeMap<String, RoleCoverage>,
    pub quality_gaps: Vec<QualityGap>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub player_id: u64,
    pub player_name: String,
    pub team_name: String,
    pub position: String,
    pub role: String,
    pub fit_score: f64,
    pub games: usize,
    pub improvement_potential: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "gap_type", rename_all = "snake_case")]
pub enum Recommendation {
    /// The team's average at this position is low.
    Position {
        position: String,
        current_average: f64,
        players: Vec<Candidate>,
    },
    /// Nobody in the team plays this role.
    MissingRole { role: String, players: Vec<Candidate> },
    /// The team's best player in this role scores low.
    WeakRole {
        role: String,
        current_max_score: f64,
        players: Vec<Candidate>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamImprovement {
    pub team_id: u64,
    pub team_name: String,
    pub weaknesses: TeamWeaknesses,
    pub recommendations: Vec<Recommendation>,
}

pub fn analyze_weaknesses(players: &[&PlayerAssignment], cfg: &RankingConfig) -> TeamWeaknesses {
    let mut by_position: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    let mut role_coverage: BTreeMap<String, RoleCoverage> = BTreeMap::new();
    for p in players {
        let slot = by_position.entry(p.position.clone()).or_insert((0, 0.0));
        slot.0 += 1;
        slot.1 += p.fit.final_score;

        let role = role_coverage.entry(p.best_role.clone()).or_insert(RoleCoverage {
            count: 0,
            max_score: 0.0,
        });
        role.count += 1;
        role.max_score = role.max_score.max(p.fit.final_score);
    }

    let position_coverage: BTreeMap<String, PositionCoverage> = by_position
        .into_iter()
        .map(|(pos, (count, total))| {
            (
                pos,
                PositionCoverage {
                    count,
                    average_score: total / count as f64,
                },
            )
        })
        .collect();
    let quality_gaps = position_coverage
        .iter()
        .filter(|(_, c)| c.average_score < cfg.position_gap_threshold)
        .map(|(pos, c)| QualityGap {
            position: pos.clone(),
            average_score: c.average_score,
            count: c.count,
        })
        .collect();

    TeamWeaknesses {
        position_coverage,
        role_coverage,
        quality_gaps,
    }
}

fn by_score_desc(a: &&PlayerAssignment, b: &&PlayerAssignment) -> std::cmp::Ordering {
    b.fit
        .final_score
        .total_cmp(&a.fit.final_score)
        .then_with(|| a.player_id.cmp(&b.player_id))
}

fn candidate(p: &PlayerAssignment, baseline: f64) -> Candidate {
    Candidate {
        player_id: p.player_id,
        player_name: p.player_name.clone(),
        team_name: p.team_name.clone(),
        position: p.position.clone(),
        role: p.best_role.clone(),
        fit_score: p.fit.final_score,
        games: p.games,
        improvement_potential: p.fit.final_score - baseline,
    }
}

/// Weaknesses and recommended signings for one team, drawn from every other team.
pub fn analyze_team(
    team_id: u64,
    assignments: &[PlayerAssignment],
    cfg: &RankingConfig,
) -> TeamImprovement {
    let own: Vec<&PlayerAssignment> = assignments.iter().filter(|a| a.team_id == team_id).collect();
    let mut others: Vec<&PlayerAssignment> =
        assignments.iter().filter(|a| a.team_id != team_id).collect();
    others.sort_by(by_score_desc);
    let weaknesses = analyze_weaknesses(&own, cfg);
    let mut recommendations = Vec::new();

    for gap in &weaknesses.quality_gaps {
        let players: Vec<Candidate> = others
            .iter()
            .filter(|p| p.position == gap.position)
            .take(POSITION_CANDIDATES)
            .filter(|p| p.fit.final_score > gap.average_score + cfg.recommend_margin)
            .take(MAX_RECOMMENDATIONS)
            .map(|p| candidate(p, gap.average_score))
            .collect();
        if !players.is_empty() {
            recommendations.push(Recommendation::Position {
                position: gap.position.clone(),
                current_average: gap.average_score,
                players,
            });
        }
    }

    let league_roles: BTreeSet<&str> = others.iter().map(|p| p.best_role.as_str()).collect();
    for role in league_roles {
        if weaknesses.role_coverage.contains_key(role) {
            continue;
        }
        let players: Vec<Candidate> = others
            .iter()
            .filter(|p| p.best_role == role)
            .take(MAX_RECOMMENDATIONS)
            .map(|p| candidate(p, 0.0))
            .collect();
        recommendations.push(Recommendation::MissingRole {
            role: role.to_string(),
            players,
        });
    }

    for (role, coverage) in &weaknesses.role_coverage {
        if coverage.max_score >= cfg.role_gap_threshold {
            continue;
        }
        let players: Vec<Candidate> = others
            .iter()
            .filter(|p| &p.best_role == role)
            .take(MAX_RECOMMENDATIONS)
            .filter(|p| p.fit.final_score > coverage.max_score + cfg.recommend_margin)
            .map(|p| candidate(p, coverage.max_score))
            .collect();
        if !players.is_empty() {
            recommendations.push(Recommendation::WeakRole {
                role: role.clone(),
                current_max_score: coverage.max_score,
                players,
            });
        }
    }

    TeamImprovement {
        team_id,
        team_name: own
            .first()
            .map(|p| p.team_name.clone())
            .unwrap_or_else(|| format!("Team {team_id}")),
        weaknesses,
        recommendations,
    }
}

pub fn analyze_all_teams(
    assignments: &[PlayerAssignment],
    cfg: &RankingConfig,
) -> Vec<TeamImprovement> {
    let teams: BTreeSet<u64> = assignments.iter().map(|a| a.team_id).collect();
    teams
        .into_iter()
        .map(|team_id| analyze_team(team_id, assignments, cfg))
        .collect()
}

pub const FORMATIONS: [(&str, &[(&str, usize)]); 5] = [
    (
        "4-4-2",
        &[
            ("GK", 1),
            ("LB", 1),
            ("CB", 2),
            ("RB", 1),
            ("LM", 1),
            ("CM", 2),
            ("RM", 1),
            ("ST", 2),
        ],
    ),
    (
        "4-3-3",
        &[
            ("GK", 1),
            ("LB", 1),
            ("CB", 2),
            ("RB", 1),
            ("CDM", 1),
            ("CM", 2),
            ("LW", 1),
            ("ST", 1),
            ("RW", 1),
        ],
    ),
    (
        "5-3-2",
        &[
            ("GK", 1),
            ("LWB", 1),
            ("CB", 3),
            ("RWB", 1),
            ("CM", 3),
            ("ST", 2),
        ],
    ),
    (
        "4-3-1-2",
        &[
            ("GK", 1),
            ("LB", 1),
            ("CB", 2),
            ("RB", 1),
            ("CM", 3),
            ("CAM", 1),
            ("ST", 2),
        ],
    ),
    (
        "4-5-1",
        &[
            ("GK", 1),
            ("LB", 1),
            ("CB", 2),
            ("RB", 1),
            ("LM", 1),
            ("CM", 3),
            ("RM", 1),
            ("ST", 1),
        ],
    ),
];

fn mapped_position(slot: &str) -> Option<&'static str> {
    match slot {
        "LM" | "RM" => Some("CM"),
        "LWB" => Some("LB"),
        "RWB" => Some("RB"),
        _ => None,
    }
}

fn fallback_positions(slot: &str) -> &'static [&'static str] {
    match slot {
        "CDM" => &["CM", "CB"],
        "ST" => &["CF", "CAM"],
        "CAM" => &["CM", "CF"],
        "LW" => &["LM", "CM"],
        "RW" => &["RM", "CM"],
        "LM" => &["CM", "LW"],
        "RM" => &["CM", "RW"],
        "LWB" => &["LB", "LM"],
        "RWB" => &["RB", "RM"],
        _ => &[],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedPlayer {
    pub slot: String,
    pub player_id: u64,
    pub player_name: String,
    pub team_name: String,
    pub position: String,
    pub role: String,
    pub fit_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BestEleven {
    pub formation: String,
    pub players: Vec<SelectedPlayer>,
}

/// Fills slots by exact position, then mapped position, then fallbacks; nobody is picked twice.
pub fn best_eleven(
    formation: &str,
    slots: &[(&str, usize)],
    assignments: &[PlayerAssignment],
) -> BestEleven {
    let mut taken: BTreeSet<u64> = BTreeSet::new();
    let mut players = Vec::new();

    for &(slot, count) in slots {
        let available = |pos: &str| -> Vec<&PlayerAssignment> {
            assignments
                .iter()
                .filter(|a| a.position == pos && !taken.contains(&a.player_id))
                .collect()
        };
        let mut pool = available(slot);
        if pool.len() < count {
            if let Some(mapped) = mapped_position(slot) {
                pool.extend(available(mapped));
            }
        }
        if pool.len() < count {
            for pos in fallback_positions(slot) {
                pool.extend(available(*pos));
            }
        }
        pool.sort_by(by_score_desc);
        pool.dedup_by_key(|a| a.player_id);

        let chosen: Vec<&PlayerAssignment> = pool.into_iter().take(count).collect();
        for a in chosen {
            taken.insert(a.player_id);
            players.push(SelectedPlayer {
                slot: slot.to_string(),
                player_id: a.player_id,
                player_name: a.player_name.clone(),
                team_name: a.team_name.clone(),
                position: a.position.clone(),
                role: a.best_role.clone(),
                fit_score: a.fit.final_score,
            });
        }
    }

    BestEleven {
        formation: formation.to_string(),
        players,
    }
}

pub fn best_elevens(assignments: &[PlayerAssignment]) -> Vec<BestEleven> {
    FORMATIONS
        .iter()
        .map(|(name, slots)| best_eleven(name, slots, assignments))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scoring::FitScore;

    pub(crate) fn assignment(
        id: u64,
        team: u64,
        pos: &str,
        role: &str,
        score: f64,
    ) -> PlayerAssignment {
        PlayerAssignment {
            player_id: id,
            player_name: format!("P{id}"),
            team_id: team,
            team_name: format!("Team {team}"),
            position: pos.to_string(),
            games: 10,
            events: 300,
            best_role: role.to_string(),
            fit: FitScore {
                final_score: score,
                raw_score: score,
                direction: 1.0,
                magnitude: 1.0,
                confidence: 1.0,
                adjusted_score: score,
                games_bonus: 0.0,
                war_bonus: 0.0,
                win_rate_bonus: 0.0,
                missing_metrics: Vec::new(),
            },
            role_rank: None,
            role_size: 0,
        }
    }

    #[test]
    fn weak_position_gets_better_players_from_other_teams() {
        let cfg = RankingConfig::default();
        let all = vec![
            assignment(1, 1, "CB", "Libero", 60.0),
            assignment(2, 1, "CB", "Libero", 64.0),
            assignment(3, 2, "CB", "Libero", 80.0),
            assignment(4, 2, "CB", "Libero", 66.0),
            assignment(5, 3, "CB", "Ball Playing Defender", 90.0),
        ];
        let t = analyze_team(1, &all, &cfg);
        assert_eq!(t.weaknesses.quality_gaps.len(), 1);
        let pos = t
            .recommendations
            .iter()
            .find_map(|r| match r {
                Recommendation::Position { players, .. } => Some(players),
                _ => None,
            })
            .unwrap();
        let ids: Vec<u64> = pos.iter().map(|c| c.player_id).collect();
        assert_eq!(ids, vec![5, 3]);

        assert!(t.recommendations.iter().any(|r| matches!(
            r,
            Recommendation::MissingRole { role, .. } if role == "Ball Playing Defender"
        )));
        let weak = t
            .recommendations
            .iter()
            .find_map(|r| match r {
                Recommendation::WeakRole { players, .. } => Some(players),
                _ => None,
            })
            .unwrap();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].player_id, 3);
    }

    #[test]
    fn best_eleven_uses_fallbacks_without_repeats() {
        let all = vec![
            assignment(1, 1, "GK", "Goalkeeper", 70.0),
            assignment(2, 1, "CM", "Central Midfielder", 90.0),
            assignment(3, 2, "CM", "Central Midfielder", 85.0),
            assignment(4, 2, "CM", "Central Midfielder", 80.0),
            assignment(5, 3, "CF", "Poacher", 75.0),
        ];
        let xi = best_eleven("4-4-2", FORMATIONS[0].1, &all);
        let ids: Vec<u64> = xi.players.iter().map(|p| p.player_id).collect();
        let unique: BTreeSet<u64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        let lm = xi.players.iter().find(|p| p.slot == "LM").unwrap();
        assert_eq!(lm.player_id, 2);
        let st: Vec<u64> = xi
            .players
            .iter()
            .filter(|p| p.slot == "ST")
            .map(|p| p.player_id)
            .collect();
        assert_eq!(st, vec![5]);
        assert_eq!(best_elevens(&all).len(), FORMATIONS.len());
    }
}
