use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AnalysisConfig, CombinationConfig, ProfileConfig};
use crate::events::{Event, EventTable, MatchResult, MatchResults, PASS, PASS_RECEIVED};
use crate::impact::TeamResult;
use crate::rankings::PlayerAssignment;

/// One team's player events per game, in action order.
pub type GameSequences<'a> = BTreeMap<u64, Vec<&'a Event>>;

pub fn team_sequences(table: &EventTable, team_id: u64) -> GameSequences<'_> {
    let mut games: BTreeMap<u64, Vec<(usize, &Event)>> = BTreeMap::new();
    for (row, event) in table.events().iter().enumerate() {
        if event.team_id == team_id && event.player_id.is_some() {
            games.entry(event.game_id).or_default().push((row, event));
        }
    }
    games
        .into_iter()
        .map(|(game_id, mut events)| {
            events.sort_by_key(|(row, e)| (e.action_id, *row));
            (game_id, events.into_iter().map(|(_, e)| e).collect())
        })
        .collect()
}

/// First `Pass Received` inside the window, else the player of a directly following pass.
fn receiver_of(following: &[&Event], window: usize) -> Option<u64> {
    if let Some(received) = following.iter().take(window).find(|e| e.is(PASS_RECEIVED)) {
        return received.player_id;
    }
    following
        .first()
        .filter(|e| e.is(PASS))
        .and_then(|e| e.player_id)
}

fn player_name(names: &BTreeMap<u64, String>, player_id: u64) -> String {
    names
        .get(&player_id)
        .cloned()
        .unwrap_or_else(|| format!("Player {player_id}"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GameRecord {
    pub games: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_for: i64,
    pub goals_against: i64,
}

impl GameRecord {
    fn add(&mut self, result: &MatchResult, team_id: u64) {
        let (scored, conceded) = if result.home_team_id == team_id {
            (result.home_score, result.away_score)
        } else {
            (result.away_score, result.home_score)
        };
        self.games += 1;
        match TeamResult::for_team(result, team_id) {
            TeamResult::Win => self.wins += 1,
            TeamResult::Draw => self.draws += 1,
            TeamResult::Loss => self.losses += 1,
        }
        self.goals_for += i64::from(scored);
        self.goals_against += i64::from(conceded);
    }

    /// Games without a recorded result are left out.
    fn over<'a>(
        games: impl IntoIterator<Item = &'a u64>,
        results: &MatchResults,
        team_id: u64,
    ) -> Self {
        let mut record = Self::default();
        for result in games.into_iter().filter_map(|g| results.get(*g)) {
            record.add(result, team_id);
        }
        record
    }

    fn per_game(&self, total: f64) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            total / self.games as f64
        }
    }

    pub fn win_rate(&self) -> f64 {
        self.per_game(self.wins as f64)
    }

    pub fn avg_goals_for(&self) -> f64 {
        self.per_game(self.goals_for as f64)
    }

    pub fn avg_goals_against(&self) -> f64 {
        self.per_game(self.goals_against as f64)
    }

    pub fn goal_difference(&self) -> f64 {
        self.avg_goals_for() - self.avg_goals_against()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassLink {
    pub passer_id: u64,
    pub passer_name: String,
    pub receiver_id: u64,
    pub receiver_name: String,
    pub count: usize,
    pub successful: usize,
    pub success_rate: f64,
    pub average_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassHub {
    pub player_id: u64,
    pub player_name: String,
    pub passes_out: usize,
    pub passes_in: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassNetwork {
    pub total_passes: usize,
    /// Links with at least `min_link_passes`, busiest first.
    pub links: Vec<PassLink>,
    pub hubs: Vec<PassHub>,
}

#[derive(Default)]
struct LinkTally {
    count: usize,
    successful: usize,
    length: f64,
}

pub fn pass_network(
    games: &GameSequences<'_>,
    names: &BTreeMap<u64, String>,
    cfg: &CombinationConfig,
    profile: &ProfileConfig,
) -> Option<PassNetwork> {
    let mut total_passes = 0;
    let mut tallies: BTreeMap<(u64, u64), LinkTally> = BTreeMap::new();
    for sequence in games.values() {
        for (at, event) in sequence.iter().enumerate() {
            if !event.is(PASS) {
                continue;
            }
            total_passes += 1;
            let Some(passer) = event.player_id else {
                continue;
            };
            let Some(receiver) = receiver_of(&sequence[at + 1..], cfg.receive_window) else {
                continue;
            };
            if receiver == passer {
                continue;
            }
            let tally = tallies.entry((passer, receiver)).or_default();
            tally.count += 1;
            tally.length += event.length();
            if event.is_successful(&profile.success_result) {
                tally.successful += 1;
            }
        }
    }
    if total_passes == 0 {
        return None;
    }

    let mut links: Vec<PassLink> = tallies
        .into_iter()
        .filter(|(_, t)| t.count >= cfg.min_link_passes)
        .map(|((passer_id, receiver_id), t)| PassLink {
            passer_id,
            passer_name: player_name(names, passer_id),
            receiver_id,
            receiver_name: player_name(names, receiver_id),
            count: t.count,
            successful: t.successful,
            success_rate: t.successful as f64 / t.count as f64,
            average_length: t.length / t.count as f64,
        })
        .collect();
    links.sort_by(|a, b| b.count.cmp(&a.count));

    let mut flow: BTreeMap<u64, (usize, usize)> = BTreeMap::new();
    for link in &links {
        flow.entry(link.passer_id).or_default().0 += link.count;
        flow.entry(link.receiver_id).or_default().1 += link.count;
    }
    let mut hubs: Vec<PassHub> = flow
        .into_iter()
        .map(|(player_id, (passes_out, passes_in))| PassHub {
            player_id,
            player_name: player_name(names, player_id),
            passes_out,
            passes_in,
            total: passes_out + passes_in,
        })
        .collect();
    hubs.sort_by(|a, b| b.total.cmp(&a.total));

    Some(PassNetwork {
        total_passes,
        links,
        hubs,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePair {
    pub first: String,
    pub second: String,
    #[serde(flatten)]
    pub record: GameRecord,
    pub win_rate: f64,
    pub goal_difference: f64,
}

/// Results of games in which both roles took the field, keyed by `POSITION_Role` pairs.
pub fn role_pairs(
    team_id: u64,
    games: &GameSequences<'_>,
    results: &MatchResults,
    roles: &BTreeMap<u64, String>,
    cfg: &CombinationConfig,
) -> Vec<RolePair> {
    let mut records: BTreeMap<(&str, &str), GameRecord> = BTreeMap::new();
    for (game_id, sequence) in games {
        let Some(result) = results.get(*game_id) else {
            continue;
        };
        let lineup: BTreeSet<u64> = sequence.iter().filter_map(|e| e.player_id).collect();
        let lineup_roles: Vec<&str> = lineup
            .iter()
            .filter_map(|id| roles.get(id).map(String::as_str))
            .collect();
        let mut pairs: BTreeSet<(&str, &str)> = BTreeSet::new();
        for (i, a) in lineup_roles.iter().enumerate() {
            for b in &lineup_roles[i + 1..] {
                pairs.insert(if a <= b { (*a, *b) } else { (*b, *a) });
            }
        }
        for pair in pairs {
            records.entry(pair).or_default().add(result, team_id);
        }
    }

    let mut out: Vec<RolePair> = records
        .into_iter()
        .filter(|(_, r)| r.games >= cfg.min_pair_games)
        .map(|((first, second), record)| RolePair {
            first: first.to_string(),
            second: second.to_string(),
            win_rate: record.win_rate(),
            goal_difference: record.goal_difference(),
            record,
        })
        .collect();
    out.sort_by(|a, b| {
        b.win_rate
            .total_cmp(&a.win_rate)
            .then(b.goal_difference.total_cmp(&a.goal_difference))
    });
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSynergy {
    pub player_a: u64,
    pub player_a_name: String,
    pub player_b: u64,
    pub player_b_name: String,
    pub together: GameRecord,
    /// Games where exactly one of the two played.
    pub apart: GameRecord,
    pub together_win_rate: f64,
    pub apart_win_rate: f64,
    pub win_rate_improvement: f64,
    pub goals_improvement: f64,
}

pub fn player_synergies(
    team_id: u64,
    games: &GameSequences<'_>,
    results: &MatchResults,
    names: &BTreeMap<u64, String>,
    cfg: &CombinationConfig,
) -> Vec<PlayerSynergy> {
    let mut played: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
    for (game_id, sequence) in games {
        for player_id in sequence.iter().filter_map(|e| e.player_id) {
            played.entry(player_id).or_default().insert(*game_id);
        }
    }

    let players: Vec<(u64, &BTreeSet<u64>)> = played.iter().map(|(id, g)| (*id, g)).collect();
    let mut out = Vec::new();
    for (i, &(a, a_games)) in players.iter().enumerate() {
        for &(b, b_games) in &players[i + 1..] {
            let together: BTreeSet<u64> = a_games.intersection(b_games).copied().collect();
            if together.len() < cfg.min_games_together {
                continue;
            }
            let apart: BTreeSet<u64> = a_games.symmetric_difference(b_games).copied().collect();
            let together = GameRecord::over(&together, results, team_id);
            let apart = GameRecord::over(&apart, results, team_id);
            if together.games == 0 || apart.games == 0 {
                continue;
            }
            out.push(PlayerSynergy {
                player_a: a,
                player_a_name: player_name(names, a),
                player_b: b,
                player_b_name: player_name(names, b),
                together_win_rate: together.win_rate(),
                apart_win_rate: apart.win_rate(),
                win_rate_improvement: together.win_rate() - apart.win_rate(),
                goals_improvement: together.avg_goals_for() - apart.avg_goals_for(),
                together,
                apart,
            });
        }
    }
    out.sort_by(|a, b| b.win_rate_improvement.total_cmp(&a.win_rate_improvement));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Third {
    Defensive,
    Midfield,
    Forward,
}

impl Third {
    fn of(y: f64, zones: &ProfileConfig) -> Self {
        if y < zones.defensive_third_end {
            Third::Defensive
        } else if y >= zones.forward_third_start {
            Third::Forward
        } else {
            Third::Midfield
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Left,
    Central,
    Right,
}

impl Lane {
    fn of(x: f64, zones: &ProfileConfig) -> Self {
        if x < zones.central_lane_min {
            Lane::Left
        } else if x > zones.central_lane_max {
            Lane::Right
        } else {
            Lane::Central
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TouchCentre {
    pub player_id: u64,
    pub player_name: String,
    pub average_x: f64,
    pub average_y: f64,
    pub touches: usize,
    pub third: Third,
    pub lane: Lane,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialCoverage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<u64>,
    pub players: Vec<TouchCentre>,
    pub x_variance: f64,
    pub y_variance: f64,
    pub total_variance: f64,
    /// Third-by-lane cells (out of nine) holding at least one player's average touch.
    pub cells_covered: usize,
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

pub fn spatial_coverage<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    game_id: Option<u64>,
    names: &BTreeMap<u64, String>,
    cfg: &CombinationConfig,
    zones: &ProfileConfig,
) -> Option<SpatialCoverage> {
    let mut sums: BTreeMap<u64, (f64, f64, usize)> = BTreeMap::new();
    for event in events {
        let Some(player_id) = event.player_id else {
            continue;
        };
        if !cfg.touch_types.iter().any(|t| event.is(t)) {
            continue;
        }
        let slot = sums.entry(player_id).or_default();
        slot.0 += event.start_x;
        slot.1 += event.start_y;
        slot.2 += 1;
    }
    if sums.is_empty() {
        return None;
    }

    let players: Vec<TouchCentre> = sums
        .into_iter()
        .map(|(player_id, (sum_x, sum_y, touches))| {
            let average_x = sum_x / touches as f64;
            let average_y = sum_y / touches as f64;
            TouchCentre {
                player_id,
                player_name: player_name(names, player_id),
                average_x,
                average_y,
                touches,
                third: Third::of(average_y, zones),
                lane: Lane::of(average_x, zones),
            }
        })
        .collect();
    let xs: Vec<f64> = players.iter().map(|p| p.average_x).collect();
    let ys: Vec<f64> = players.iter().map(|p| p.average_y).collect();
    let cells: BTreeSet<(Third, Lane)> = players.iter().map(|p| (p.third, p.lane)).collect();
    let (x_variance, y_variance) = (variance(&xs), variance(&ys));
    Some(SpatialCoverage {
        game_id,
        players,
        x_variance,
        y_variance,
        total_variance: x_variance + y_variance,
        cells_covered: cells.len(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamCombinations {
    pub team_id: u64,
    pub team_name: String,
    pub pass_network: Option<PassNetwork>,
    pub role_pairs: Vec<RolePair>,
    pub synergies: Vec<PlayerSynergy>,
    pub coverage: Option<SpatialCoverage>,
    /// Coverage of each game's lineup.
    pub lineups: Vec<SpatialCoverage>,
}

/// Shared lookups for the per-team combination views.
pub struct League<'a> {
    table: &'a EventTable,
    results: &'a MatchResults,
    names: BTreeMap<u64, String>,
    team_names: BTreeMap<u64, String>,
    roles: BTreeMap<u64, String>,
}

impl<'a> League<'a> {
    pub fn new(
        table: &'a EventTable,
        results: &'a MatchResults,
        assignments: &[PlayerAssignment],
    ) -> Self {
        let names = table
            .player_directory()
            .into_iter()
            .map(|(id, info)| (id, info.name))
            .collect();
        let roles = assignments
            .iter()
            .map(|a| (a.player_id, a.role_key()))
            .collect();
        Self {
            table,
            results,
            names,
            team_names: table.team_names(),
            roles,
        }
    }

    pub fn team_ids(&self) -> Vec<u64> {
        let ids: BTreeSet<u64> = self.table.events().iter().map(|e| e.team_id).collect();
        ids.into_iter().collect()
    }

    pub fn analyze_team(&self, team_id: u64, cfg: &AnalysisConfig) -> TeamCombinations {
        let combo = &cfg.combination;
        let games = team_sequences(self.table, team_id);
        let lineups: Vec<SpatialCoverage> = games
            .iter()
            .filter_map(|(game_id, sequence)| {
                spatial_coverage(
                    sequence.iter().copied(),
                    Some(*game_id),
                    &self.names,
                    combo,
                    &cfg.profile,
                )
            })
            .collect();
        let team = TeamCombinations {
            team_id,
            team_name: self
                .team_names
                .get(&team_id)
                .cloned()
                .unwrap_or_else(|| format!("Team {team_id}")),
            pass_network: pass_network(&games, &self.names, combo, &cfg.profile),
            role_pairs: role_pairs(team_id, &games, self.results, &self.roles, combo),
            synergies: player_synergies(team_id, &games, self.results, &self.names, combo),
            coverage: spatial_coverage(
                games.values().flatten().copied(),
                None,
                &self.names,
                combo,
                &cfg.profile,
            ),
            lineups,
        };
        debug!(
            team_id,
            links = team.pass_network.as_ref().map_or(0, |n| n.links.len()),
            role_pairs = team.role_pairs.len(),
            synergies = team.synergies.len(),
            "analyzed combinations"
        );
        team
    }
}

/// Every team in the event log, or only `team` when given.
pub fn analyze_combinations(
    table: &EventTable,
    results: &MatchResults,
    assignments: &[PlayerAssignment],
    team: Option<u64>,
    cfg: &AnalysisConfig,
) -> Vec<TeamCombinations> {
    let league = League::new(table, results, assignments);
    let team_ids: Vec<u64> = league
        .team_ids()
        .into_iter()
        .filter(|id| team.is_none_or(|t| t == *id))
        .collect();
    let teams: Vec<TeamCombinations> = team_ids
        .into_par_iter()
        .map(|team_id| league.analyze_team(team_id, cfg))
        .collect();
    info!(teams = teams.len(), "combination analysis complete");
    teams
}
