use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::events::{Event, MatchResult, MatchResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamResult {
    Win,
    Draw,
    Loss,
}

impl TeamResult {
    pub fn for_team(result: &MatchResult, team_id: u64) -> Self {
        match (
            classify_outcome(result.home_score, result.away_score),
            result.home_team_id == team_id,
        ) {
            (Outcome::Draw, _) => TeamResult::Draw,
            (Outcome::Home, true) | (Outcome::Away, false) => TeamResult::Win,
            _ => TeamResult::Loss,
        }
    }
}

/// Team win-rate delta between games with and without the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactSummary {
    pub war: f64,
    /// Wins / games with the player; `None` when none of their games has a result.
    pub team_win_rate: Option<f64>,
    pub win_rate_without: Option<f64>,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub games_with: usize,
    pub games_without: usize,
}

impl ImpactSummary {
    /// Unknown win rates are read as a coin flip.
    pub fn win_rate_or_neutral(&self) -> f64 {
        self.team_win_rate.unwrap_or(0.5)
    }
}

fn win_rate(results: &[&MatchResult], team_id: u64) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let wins = results
        .iter()
        .filter(|r| TeamResult::for_team(r, team_id) == TeamResult::Win)
        .count();
    Some(wins as f64 / results.len() as f64)
}

pub fn compute_impact(team_id: u64, events: &[&Event], results: &MatchResults) -> ImpactSummary {
    let player_games: BTreeSet<u64> = events.iter().map(|e| e.game_id).collect();
    let (with, without): (Vec<&MatchResult>, Vec<&MatchResult>) = results
        .team_games(team_id)
        .partition(|r| player_games.contains(&r.game_id));

    let mut summary = ImpactSummary {
        games_with: with.len(),
        games_without: without.len(),
        ..ImpactSummary::default()
    };
    for r in &with {
        match TeamResult::for_team(r, team_id) {
            TeamResult::Win => summary.wins += 1,
            TeamResult::Draw => summary.draws += 1,
            TeamResult::Loss => summary.losses += 1,
        }
    }
    summary.team_win_rate = win_rate(&with, team_id);
    summary.win_rate_without = win_rate(&without, team_id);
    summary.war = match (summary.team_win_rate, summary.win_rate_without) {
        (Some(with_rate), Some(without_rate)) => with_rate - without_rate,
        _ => 0.0,
    };
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::tests::event;
    use assert_float_eq::*;

    fn result(game_id: u64, home: u64, away: u64, home_goals: i32, away_goals: i32) -> MatchResult {
        MatchResult {
            game_id,
            home_team_id: home,
            away_team_id: away,
            home_score: home_goals,
            away_score: away_goals,
        }
    }

    fn played(games: &[u64]) -> Vec<Event> {
        games
            .iter()
            .map(|g| {
                let mut e = event("Pass", (50.0, 50.0), (50.0, 60.0));
                e.game_id = *g;
                e
            })
            .collect()
    }

    #[test]
    fn war_is_rate_delta() {
        let results = MatchResults::new([
            result(1, 1, 2, 2, 0),
            result(2, 3, 1, 0, 1),
            result(3, 1, 4, 1, 1),
            result(4, 1, 5, 0, 2),
            result(5, 6, 1, 1, 0),
            result(6, 1, 7, 3, 0),
        ]);
        let events = played(&[1, 2, 3]);
        let refs: Vec<&Event> = events.iter().collect();
        let s = compute_impact(1, &refs, &results);
        assert_eq!((s.games_with, s.games_without), (3, 3));
        assert_eq!((s.wins, s.draws, s.losses), (2, 1, 0));
        assert_float_absolute_eq!(s.team_win_rate.unwrap(), 2.0 / 3.0, 1e-12);
        assert_float_absolute_eq!(s.war, 2.0 / 3.0 - 1.0 / 3.0, 1e-12);
    }

    #[test]
    fn no_games_without_means_zero_war() {
        let results = MatchResults::new([result(1, 1, 2, 2, 0), result(2, 1, 3, 0, 0)]);
        let events = played(&[1, 2]);
        let refs: Vec<&Event> = events.iter().collect();
        let s = compute_impact(1, &refs, &results);
        assert_eq!(s.war, 0.0);
        assert_eq!(s.games_without, 0);
        assert_float_absolute_eq!(s.win_rate_or_neutral(), 0.5, 1e-12);
    }

    #[test]
    fn empty_results_leave_rate_unknown() {
        let events = played(&[1]);
        let refs: Vec<&Event> = events.iter().collect();
        let s = compute_impact(1, &refs, &MatchResults::default());
        assert_eq!(s.team_win_rate, None);
        assert_eq!(s.war, 0.0);
        assert_eq!(s.win_rate_or_neutral(), 0.5);
    }
}
