use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::profile::{Metric, PlayerSample, Profile};
use crate::templates::RoleEntry;

const NORM_EPSILON: f64 = 1e-10;

/// Sample evidence the score is weighted by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evidence {
    pub games: usize,
    pub events: usize,
    pub war: f64,
    pub team_win_rate: Option<f64>,
}

impl From<&PlayerSample> for Evidence {
    fn from(sample: &PlayerSample) -> Self {
        Self {
            games: sample.games(),
            events: sample.events(),
            war: sample.impact.war,
            team_win_rate: sample.impact.team_win_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitScore {
    pub final_score: f64,
    pub raw_score: f64,
    pub direction: f64,
    pub magnitude: f64,
    pub confidence: f64,
    pub adjusted_score: f64,
    pub games_bonus: f64,
    pub war_bonus: f64,
    pub win_rate_bonus: f64,
    pub missing_metrics: Vec<Metric>,
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine of the independently normalized vectors; 0 when either is all zeros.
pub fn direction_similarity(player: &[f64], template: &[f64]) -> f64 {
    let pn = norm(player) + NORM_EPSILON;
    let tn = norm(template) + NORM_EPSILON;
    player
        .iter()
        .zip(template)
        .map(|(p, t)| (p / pn) * (t / tn))
        .sum()
}

/// 1 − scaled distance / √n, each metric scaled by max(|p|, |t|, 1).
pub fn magnitude_similarity(player: &[f64], template: &[f64]) -> f64 {
    let n = player.len().max(1) as f64;
    let dist = player
        .iter()
        .zip(template)
        .map(|(p, t)| {
            let scale = p.abs().max(t.abs()).max(1.0);
            (p / scale - t / scale).powi(2)
        })
        .sum::<f64>()
        .sqrt();
    (1.0 - dist / n.sqrt()).clamp(0.0, 1.0)
}

pub fn confidence(games: usize, events: usize, cfg: &ScoringConfig) -> f64 {
    if games == 0 || events == 0 {
        return 0.0;
    }
    let g = (games as f64 / cfg.confidence_full_games.max(1) as f64).min(1.0);
    let e = (events as f64 / cfg.confidence_full_events.max(1) as f64).min(1.0);
    (g * e).sqrt()
}

pub fn games_bonus(games: usize) -> f64 {
    match games {
        g if g >= 30 => 3.0,
        g if g >= 25 => 2.0,
        g if g >= 20 => 1.0,
        g if g >= 15 => 0.5,
        _ => 0.0,
    }
}

pub fn war_bonus(war: f64) -> f64 {
    if war >= 0.30 {
        3.0
    } else if war >= 0.20 {
        2.0
    } else if war >= 0.10 {
        1.0
    } else if war >= 0.05 {
        0.5
    } else if war <= -0.30 {
        -3.0
    } else if war <= -0.20 {
        -2.0
    } else if war <= -0.10 {
        -1.0
    } else if war <= -0.05 {
        -0.5
    } else {
        0.0
    }
}

pub fn win_rate_bonus(rate: f64) -> f64 {
    if rate >= 0.6 {
        0.5
    } else if rate >= 0.5 {
        0.25
    } else if rate < 0.3 {
        -0.5
    } else if rate < 0.4 {
        -0.25
    } else {
        0.0
    }
}

/// Blends direction (cosine) and magnitude (scaled Euclidean) similarity,
/// shrinks toward a neutral prior for thin samples, then adds small bonuses
/// for availability and team results.
pub fn fit_score(
    profile: &Profile,
    template: &Profile,
    evidence: &Evidence,
    cfg: &ScoringConfig,
) -> FitScore {
    let (player_vec, player_missing) = profile.to_vector();
    let (template_vec, missing_metrics) = template.to_vector();
    if !missing_metrics.is_empty() {
        debug!(missing = missing_metrics.len(), "template metrics defaulted to 0");
    }
    if !player_missing.is_empty() {
        debug!(missing = player_missing.len(), "profile metrics defaulted to 0");
    }

    let direction = direction_similarity(&player_vec, &template_vec);
    let magnitude = magnitude_similarity(&player_vec, &template_vec);
    let raw_score = 100.0 * (cfg.direction_weight * direction + cfg.magnitude_weight * magnitude);

    if !cfg.sample_size_correction {
        return FitScore {
            final_score: raw_score,
            raw_score,
            direction,
            magnitude,
            confidence: 1.0,
            adjusted_score: raw_score,
            games_bonus: 0.0,
            war_bonus: 0.0,
            win_rate_bonus: 0.0,
            missing_metrics,
        };
    }

    let confidence = confidence(evidence.games, evidence.events, cfg);
    let adjusted_score = confidence * raw_score + (1.0 - confidence) * cfg.prior_score;
    let games_bonus = games_bonus(evidence.games);
    let war_bonus = war_bonus(evidence.war);
    let win_rate_bonus = win_rate_bonus(evidence.team_win_rate.unwrap_or(0.5));

    FitScore {
        final_score: adjusted_score + games_bonus + war_bonus + win_rate_bonus,
        raw_score,
        direction,
        magnitude,
        confidence,
        adjusted_score,
        games_bonus,
        war_bonus,
        win_rate_bonus,
        missing_metrics,
    }
}

/// Highest final score among a position's roles; ties keep the first role name in sorted order.
pub fn best_role<'a>(
    profile: &Profile,
    roles: &'a BTreeMap<String, RoleEntry>,
    evidence: &Evidence,
    cfg: &ScoringConfig,
) -> Option<(&'a str, FitScore)> {
    let mut best: Option<(&'a str, FitScore)> = None;
    for (name, entry) in roles {
        let score = fit_score(profile, &entry.template, evidence, cfg);
        if best
            .as_ref()
            .is_none_or(|(_, b)| score.final_score > b.final_score)
        {
            best = Some((name.as_str(), score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    fn full_evidence() -> Evidence {
        Evidence {
            games: 10,
            events: 400,
            war: 0.0,
            team_win_rate: Some(0.45),
        }
    }

    fn template() -> Profile {
        Profile::from_pairs(
            Metric::ALL
                .iter()
                .enumerate()
                .map(|(i, m)| (*m, if m.is_ratio() { 0.02 * i as f64 } else { 10.0 + i as f64 })),
        )
    }

    #[test]
    fn identical_profile_scores_maximum() {
        let cfg = ScoringConfig::default();
        let t = template();
        let own = fit_score(&t, &t, &full_evidence(), &cfg);
        assert_float_absolute_eq!(own.direction, 1.0, 1e-9);
        assert_float_absolute_eq!(own.magnitude, 1.0, 1e-12);
        assert_float_absolute_eq!(own.raw_score, 100.0, 1e-6);

        let mut other = t.clone();
        other.set(Metric::AverageTouchY, 80.0);
        other.set(Metric::ShotFrequency, 0.5);
        let worse = fit_score(&other, &t, &full_evidence(), &cfg);
        assert!(worse.raw_score < own.raw_score);
        assert!(worse.final_score <= own.final_score);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        let zeros = vec![0.0; 4];
        assert_eq!(direction_similarity(&zeros, &[1.0, 2.0, 3.0, 4.0]), 0.0);
        assert_eq!(direction_similarity(&zeros, &zeros), 0.0);
    }

    #[test]
    fn confidence_grows_and_saturates() {
        let cfg = ScoringConfig::default();
        assert_eq!(confidence(0, 500, &cfg), 0.0);
        assert_eq!(confidence(5, 0, &cfg), 0.0);
        let mut last = 0.0;
        for games in 1..=8 {
            let c = confidence(games, 150, &cfg);
            assert!(c >= last);
            last = c;
        }
        assert_float_absolute_eq!(confidence(5, 200, &cfg), 1.0, 1e-12);
        assert_float_absolute_eq!(confidence(40, 5000, &cfg), 1.0, 1e-12);
        assert_float_absolute_eq!(confidence(5, 50, &cfg), 0.5, 1e-12);
    }

    #[test]
    fn bonus_boundaries_are_inclusive() {
        assert_eq!(war_bonus(0.30), 3.0);
        assert_eq!(war_bonus(0.29999), 2.0);
        assert_eq!(war_bonus(0.05), 0.5);
        assert_eq!(war_bonus(0.0), 0.0);
        assert_eq!(war_bonus(-0.05), -0.5);
        assert_eq!(war_bonus(-0.30), -3.0);
        assert_eq!(games_bonus(30), 3.0);
        assert_eq!(games_bonus(29), 2.0);
        assert_eq!(games_bonus(15), 0.5);
        assert_eq!(games_bonus(14), 0.0);
        assert_eq!(win_rate_bonus(0.6), 0.5);
        assert_eq!(win_rate_bonus(0.5), 0.25);
        assert_eq!(win_rate_bonus(0.45), 0.0);
        assert_eq!(win_rate_bonus(0.35), -0.25);
        assert_eq!(win_rate_bonus(0.2), -0.5);
    }

    #[test]
    fn thin_samples_shrink_toward_prior() {
        let cfg = ScoringConfig::default();
        let t = template();
        let thin = Evidence {
            games: 1,
            events: 40,
            war: 0.0,
            team_win_rate: Some(0.45),
        };
        let s = fit_score(&t, &t, &thin, &cfg);
        assert_float_absolute_eq!(s.confidence, 0.2, 1e-12);
        assert_float_absolute_eq!(s.adjusted_score, 0.2 * 100.0 + 0.8 * 50.0, 1e-6);
        assert_float_absolute_eq!(s.final_score, s.adjusted_score, 1e-12);
    }

    #[test]
    fn correction_off_returns_raw() {
        let cfg = ScoringConfig {
            sample_size_correction: false,
            ..ScoringConfig::default()
        };
        let t = template();
        let mut p = t.clone();
        p.set(Metric::PassFrequency, 0.9);
        let evidence = Evidence {
            games: 1,
            events: 10,
            war: 0.5,
            team_win_rate: Some(1.0),
        };
        let s = fit_score(&p, &t, &evidence, &cfg);
        assert_eq!(s.final_score, s.raw_score);
        assert_eq!(s.confidence, 1.0);
        assert_eq!(s.war_bonus, 0.0);
    }

    #[test]
    fn missing_template_metrics_are_reported() {
        let cfg = ScoringConfig::default();
        let sparse = Profile::from_pairs([(Metric::PassFrequency, 0.3)]);
        let s = fit_score(&template(), &sparse, &full_evidence(), &cfg);
        assert_eq!(s.missing_metrics.len(), Metric::COUNT - 1);
        assert!(!s.missing_metrics.contains(&Metric::PassFrequency));
    }

    #[test]
    fn best_role_breaks_ties_by_name() {
        let cfg = ScoringConfig::default();
        let t = template();
        let entry = |template: Profile| RoleEntry {
            description: String::new(),
            template,
            original_key: None,
            characteristics: None,
            player_count: None,
            match_ratio: None,
        };
        let mut roles = BTreeMap::new();
        roles.insert("Zeta".to_string(), entry(t.clone()));
        roles.insert("Alpha".to_string(), entry(t.clone()));
        let (name, _) = best_role(&t, &roles, &full_evidence(), &cfg).unwrap();
        assert_eq!(name, "Alpha");

        let mut far = t.clone();
        far.set(Metric::AverageTouchX, 95.0);
        roles.insert("Alpha".to_string(), entry(far));
        let (name, _) = best_role(&t, &roles, &full_evidence(), &cfg).unwrap();
        assert_eq!(name, "Zeta");

        assert!(best_role(&t, &BTreeMap::new(), &full_evidence(), &cfg).is_none());
    }
}
