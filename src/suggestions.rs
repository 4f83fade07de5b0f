use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RankingConfig;
use crate::profile::{Metric, PlayerSample, Profile};
use crate::rankings::{PlayerAssignment, Rankings};
use crate::templates::RoleTemplates;

const ESSENTIAL_WEIGHT: f64 = 2.0;
const IMPORTANT_WEIGHT: f64 = 1.5;
const GAP_TOLERANCE: f64 = 0.05;
const IMPORTANCE_THRESHOLD: f64 = 0.15;

const ACTIVITY_METRICS: [Metric; 5] = [
    Metric::DefensiveActionFrequency,
    Metric::TackleFrequency,
    Metric::CarryFrequency,
    Metric::TouchZoneForward,
    Metric::TouchZoneDefensive,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CoreMetrics {
    pub essential: &'static [Metric],
    pub important: &'static [Metric],
    pub irrelevant: &'static [Metric],
}

impl CoreMetrics {
    pub fn weight(&self, metric: Metric) -> f64 {
        if self.essential.contains(&metric) {
            ESSENTIAL_WEIGHT
        } else if self.important.contains(&metric) {
            IMPORTANT_WEIGHT
        } else {
            1.0
        }
    }
}

/// Role name without the " (2)" style suffix added for duplicate cluster names.
fn base_role_name(role: &str) -> &str {
    match role.rfind(" (") {
        Some(idx) if role.ends_with(')') => &role[..idx],
        _ => role,
    }
}

pub fn core_metrics(role: &str) -> CoreMetrics {
    use Metric::*;
    match base_role_name(role) {
        "Central Midfielder" => CoreMetrics {
            essential: &[
                DefensiveActionFrequency,
                TackleFrequency,
                PassSuccessRate,
                TouchZoneDefensive,
                TouchZoneMidfield,
            ],
            important: &[PassFrequency, ForwardPassRatio, AverageTouchY],
            irrelevant: &[ShotFrequency, ClearanceFrequency],
        },
        "Deep Lying Playmaker" => CoreMetrics {
            essential: &[
                LongPassRatio,
                VeryLongPassRatio,
                PassSuccessRate,
                AverageTouchY,
                TouchZoneCentral,
            ],
            important: &[PassFrequency, ForwardPassRatio, AveragePassLength],
            irrelevant: &[ShotFrequency, DefensiveActionFrequency],
        },
        "Box-to-Box Midfielder" => CoreMetrics {
            essential: &[
                TouchZoneForward,
                TouchZoneDefensive,
                DefensiveActionFrequency,
                PassSuccessRate,
            ],
            important: &[TackleFrequency, ForwardPassRatio, AverageTouchY],
            irrelevant: &[ShotFrequency],
        },
        "Ball Playing Defender" => CoreMetrics {
            essential: &[LongPassRatio, PassSuccessRate, PassFrequency, TouchZoneDefensive],
            important: &[ForwardPassRatio, AveragePassLength],
            irrelevant: &[ShotFrequency, TouchZoneForward],
        },
        "No-Nonsense Centre-Back" => CoreMetrics {
            essential: &[
                DefensiveActionFrequency,
                ClearanceFrequency,
                TackleFrequency,
                TouchZoneDefensive,
            ],
            important: &[PassSuccessRate],
            irrelevant: &[ShotFrequency, LongPassRatio, PassFrequency],
        },
        "Libero" => CoreMetrics {
            essential: &[TouchZoneForward, PassSuccessRate, LongPassRatio, AverageTouchY],
            important: &[PassFrequency, ForwardPassRatio],
            irrelevant: &[ShotFrequency],
        },
        "Poacher" => CoreMetrics {
            essential: &[ShotFrequency, TouchZoneForward],
            important: &[PassSuccessRate, ShortPassRatio],
            irrelevant: &[DefensiveActionFrequency, TackleFrequency, ClearanceFrequency],
        },
        "Winger" => CoreMetrics {
            essential: &[TouchZoneWide, TouchZoneForward, ForwardPassRatio],
            important: &[PassSuccessRate, CarryFrequency],
            irrelevant: &[DefensiveActionFrequency],
        },
        "Full-Back" => CoreMetrics {
            essential: &[TouchZoneWide, DefensiveActionFrequency, PassSuccessRate],
            important: &[ForwardPassRatio, TouchZoneForward],
            irrelevant: &[ShotFrequency],
        },
        "Wing-Back" => CoreMetrics {
            essential: &[TouchZoneWide, TouchZoneForward, DefensiveActionFrequency],
            important: &[PassSuccessRate, ForwardPassRatio],
            irrelevant: &[ShotFrequency],
        },
        "Inverted Wing-Back" => CoreMetrics {
            essential: &[TouchZoneCentral, PassSuccessRate, PassFrequency],
            important: &[ForwardPassRatio, AverageTouchY],
            irrelevant: &[ShotFrequency],
        },
        "Sweeper Keeper" => CoreMetrics {
            essential: &[LongPassRatio, PassSuccessRate, PassFrequency],
            important: &[AveragePassLength],
            irrelevant: &[ShotFrequency, DefensiveActionFrequency],
        },
        _ => CoreMetrics::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    Maintain,
}

#[derive(Debug, Clone, Serialize)]
pub struct Weakness {
    pub metric: Metric,
    pub player_value: f64,
    pub template_value: f64,
    pub top_avg: f64,
    pub top_max: f64,
    pub gap_to_top: f64,
    pub importance: f64,
    pub direction: Direction,
    pub goal: f64,
    pub is_essential: bool,
    pub is_important: bool,
    pub is_activity_metric: bool,
}

pub fn identify_weaknesses(
    profile: &Profile,
    template: &Profile,
    top_profiles: &[&Profile],
    role: &str,
    max_weaknesses: usize,
) -> Vec<Weakness> {
    let core = core_metrics(role);
    let mut out: Vec<Weakness> = Vec::new();

    for metric in Metric::ALL {
        if core.irrelevant.contains(&metric) {
            continue;
        }
        let player_value = profile.value_or(metric, 0.0);
        let template_value = template.value_or(metric, 0.0);
        if player_value == 0.0 && template_value == 0.0 {
            continue;
        }

        let top_values: Vec<f64> = top_profiles.iter().map(|p| p.value_or(metric, 0.0)).collect();
        let (top_avg, top_max) = if top_values.is_empty() {
            (template_value, template_value)
        } else {
            (
                top_values.iter().sum::<f64>() / top_values.len() as f64,
                top_values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let gap_to_top = player_value - top_avg;
        let gap_ratio = if top_avg > 0.0 {
            gap_to_top.abs() / (top_avg.abs() + 1e-10)
        } else {
            gap_to_top.abs()
        };
        let importance = gap_ratio * core.weight(metric);
        if importance <= IMPORTANCE_THRESHOLD {
            continue;
        }

        let (direction, goal) = if gap_to_top < -GAP_TOLERANCE {
            (Direction::Increase, top_avg)
        } else if gap_to_top > GAP_TOLERANCE {
            (Direction::Decrease, top_avg)
        } else {
            (Direction::Maintain, player_value)
        };

        out.push(Weakness {
            metric,
            player_value,
            template_value,
            top_avg,
            top_max,
            gap_to_top,
            importance,
            direction,
            goal,
            is_essential: core.essential.contains(&metric),
            is_important: core.important.contains(&metric),
            is_activity_metric: ACTIVITY_METRICS.contains(&metric),
        });
    }

    out.sort_by(|a, b| {
        b.is_essential
            .cmp(&a.is_essential)
            .then_with(|| b.importance.total_cmp(&a.importance))
    });
    out.truncate(max_weaknesses);
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub priority: usize,
    pub improvement_needed: f64,
    #[serde(flatten)]
    pub weakness: Weakness,
}

pub fn suggest_improvements(
    profile: &Profile,
    template: &Profile,
    top_profiles: &[&Profile],
    role: &str,
    max_weaknesses: usize,
) -> Vec<Suggestion> {
    identify_weaknesses(profile, template, top_profiles, role, max_weaknesses)
        .into_iter()
        .enumerate()
        .map(|(idx, weakness)| Suggestion {
            priority: idx + 1,
            improvement_needed: weakness.goal - weakness.player_value,
            weakness,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerImprovement {
    pub player_id: u64,
    pub player_name: String,
    pub position: String,
    pub role: String,
    pub fit_score: f64,
    pub role_rank: Option<usize>,
    pub suggestions: Vec<Suggestion>,
}

/// Suggestions for an assigned player, measured against the top of their best role.
pub fn improvement_plan(
    assignment: &PlayerAssignment,
    rankings: &Rankings,
    samples: &BTreeMap<u64, &PlayerSample>,
    templates: &RoleTemplates,
    cfg: &RankingConfig,
) -> Option<PlayerImprovement> {
    let sample = samples.get(&assignment.player_id)?;
    let entry = templates
        .for_position(&assignment.position)?
        .get(&assignment.best_role)?;
    let top_profiles: Vec<&Profile> = rankings
        .roles
        .get(&assignment.role_key())
        .map(|r| {
            r.top(cfg.reference_top_n)
                .iter()
                .filter_map(|p| samples.get(&p.player_id).map(|s| &s.profile))
                .collect()
        })
        .unwrap_or_default();

    Some(PlayerImprovement {
        player_id: assignment.player_id,
        player_name: assignment.player_name.clone(),
        position: assignment.position.clone(),
        role: assignment.best_role.clone(),
        fit_score: assignment.fit.final_score,
        role_rank: assignment.role_rank,
        suggestions: suggest_improvements(
            &sample.profile,
            &entry.template,
            &top_profiles,
            &assignment.best_role,
            cfg.max_weaknesses,
        ),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImprovementCheck {
    pub improved: bool,
    pub goal_achieved: bool,
    pub change: f64,
    pub change_ratio: f64,
}

/// Compares a metric before and after against the goal it was set.
pub fn check_improvement(before: f64, after: f64, goal: f64) -> ImprovementCheck {
    let change = after - before;
    let distance = (goal - before).abs();
    ImprovementCheck {
        improved: if goal > before { change > 0.0 } else { change < 0.0 },
        goal_achieved: (after - goal).abs() < distance,
        change,
        change_ratio: if distance > 0.0 { change / distance } else { 0.0 },
    }
}
