use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cluster::PositionClusters;
use crate::profile::{Metric, Profile};
use crate::templates::RoleEntry;

pub const DEEP_LYING_MAX_Y: f64 = 34.0;
pub const ADVANCED_MIN_Y: f64 = 38.0;
pub const LONG_PASSER_MIN: f64 = 0.25;
pub const VERY_LONG_PASSER_MIN: f64 = 0.10;
pub const SHORT_PASSER_MIN: f64 = 0.35;
pub const BALL_PLAYING_PASS_FREQ: f64 = 0.32;
pub const BALL_PLAYING_SUCCESS: f64 = 0.88;
pub const DEFENSIVE_ACTION_MIN: f64 = 0.03;
pub const ATTACKING_SHOT_FREQ: f64 = 0.01;
pub const ATTACKING_FORWARD_ZONE: f64 = 0.35;
pub const BOX_TO_BOX_FORWARD_ZONE: f64 = 0.30;
pub const BOX_TO_BOX_DEFENSIVE: f64 = 0.02;
pub const PLAYMAKER_PASS_FREQ: f64 = 0.33;
pub const PLAYMAKER_SUCCESS: f64 = 0.87;
pub const TARGET_MAN_FORWARD_ZONE: f64 = 0.40;
pub const TARGET_MAN_SHOT_FREQ: f64 = 0.02;
pub const POACHER_SHOT_FREQ: f64 = 0.015;
pub const WIDE_PLAYER_MIN: f64 = 0.45;
pub const CENTRAL_PLAYER_MIN: f64 = 0.60;
pub const FORWARD_MOVING_MIN: f64 = 0.33;

/// Pitch centre, used when a template has no vertical touch average.
pub const DEFAULT_TOUCH_Y: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    DeepLying,
    Advanced,
    LongPasser,
    VeryLongPasser,
    ShortPasser,
    BallPlaying,
    Defensive,
    Attacking,
    BoxToBox,
    Playmaker,
    TargetMan,
    Poacher,
    WidePlayer,
    CentralPlayer,
    ForwardMoving,
}

impl Flag {
    pub fn name(self) -> &'static str {
        match self {
            Flag::DeepLying => "is_deep_lying",
            Flag::Advanced => "is_advanced",
            Flag::LongPasser => "is_long_passer",
            Flag::VeryLongPasser => "is_very_long_passer",
            Flag::ShortPasser => "is_short_passer",
            Flag::BallPlaying => "is_ball_playing",
            Flag::Defensive => "is_defensive",
            Flag::Attacking => "is_attacking",
            Flag::BoxToBox => "is_box_to_box",
            Flag::Playmaker => "is_playmaker",
            Flag::TargetMan => "is_target_man",
            Flag::Poacher => "is_poacher",
            Flag::WidePlayer => "is_wide_player",
            Flag::CentralPlayer => "is_central_player",
            Flag::ForwardMoving => "is_forward_moving",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    pub is_deep_lying: bool,
    pub is_advanced: bool,
    pub is_long_passer: bool,
    pub is_very_long_passer: bool,
    pub is_short_passer: bool,
    pub is_ball_playing: bool,
    pub is_defensive: bool,
    pub is_attacking: bool,
    pub is_box_to_box: bool,
    pub is_playmaker: bool,
    pub is_target_man: bool,
    pub is_poacher: bool,
    pub is_wide_player: bool,
    pub is_central_player: bool,
    pub is_forward_moving: bool,
}

impl Characteristics {
    pub fn of(template: &Profile) -> Self {
        let v = |m: Metric| template.value_or(m, 0.0);
        let avg_y = template.value_or(Metric::AverageTouchY, DEFAULT_TOUCH_Y);
        let pass_freq = v(Metric::PassFrequency);
        let pass_success = v(Metric::PassSuccessRate);
        let defensive = v(Metric::DefensiveActionFrequency);
        let shots = v(Metric::ShotFrequency);
        let forward_zone = v(Metric::TouchZoneForward);

        Self {
            is_deep_lying: avg_y < DEEP_LYING_MAX_Y,
            is_advanced: avg_y > ADVANCED_MIN_Y,
            is_long_passer: v(Metric::LongPassRatio) > LONG_PASSER_MIN,
            is_very_long_passer: v(Metric::VeryLongPassRatio) > VERY_LONG_PASSER_MIN,
            is_short_passer: v(Metric::ShortPassRatio) > SHORT_PASSER_MIN,
            is_ball_playing: pass_freq > BALL_PLAYING_PASS_FREQ
                && pass_success > BALL_PLAYING_SUCCESS,
            is_defensive: defensive > DEFENSIVE_ACTION_MIN,
            is_attacking: shots > ATTACKING_SHOT_FREQ || forward_zone > ATTACKING_FORWARD_ZONE,
            is_box_to_box: forward_zone > BOX_TO_BOX_FORWARD_ZONE
                && defensive > BOX_TO_BOX_DEFENSIVE,
            is_playmaker: pass_freq > PLAYMAKER_PASS_FREQ && pass_success > PLAYMAKER_SUCCESS,
            is_target_man: forward_zone > TARGET_MAN_FORWARD_ZONE
                && shots > TARGET_MAN_SHOT_FREQ,
            is_poacher: shots > POACHER_SHOT_FREQ,
            is_wide_player: v(Metric::TouchZoneWide) > WIDE_PLAYER_MIN,
            is_central_player: v(Metric::TouchZoneCentral) > CENTRAL_PLAYER_MIN,
            is_forward_moving: forward_zone > FORWARD_MOVING_MIN,
        }
    }

    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::DeepLying => self.is_deep_lying,
            Flag::Advanced => self.is_advanced,
            Flag::LongPasser => self.is_long_passer,
            Flag::VeryLongPasser => self.is_very_long_passer,
            Flag::ShortPasser => self.is_short_passer,
            Flag::BallPlaying => self.is_ball_playing,
            Flag::Defensive => self.is_defensive,
            Flag::Attacking => self.is_attacking,
            Flag::BoxToBox => self.is_box_to_box,
            Flag::Playmaker => self.is_playmaker,
            Flag::TargetMan => self.is_target_man,
            Flag::Poacher => self.is_poacher,
            Flag::WidePlayer => self.is_wide_player,
            Flag::CentralPlayer => self.is_central_player,
            Flag::ForwardMoving => self.is_forward_moving,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub flag: Flag,
    pub negated: bool,
}

impl Condition {
    pub fn holds(&self, c: &Characteristics) -> bool {
        c.get(self.flag) != self.negated
    }

    pub fn label(&self) -> String {
        if self.negated {
            format!("not {}", self.flag.name())
        } else {
            self.flag.name().to_string()
        }
    }
}

const fn has(flag: Flag) -> Condition {
    Condition {
        flag,
        negated: false,
    }
}

const fn lacks(flag: Flag) -> Condition {
    Condition {
        flag,
        negated: true,
    }
}

pub const DEFAULT_PRIORITY: u32 = 999;

#[derive(Debug, Clone)]
pub struct RoleCandidate {
    pub name: &'static str,
    pub description: &'static str,
    pub conditions: Vec<Condition>,
    pub priority: u32,
}

impl RoleCandidate {
    fn new(name: &'static str, description: &'static str, conditions: &[Condition]) -> Self {
        Self {
            name,
            description,
            conditions: conditions.to_vec(),
            priority: DEFAULT_PRIORITY,
        }
    }

    fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_default(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Share of satisfied conditions; zero-condition defaults score 0.
    pub fn match_ratio(&self, c: &Characteristics) -> f64 {
        if self.conditions.is_empty() {
            return 0.0;
        }
        let hit = self.conditions.iter().filter(|cond| cond.holds(c)).count();
        hit as f64 / self.conditions.len() as f64
    }
}

fn winger() -> RoleCandidate {
    RoleCandidate::new(
        "Winger",
        "Beats the full-back on the flank and delivers crosses",
        &[has(Flag::WidePlayer), has(Flag::Attacking)],
    )
}

fn inside_forward() -> RoleCandidate {
    RoleCandidate::new(
        "Inside Forward",
        "Starts wide and drives inside into central areas",
        &[
            has(Flag::WidePlayer),
            has(Flag::Attacking),
            has(Flag::CentralPlayer),
        ],
    )
}

fn wide_playmaker() -> RoleCandidate {
    RoleCandidate::new(
        "Wide Playmaker",
        "Dictates attacks from the flank with passing",
        &[has(Flag::WidePlayer), has(Flag::Playmaker)],
    )
}

fn full_back() -> RoleCandidate {
    RoleCandidate::new(
        "Full-Back",
        "Defends the flank and supports attacks",
        &[has(Flag::WidePlayer), has(Flag::Defensive)],
    )
}

fn wing_back() -> RoleCandidate {
    RoleCandidate::new(
        "Wing-Back",
        "Covers the whole flank in attack and defence",
        &[
            has(Flag::WidePlayer),
            has(Flag::Attacking),
            has(Flag::Defensive),
        ],
    )
}

fn inverted_wing_back() -> RoleCandidate {
    RoleCandidate::new(
        "Inverted Wing-Back",
        "Starts wide and tucks inside to join the build-up",
        &[
            has(Flag::WidePlayer),
            has(Flag::CentralPlayer),
            has(Flag::Playmaker),
        ],
    )
}

fn wide_midfielder() -> RoleCandidate {
    RoleCandidate::new(
        "Wide Midfielder",
        "Wide midfielder who organises attacks with passing",
        &[has(Flag::WidePlayer), has(Flag::Playmaker)],
    )
}

fn wide_central_midfielder() -> RoleCandidate {
    RoleCandidate::new(
        "Central Midfielder",
        "Wide-listed midfielder who operates centrally",
        &[has(Flag::CentralPlayer), has(Flag::Playmaker)],
    )
}

/// Candidate roles per position, in catalog order.
pub static ROLE_CATALOG: Lazy<BTreeMap<&'static str, Vec<RoleCandidate>>> = Lazy::new(|| {
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "CM",
        vec![
            RoleCandidate::new(
                "Deep Lying Playmaker",
                "Runs the build-up from deep and switches play with long passes",
                &[
                    has(Flag::DeepLying),
                    has(Flag::Playmaker),
                    has(Flag::LongPasser),
                ],
            )
            .priority(1),
            RoleCandidate::new(
                "Box-to-Box Midfielder",
                "Contributes in both boxes",
                &[has(Flag::BoxToBox), has(Flag::Playmaker)],
            )
            .priority(2),
            RoleCandidate::new(
                "Advanced Playmaker",
                "Orchestrates attacks high up with short passing",
                &[
                    has(Flag::Advanced),
                    has(Flag::Playmaker),
                    has(Flag::ShortPasser),
                ],
            )
            .priority(2),
            RoleCandidate::new(
                "Central Midfielder",
                "Balanced central midfielder",
                &[has(Flag::CentralPlayer), has(Flag::Playmaker)],
            )
            .priority(3),
        ],
    );
    catalog.insert(
        "CB",
        vec![
            RoleCandidate::new(
                "Libero",
                "Steps out from the back line to join the build-up",
                &[
                    has(Flag::ForwardMoving),
                    has(Flag::BallPlaying),
                    has(Flag::LongPasser),
                ],
            )
            .priority(1),
            RoleCandidate::new(
                "Ball Playing Defender",
                "Centre-back who builds play and switches with long passes",
                &[has(Flag::BallPlaying), has(Flag::LongPasser)],
            )
            .priority(2),
            RoleCandidate::new(
                "No-Nonsense Centre-Back",
                "Defends first and keeps distribution simple",
                &[has(Flag::Defensive), lacks(Flag::BallPlaying)],
            )
            .priority(2),
            RoleCandidate::new("Central Defender", "Conventional centre-back", &[]).priority(3),
        ],
    );
    catalog.insert(
        "CF",
        vec![
            RoleCandidate::new(
                "Target Man",
                "Holds the ball up high and links play or shoots",
                &[has(Flag::TargetMan), has(Flag::LongPasser)],
            ),
            RoleCandidate::new(
                "False 9",
                "Drops deep to join the build-up",
                &[
                    has(Flag::DeepLying),
                    has(Flag::Playmaker),
                    has(Flag::ShortPasser),
                ],
            ),
            RoleCandidate::new(
                "Poacher",
                "Lives in the box waiting for chances",
                &[has(Flag::Poacher), has(Flag::Attacking)],
            ),
            RoleCandidate::new(
                "Complete Forward",
                "Scores, links and holds up play",
                &[
                    has(Flag::Attacking),
                    has(Flag::Playmaker),
                    has(Flag::TargetMan),
                ],
            ),
        ],
    );
    for wing in ["RW", "LW"] {
        catalog.insert(wing, vec![winger(), inside_forward(), wide_playmaker()]);
    }
    for back in ["LB", "RB"] {
        catalog.insert(back, vec![full_back(), wing_back(), inverted_wing_back()]);
    }
    for back in ["LWB", "RWB"] {
        catalog.insert(back, vec![wing_back(), full_back(), inverted_wing_back()]);
    }
    for mid in ["LM", "RM"] {
        catalog.insert(
            mid,
            vec![wide_midfielder(), winger(), wide_central_midfielder()],
        );
    }
    catalog.insert(
        "GK",
        vec![
            RoleCandidate::new(
                "Sweeper Keeper",
                "Joins the build-up and distributes long",
                &[has(Flag::BallPlaying), has(Flag::LongPasser)],
            ),
            RoleCandidate::new("Goalkeeper", "Conventional goalkeeper", &[]),
        ],
    );
    catalog
});

#[derive(Debug, Clone)]
pub struct RoleMatch {
    pub name: &'static str,
    pub description: &'static str,
    pub matched: Vec<String>,
    pub match_ratio: f64,
}

/// Best catalog role for a template; `None` when the position has no catalog entry.
pub fn match_role(position: &str, characteristics: &Characteristics) -> Option<RoleMatch> {
    let candidates = ROLE_CATALOG.get(position)?;
    let mut scored: Vec<(usize, &RoleCandidate, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, cand)| (idx, cand, cand.match_ratio(characteristics)))
        .collect();
    scored.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| b.1.is_default().cmp(&a.1.is_default()))
            .then_with(|| a.1.priority.cmp(&b.1.priority))
            .then_with(|| a.0.cmp(&b.0))
    });
    let (_, best, ratio) = scored.into_iter().next()?;
    Some(RoleMatch {
        name: best.name,
        description: best.description,
        matched: best
            .conditions
            .iter()
            .filter(|c| c.holds(characteristics))
            .map(Condition::label)
            .collect(),
        match_ratio: ratio,
    })
}

/// Named role entries for one clustered position. Duplicate names get " (2)", " (3)" suffixes.
pub fn name_clusters(clusters: &PositionClusters) -> BTreeMap<String, RoleEntry> {
    let mut out: BTreeMap<String, RoleEntry> = BTreeMap::new();
    if !ROLE_CATALOG.contains_key(clusters.position.as_str()) {
        warn!(position = %clusters.position, "no role catalog for position, keeping cluster keys");
    }
    for cluster in &clusters.clusters {
        let characteristics = Characteristics::of(&cluster.template);
        let matched = match_role(&clusters.position, &characteristics);
        let (base, description, match_ratio) = match &matched {
            Some(m) => (m.name.to_string(), m.description.to_string(), Some(m.match_ratio)),
            None => (
                cluster.key.clone(),
                "No catalog role for this position".to_string(),
                None,
            ),
        };
        let mut name = base.clone();
        let mut n = 2;
        while out.contains_key(&name) {
            name = format!("{base} ({n})");
            n += 1;
        }
        debug!(
            position = %clusters.position,
            cluster = %cluster.key,
            role = %name,
            ratio = match_ratio.unwrap_or(0.0),
            "named cluster"
        );
        out.insert(
            name,
            RoleEntry {
                description,
                template: cluster.template.clone(),
                original_key: Some(cluster.key.clone()),
                characteristics: Some(characteristics),
                player_count: Some(cluster.player_ids.len()),
                match_ratio,
            },
        );
    }
    out
}
