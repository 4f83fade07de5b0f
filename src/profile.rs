use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProfileConfig;
use crate::error::{RoleError, RoleResult};
use crate::events::{
    CARRY, CLEARANCE, Event, EventTable, MatchResults, PASS, PASS_RECEIVED, PlayerInfo, SHOT,
    TACKLE, describe_player,
};
use crate::impact::{ImpactSummary, compute_impact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ForwardPassRatio,
    LongPassRatio,
    VeryLongPassRatio,
    ShortPassRatio,
    AveragePassLength,
    PassSuccessRate,
    ForwardPassSuccessRate,
    AverageForwardPassDistance,
    AverageCarryLength,
    CarryFrequency,
    AverageTouchX,
    AverageTouchY,
    TouchZoneCentral,
    TouchZoneWide,
    TouchZoneDefensive,
    TouchZoneMidfield,
    TouchZoneForward,
    DefensiveActionFrequency,
    TackleFrequency,
    ClearanceFrequency,
    ShotFrequency,
    PassFrequency,
    PassReceivedFrequency,
}

impl Metric {
    /// Canonical order; scorer vectors follow it.
    pub const ALL: [Metric; 23] = [
        Metric::ForwardPassRatio,
        Metric::LongPassRatio,
        Metric::VeryLongPassRatio,
        Metric::ShortPassRatio,
        Metric::AveragePassLength,
        Metric::PassSuccessRate,
        Metric::ForwardPassSuccessRate,
        Metric::AverageForwardPassDistance,
        Metric::AverageCarryLength,
        Metric::CarryFrequency,
        Metric::AverageTouchX,
        Metric::AverageTouchY,
        Metric::TouchZoneCentral,
        Metric::TouchZoneWide,
        Metric::TouchZoneDefensive,
        Metric::TouchZoneMidfield,
        Metric::TouchZoneForward,
        Metric::DefensiveActionFrequency,
        Metric::TackleFrequency,
        Metric::ClearanceFrequency,
        Metric::ShotFrequency,
        Metric::PassFrequency,
        Metric::PassReceivedFrequency,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(self) -> &'static str {
        match self {
            Metric::ForwardPassRatio => "forward_pass_ratio",
            Metric::LongPassRatio => "long_pass_ratio",
            Metric::VeryLongPassRatio => "very_long_pass_ratio",
            Metric::ShortPassRatio => "short_pass_ratio",
            Metric::AveragePassLength => "average_pass_length",
            Metric::PassSuccessRate => "pass_success_rate",
            Metric::ForwardPassSuccessRate => "forward_pass_success_rate",
            Metric::AverageForwardPassDistance => "average_forward_pass_distance",
            Metric::AverageCarryLength => "average_carry_length",
            Metric::CarryFrequency => "carry_frequency",
            Metric::AverageTouchX => "average_touch_x",
            Metric::AverageTouchY => "average_touch_y",
            Metric::TouchZoneCentral => "touch_zone_central",
            Metric::TouchZoneWide => "touch_zone_wide",
            Metric::TouchZoneDefensive => "touch_zone_defensive",
            Metric::TouchZoneMidfield => "touch_zone_midfield",
            Metric::TouchZoneForward => "touch_zone_forward",
            Metric::DefensiveActionFrequency => "defensive_action_frequency",
            Metric::TackleFrequency => "tackle_frequency",
            Metric::ClearanceFrequency => "clearance_frequency",
            Metric::ShotFrequency => "shot_frequency",
            Metric::PassFrequency => "pass_frequency",
            Metric::PassReceivedFrequency => "pass_received_frequency",
        }
    }

    /// Ratio metrics live in [0, 1]; the rest are averages on the pitch scale.
    pub fn is_ratio(self) -> bool {
        !matches!(
            self,
            Metric::AveragePassLength
                | Metric::AverageForwardPassDistance
                | Metric::AverageCarryLength
                | Metric::AverageTouchX
                | Metric::AverageTouchY
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown metric {s}"))
    }
}

/// Metric name to value. Serialized as a flat JSON object keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Profile {
    values: BTreeMap<Metric, f64>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn value_or(&self, metric: Metric, default: f64) -> f64 {
        self.get(metric).unwrap_or(default)
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.values.insert(metric, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }

    /// Values in canonical order with absent metrics as 0, plus the list of absent metrics.
    pub fn to_vector(&self) -> (Vec<f64>, Vec<Metric>) {
        let mut missing = Vec::new();
        let values = Metric::ALL
            .iter()
            .map(|m| match self.get(*m) {
                Some(v) => v,
                None => {
                    missing.push(*m);
                    0.0
                }
            })
            .collect();
        (values, missing)
    }

    /// Per-metric arithmetic mean; a metric absent from every input is absent from the result.
    pub fn mean<'a>(profiles: impl IntoIterator<Item = &'a Profile>) -> Profile {
        let mut sums: BTreeMap<Metric, (f64, usize)> = BTreeMap::new();
        for profile in profiles {
            for (metric, value) in profile.iter() {
                let slot = sums.entry(metric).or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }
        Profile {
            values: sums
                .into_iter()
                .map(|(m, (sum, n))| (m, sum / n as f64))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, f64>> for Profile {
    fn from(raw: BTreeMap<String, f64>) -> Self {
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            match key.parse::<Metric>() {
                Ok(metric) => {
                    values.insert(metric, value);
                }
                Err(_) => warn!(metric = %key, "ignoring unknown metric key"),
            }
        }
        Self { values }
    }
}

impl From<Profile> for BTreeMap<String, f64> {
    fn from(profile: Profile) -> Self {
        profile
            .values
            .into_iter()
            .map(|(m, v)| (m.name().to_string(), v))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileGrade {
    /// Exploratory analysis and clustering input.
    Exploratory,
    /// Ranking-grade profiles need a larger sample.
    Ranking,
}

impl ProfileGrade {
    pub fn min_events(self, cfg: &ProfileConfig) -> usize {
        match self {
            ProfileGrade::Exploratory => cfg.min_events_exploratory,
            ProfileGrade::Ranking => cfg.min_events_ranking,
        }
    }
}

pub fn extract_profile(
    events: &[&Event],
    cfg: &ProfileConfig,
    grade: ProfileGrade,
) -> RoleResult<Profile> {
    let need = grade.min_events(cfg);
    if events.len() < need {
        return Err(RoleError::insufficient_events(events.len(), need));
    }
    Ok(compute_metrics(events, cfg))
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn compute_metrics(events: &[&Event], cfg: &ProfileConfig) -> Profile {
    let total = events.len();
    let passes: Vec<&Event> = events.iter().copied().filter(|e| e.is(PASS)).collect();
    let forward: Vec<&Event> = passes.iter().copied().filter(|e| e.moves_forward()).collect();
    let lengths: Vec<f64> = passes.iter().map(|e| e.length()).collect();
    let count = |pred: &dyn Fn(&Event) -> bool| events.iter().filter(|e| pred(e)).count();

    let mut p = Profile::new();
    p.set(Metric::ForwardPassRatio, ratio(forward.len(), passes.len()));
    p.set(
        Metric::LongPassRatio,
        ratio(lengths.iter().filter(|l| **l >= cfg.long_pass_min).count(), passes.len()),
    );
    p.set(
        Metric::VeryLongPassRatio,
        ratio(
            lengths.iter().filter(|l| **l >= cfg.very_long_pass_min).count(),
            passes.len(),
        ),
    );
    p.set(
        Metric::ShortPassRatio,
        ratio(lengths.iter().filter(|l| **l <= cfg.short_pass_max).count(), passes.len()),
    );
    p.set(Metric::AveragePassLength, mean(lengths.iter().copied()));
    p.set(
        Metric::PassSuccessRate,
        ratio(
            passes.iter().filter(|e| e.is_successful(&cfg.success_result)).count(),
            passes.len(),
        ),
    );
    p.set(
        Metric::ForwardPassSuccessRate,
        ratio(
            forward.iter().filter(|e| e.is_successful(&cfg.success_result)).count(),
            forward.len(),
        ),
    );
    p.set(
        Metric::AverageForwardPassDistance,
        mean(forward.iter().map(|e| e.length())),
    );

    let carries: Vec<&Event> = events.iter().copied().filter(|e| e.is(CARRY)).collect();
    p.set(Metric::AverageCarryLength, mean(carries.iter().map(|e| e.length())));
    p.set(Metric::CarryFrequency, ratio(carries.len(), total));

    p.set(Metric::AverageTouchX, mean(events.iter().map(|e| e.start_x)));
    p.set(Metric::AverageTouchY, mean(events.iter().map(|e| e.start_y)));
    let central =
        count(&|e| e.start_x >= cfg.central_lane_min && e.start_x <= cfg.central_lane_max);
    p.set(Metric::TouchZoneCentral, ratio(central, total));
    p.set(Metric::TouchZoneWide, ratio(total - central, total));
    let defensive = count(&|e| e.start_y < cfg.defensive_third_end);
    let forward_zone = count(&|e| e.start_y >= cfg.forward_third_start);
    p.set(Metric::TouchZoneDefensive, ratio(defensive, total));
    p.set(
        Metric::TouchZoneMidfield,
        ratio(total - defensive - forward_zone, total),
    );
    p.set(Metric::TouchZoneForward, ratio(forward_zone, total));

    let defensive_actions = count(&|e| {
        cfg.defensive_action_types
            .iter()
            .any(|t| t.as_str() == e.type_name)
    });
    p.set(Metric::DefensiveActionFrequency, ratio(defensive_actions, total));
    p.set(Metric::TackleFrequency, ratio(count(&|e| e.is(TACKLE)), total));
    p.set(Metric::ClearanceFrequency, ratio(count(&|e| e.is(CLEARANCE)), total));
    p.set(Metric::ShotFrequency, ratio(count(&|e| e.is(SHOT)), total));
    p.set(Metric::PassFrequency, ratio(passes.len(), total));
    p.set(
        Metric::PassReceivedFrequency,
        ratio(count(&|e| e.is(PASS_RECEIVED)), total),
    );
    p
}

/// A profile together with the evidence the scorer weighs it by.
#[derive(Debug, Clone)]
pub struct PlayerSample {
    pub info: PlayerInfo,
    pub profile: Profile,
    pub impact: ImpactSummary,
}

impl PlayerSample {
    pub fn player_id(&self) -> u64 {
        self.info.player_id
    }

    pub fn games(&self) -> usize {
        self.info.game_count
    }

    pub fn events(&self) -> usize {
        self.info.event_count
    }

    pub fn position(&self) -> Option<&str> {
        self.info.position.as_deref()
    }
}

/// Profiles every player with enough events; players below the threshold are skipped.
pub fn build_samples(
    table: &EventTable,
    results: &MatchResults,
    cfg: &ProfileConfig,
    grade: ProfileGrade,
) -> Vec<PlayerSample> {
    let by_player: Vec<(u64, Vec<&Event>)> = table.player_events().into_iter().collect();
    let team_names = table.team_names();

    let mut samples: Vec<PlayerSample> = by_player
        .par_iter()
        .filter_map(|(player_id, events)| {
            let profile = match extract_profile(events, cfg, grade) {
                Ok(profile) => profile,
                Err(err) => {
                    debug!(player_id, %err, "skipping player");
                    return None;
                }
            };
            let info = describe_player(*player_id, events, &team_names);
            let impact = compute_impact(info.team_id, events, results);
            Some(PlayerSample {
                info,
                profile,
                impact,
            })
        })
        .collect();
    samples.sort_by_key(|s| s.info.player_id);

    info!(
        players = by_player.len(),
        profiled = samples.len(),
        grade = ?grade,
        "built player profiles"
    );
    samples
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn event(type_name: &str, start: (f64, f64), end: (f64, f64)) -> Event {
        Event {
            game_id: 1,
            player_id: Some(7),
            team_id: 1,
            type_name: type_name.to_string(),
            result_name: Some("Successful".to_string()),
            start_x: start.0,
            start_y: start.1,
            end_x: Some(end.0),
            end_y: Some(end.1),
            dx: Some(end.0 - start.0),
            dy: Some(end.1 - start.1),
            time_seconds: None,
            action_id: None,
            period_id: None,
            player_name: None,
            team_name: None,
            main_position: None,
        }
    }

    fn mixed_events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| match i % 5 {
                0 => event(PASS, (50.0, 20.0), (50.0, 45.0)),
                1 => event(PASS, (10.0, 70.0), (15.0, 65.0)),
                2 => event(CARRY, (40.0, 40.0), (44.0, 43.0)),
                3 => event("Intervention", (80.0, 10.0), (80.0, 10.0)),
                _ => event(SHOT, (50.0, 90.0), (50.0, 100.0)),
            })
            .collect()
    }

    #[test]
    fn below_threshold_is_insufficient() {
        let cfg = ProfileConfig::default();
        let events = mixed_events(49);
        let refs: Vec<&Event> = events.iter().collect();
        let err = extract_profile(&refs, &cfg, ProfileGrade::Exploratory).unwrap_err();
        assert!(err.is_skippable());

        let events = mixed_events(50);
        let refs: Vec<&Event> = events.iter().collect();
        assert!(extract_profile(&refs, &cfg, ProfileGrade::Exploratory).is_ok());
        assert!(extract_profile(&refs, &cfg, ProfileGrade::Ranking).is_err());
    }

    #[test]
    fn ratios_bounded_and_zones_partition() {
        let cfg = ProfileConfig::default();
        let events = mixed_events(100);
        let refs: Vec<&Event> = events.iter().collect();
        let p = extract_profile(&refs, &cfg, ProfileGrade::Exploratory).unwrap();
        assert_eq!(p.len(), Metric::COUNT);
        for (metric, value) in p.iter() {
            if metric.is_ratio() {
                assert!((0.0..=1.0).contains(&value), "{metric} = {value}");
            }
        }
        let vertical = p.value_or(Metric::TouchZoneDefensive, 0.0)
            + p.value_or(Metric::TouchZoneMidfield, 0.0)
            + p.value_or(Metric::TouchZoneForward, 0.0);
        assert!((vertical - 1.0).abs() < 1e-9);
        let lanes =
            p.value_or(Metric::TouchZoneCentral, 0.0) + p.value_or(Metric::TouchZoneWide, 0.0);
        assert!((lanes - 1.0).abs() < 1e-9);
        assert!((p.value_or(Metric::ForwardPassRatio, 0.0) - 0.5).abs() < 1e-9);
        assert!((p.value_or(Metric::DefensiveActionFrequency, 0.0) - 0.2).abs() < 1e-9);
        assert!((p.value_or(Metric::AverageForwardPassDistance, 0.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn no_passes_zeroes_pass_metrics() {
        let cfg = ProfileConfig::default();
        let events: Vec<Event> = (0..60)
            .map(|_| event(CARRY, (40.0, 40.0), (43.0, 44.0)))
            .collect();
        let refs: Vec<&Event> = events.iter().collect();
        let p = extract_profile(&refs, &cfg, ProfileGrade::Exploratory).unwrap();
        for metric in [
            Metric::ForwardPassRatio,
            Metric::LongPassRatio,
            Metric::AveragePassLength,
            Metric::PassSuccessRate,
            Metric::ForwardPassSuccessRate,
            Metric::PassFrequency,
        ] {
            assert_eq!(p.get(metric), Some(0.0), "{metric}");
        }
        assert!((p.value_or(Metric::AverageCarryLength, 0.0) - 5.0).abs() < 1e-9);
        assert_eq!(p.get(Metric::CarryFrequency), Some(1.0));
    }

    #[test]
    fn unknown_keys_dropped_on_load() {
        let p: Profile =
            serde_json::from_str(r#"{"pass_frequency":0.4,"xg_per_90":1.2}"#).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.get(Metric::PassFrequency), Some(0.4));
        let back = serde_json::to_string(&p).unwrap();
        assert_eq!(back, r#"{"pass_frequency":0.4}"#);
    }

    #[test]
    fn to_vector_reports_missing() {
        let p = Profile::from_pairs([(Metric::ShotFrequency, 0.1)]);
        let (values, missing) = p.to_vector();
        assert_eq!(values.len(), Metric::COUNT);
        assert_eq!(values[20], 0.1);
        assert_eq!(missing.len(), Metric::COUNT - 1);
    }
}
