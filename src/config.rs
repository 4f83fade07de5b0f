use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const CONFIG_ENV: &str = "ROLE_SCOUT_CONFIG";

/// Knobs for turning raw events into a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub short_pass_max: f64,
    pub long_pass_min: f64,
    pub very_long_pass_min: f64,
    /// Touches with `start_y` below this are in the defensive third.
    pub defensive_third_end: f64,
    /// Touches with `start_y` at or above this are in the forward third.
    pub forward_third_start: f64,
    pub central_lane_min: f64,
    pub central_lane_max: f64,
    pub min_events_exploratory: usize,
    pub min_events_ranking: usize,
    pub success_result: String,
    pub defensive_action_types: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            short_pass_max: 10.0,
            long_pass_min: 20.0,
            very_long_pass_min: 30.0,
            defensive_third_end: 33.33,
            forward_third_start: 66.67,
            central_lane_min: 30.0,
            central_lane_max: 70.0,
            min_events_exploratory: 50,
            min_events_ranking: 200,
            success_result: "Successful".to_string(),
            defensive_action_types: vec!["Intervention".to_string(), "Block".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub min_position_players: usize,
    pub cluster_min_events: usize,
    pub three_cluster_min: usize,
    pub two_cluster_min: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_position_players: 10,
            cluster_min_events: 100,
            three_cluster_min: 30,
            two_cluster_min: 15,
            seed: 42,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub direction_weight: f64,
    pub magnitude_weight: f64,
    pub confidence_full_games: u32,
    pub confidence_full_events: usize,
    pub prior_score: f64,
    pub sample_size_correction: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            direction_weight: 0.6,
            magnitude_weight: 0.4,
            confidence_full_games: 5,
            confidence_full_events: 200,
            prior_score: 50.0,
            sample_size_correction: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub min_games: u32,
    pub min_events: usize,
    pub reference_top_n: usize,
    pub max_weaknesses: usize,
    pub position_gap_threshold: f64,
    pub role_gap_threshold: f64,
    pub recommend_margin: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_games: 5,
            min_events: 200,
            reference_top_n: 10,
            max_weaknesses: 5,
            position_gap_threshold: 70.0,
            role_gap_threshold: 75.0,
            recommend_margin: 5.0,
        }
    }
}

/// Pass-network, pairing and coverage thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinationConfig {
    /// Team actions after a pass searched for its `Pass Received`.
    pub receive_window: usize,
    pub min_link_passes: usize,
    pub min_games_together: usize,
    pub min_pair_games: usize,
    pub touch_types: Vec<String>,
}

impl Default for CombinationConfig {
    fn default() -> Self {
        Self {
            receive_window: 5,
            min_link_passes: 10,
            min_games_together: 3,
            min_pair_games: 2,
            touch_types: ["Pass", "Carry", "Shot", "Pass Received"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub profile: ProfileConfig,
    pub cluster: ClusterConfig,
    pub scoring: ScoringConfig,
    pub ranking: RankingConfig,
    pub combination: CombinationConfig,
}

impl AnalysisConfig {
    /// Defaults, then the JSON file (explicit path or `ROLE_SCOUT_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(config_path_from_env);
        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("read config {}", path.display()))?;
                let cfg = serde_json::from_str::<AnalysisConfig>(&raw)
                    .with_context(|| format!("parse config {}", path.display()))?;
                info!(path = %path.display(), "loaded analysis config");
                cfg
            }
            None => AnalysisConfig::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(seed) = env_parse::<u64>("ROLE_SCOUT_SEED") {
            debug!(seed, "seed override from env");
            self.cluster.seed = seed;
        }
        if let Some(games) = env_parse::<u32>("ROLE_SCOUT_MIN_GAMES") {
            self.ranking.min_games = games.max(1);
        }
        if let Some(events) = env_parse::<usize>("ROLE_SCOUT_MIN_EVENTS") {
            self.ranking.min_events = events.max(1);
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    env::var(CONFIG_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse::<T>().ok())
}
