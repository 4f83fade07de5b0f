use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use role_scout::config::AnalysisConfig;
use role_scout::events::{EventTable, MatchResults};
use role_scout::profile::{ProfileGrade, build_samples};
use role_scout::rankings::rank_players;
use role_scout::team::{FORMATIONS, analyze_all_teams, best_elevens};
use role_scout::templates::{RoleTemplates, define_roles};

const TEAMS: u64 = 4;
const ROUNDS: u64 = 6;
const EVENTS_PER_PLAYER: u64 = 240;

#[derive(Clone, Copy)]
enum Style {
    DeepPasser,
    BoxToBox,
    Attacker,
    Stopper,
}

fn team_of(player_id: u64) -> u64 {
    player_id % TEAMS + 1
}

/// Teams 1v2 play odd game ids, 3v4 even ones.
fn game_of(team_id: u64, round: u64) -> u64 {
    if team_id <= 2 { 2 * round - 1 } else { 2 * round }
}

fn action(style: Style, i: u64) -> (&'static str, (f64, f64), (f64, f64)) {
    let slot = i % 10;
    match style {
        Style::DeepPasser => match slot {
            0..=6 => ("Pass", (0.0, 24.0), (4.0, 56.0)),
            7 | 8 => ("Pass Received", (0.0, 22.0), (0.0, 22.0)),
            _ => ("Tackle", (0.0, 20.0), (0.0, 20.0)),
        },
        Style::BoxToBox => match slot {
            0..=3 => ("Pass", (0.0, 50.0), (2.0, 62.0)),
            4..=6 => ("Carry", (0.0, 55.0), (0.0, 63.0)),
            7 | 8 => ("Tackle", (0.0, 45.0), (0.0, 45.0)),
            _ => ("Pass Received", (0.0, 60.0), (0.0, 60.0)),
        },
        Style::Attacker => match slot {
            0..=2 => ("Pass", (0.0, 78.0), (3.0, 73.0)),
            3 | 4 => ("Shot", (0.0, 88.0), (0.0, 100.0)),
            5..=8 => ("Pass Received", (0.0, 80.0), (0.0, 80.0)),
            _ => ("Carry", (0.0, 75.0), (0.0, 82.0)),
        },
        Style::Stopper => match slot {
            0..=4 => ("Pass", (0.0, 15.0), (0.0, 35.0)),
            5..=7 => ("Clearance", (0.0, 10.0), (0.0, 45.0)),
            _ => ("Tackle", (0.0, 12.0), (0.0, 12.0)),
        },
    }
}

fn roster() -> Vec<(u64, &'static str, Style)> {
    let mut out = Vec::new();
    for n in 0..33u64 {
        let style = match n % 3 {
            0 => Style::DeepPasser,
            1 => Style::BoxToBox,
            _ => Style::Attacker,
        };
        out.push((100 + n, "CM", style));
    }
    for n in 0..12u64 {
        out.push((200 + n, "CB", Style::Stopper));
    }
    for n in 0..4u64 {
        out.push((300 + n, "ST", Style::Attacker));
    }
    out
}

fn write_league(dir: &Path) -> (PathBuf, PathBuf) {
    let mut events = String::from(
        "game_id,player_id,team_id,type_name,result_name,start_x,start_y,end_x,end_y,player_name,team_name,main_position\n",
    );
    for (player_id, position, style) in roster() {
        let team_id = team_of(player_id);
        let lane = 30.0 + (player_id % 9) as f64 * 5.0;
        let drift = (player_id % 5) as f64;
        for i in 0..EVENTS_PER_PLAYER {
            let (kind, (sx, sy), (ex, ey)) = action(style, i);
            let result = if i % 7 == 0 { "Unsuccessful" } else { "Successful" };
            let _ = writeln!(
                events,
                "{},{player_id},{team_id},{kind},{result},{},{},{},{},Player {player_id},Club {team_id},{position}",
                game_of(team_id, i % ROUNDS + 1),
                lane + sx,
                sy + drift,
                lane + ex,
                ey + drift,
            );
        }
    }

    let mut results = String::from("game_id,home_team_id,away_team_id,home_score,away_score\n");
    for round in 1..=ROUNDS {
        let _ = writeln!(results, "{},1,2,{},1", 2 * round - 1, round % 3);
        let _ = writeln!(results, "{},3,4,1,{}", 2 * round, round % 2);
    }

    let events_path = dir.join("events.csv");
    let results_path = dir.join("results.csv");
    fs::write(&events_path, events).expect("write events");
    fs::write(&results_path, results).expect("write results");
    (events_path, results_path)
}

fn load_league() -> (tempfile::TempDir, EventTable, MatchResults) {
    let dir = tempfile::tempdir().expect("tempdir");
    let (events, results) = write_league(dir.path());
    let table = EventTable::from_path(&events).expect("events parse");
    let results = MatchResults::from_path(&results).expect("results parse");
    (dir, table, results)
}

#[test]
fn clusters_each_populated_position() {
    let (_dir, table, results) = load_league();
    let cfg = AnalysisConfig::default();
    let definition = define_roles(&table, &results, &cfg);

    let positions: Vec<&str> = definition.clusters.iter().map(|c| c.position.as_str()).collect();
    assert_eq!(positions, vec!["CB", "CM"]);

    let cm = definition.templates.for_position("CM").expect("CM roles");
    assert_eq!(cm.len(), 3);
    assert!(cm.values().all(|e| e.original_key.is_some()));
    let members: usize = cm.values().filter_map(|e| e.player_count).sum();
    assert_eq!(members, 33);
    assert!(cm.values().all(|e| e.player_count == Some(11)));

    let cb = definition.templates.for_position("CB").expect("CB roles");
    assert_eq!(cb.len(), 1);

    // too few strikers to cluster
    assert!(definition.templates.for_position("ST").is_none());

    // priors fill only positions without data-derived roles
    for full_back in ["LB", "RB"] {
        let roles = definition.templates.for_position(full_back).expect("prior roles");
        assert!(roles.values().all(|e| e.original_key.is_none()));
    }
}

#[test]
fn separation_flags_the_touch_height() {
    let (_dir, table, results) = load_league();
    let definition = define_roles(&table, &results, &AnalysisConfig::default());
    let cm = definition
        .clusters
        .iter()
        .find(|c| c.position == "CM")
        .expect("CM clusters");
    let touch_y = cm
        .separation
        .iter()
        .find(|s| s.metric.name() == "average_touch_y")
        .expect("touch height separation");
    assert!(touch_y.eta_squared > 0.9, "eta² {}", touch_y.eta_squared);
}

#[test]
fn definition_is_reproducible_and_round_trips() {
    let (dir, table, results) = load_league();
    let cfg = AnalysisConfig::default();
    let first = define_roles(&table, &results, &cfg).templates;
    let second = define_roles(&table, &results, &cfg).templates;
    assert_eq!(first, second);

    let path = dir.path().join("role_templates_named.json");
    first.save(&path).expect("save templates");
    let loaded = RoleTemplates::load(&path).expect("load templates");
    assert_eq!(loaded.role_count(), first.role_count());
}

#[test]
fn players_rank_highest_in_their_own_cluster() {
    let (_dir, table, results) = load_league();
    let cfg = AnalysisConfig::default();
    let definition = define_roles(&table, &results, &cfg);
    let cm_clusters = definition
        .clusters
        .iter()
        .find(|c| c.position == "CM")
        .expect("CM clusters");
    let cluster_of: BTreeMap<u64, &str> = cm_clusters
        .clusters
        .iter()
        .flat_map(|c| c.player_ids.iter().map(move |id| (*id, c.key.as_str())))
        .collect();

    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    let rankings = rank_players(&samples, &definition.templates, &cfg);
    let cm = definition.templates.for_position("CM").expect("CM roles");
    for a in rankings.assignments.iter().filter(|a| a.position == "CM") {
        let entry = &cm[&a.best_role];
        assert_eq!(
            entry.original_key.as_deref(),
            cluster_of.get(&a.player_id).copied(),
            "player {}",
            a.player_id
        );
    }
    for ranking in rankings.roles.values().filter(|r| r.position == "CM") {
        assert_eq!(ranking.players.len(), 33);
    }
}

#[test]
fn team_views_cover_every_club() {
    let (_dir, table, results) = load_league();
    let cfg = AnalysisConfig::default();
    let definition = define_roles(&table, &results, &cfg);
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    let rankings = rank_players(&samples, &definition.templates, &cfg);

    let teams = analyze_all_teams(&rankings.assignments, &cfg.ranking);
    let ids: Vec<u64> = teams.iter().map(|t| t.team_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let best = best_elevens(&rankings.assignments);
    assert_eq!(best.len(), FORMATIONS.len());
    for xi in &best {
        let mut ids: Vec<u64> = xi.players.iter().map(|p| p.player_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), xi.players.len(), "{} repeats a player", xi.formation);
    }
}
