use std::fmt::Write as _;
use std::path::PathBuf;

use assert_float_eq::*;

use role_scout::config::AnalysisConfig;
use role_scout::error::RoleError;
use role_scout::events::{EventTable, MatchResults};
use role_scout::profile::{Metric, ProfileGrade, build_samples};
use role_scout::scoring::{Evidence, best_role, fit_score};
use role_scout::templates::{DEFINE_ROLES_COMMAND, RoleTemplates};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn load_fixture_league() -> (EventTable, MatchResults) {
    let table = EventTable::from_path(&fixture("long_passer_events.csv"))
        .expect("event fixture should parse");
    let results = MatchResults::from_path(&fixture("long_passer_results.csv"))
        .expect("result fixture should parse");
    (table, results)
}

#[test]
fn long_passing_midfielder_fits_deep_lying_role() {
    let (table, results) = load_fixture_league();
    let cfg = AnalysisConfig::default();
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    assert_eq!(samples.len(), 1);

    let player = &samples[0];
    assert_eq!(player.player_id(), 10);
    assert_eq!(player.info.name, "Lee Long");
    assert_eq!(player.position(), Some("CM"));
    assert_eq!(player.games(), 5);
    assert_eq!(player.events(), 200);

    let p = &player.profile;
    for metric in [
        Metric::LongPassRatio,
        Metric::VeryLongPassRatio,
        Metric::ForwardPassRatio,
        Metric::PassSuccessRate,
        Metric::TouchZoneDefensive,
        Metric::PassFrequency,
    ] {
        assert_float_absolute_eq!(p.value_or(metric, 0.0), 1.0, 1e-9);
    }
    assert_float_absolute_eq!(p.value_or(Metric::AverageTouchY, 0.0), 25.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::AveragePassLength, 0.0), 35.0, 1e-9);

    let templates = RoleTemplates::load(&fixture("long_passer_templates.json"))
        .expect("template fixture should load");
    let roles = templates.for_position("CM").expect("CM roles");
    let (role, fit) =
        best_role(p, roles, &Evidence::from(player), &cfg.scoring).expect("a best role");
    assert_eq!(role, "Deep-Lying Playmaker");
    assert_float_absolute_eq!(fit.confidence, 1.0, 1e-12);
    assert!(fit.raw_score > 80.0, "raw score {}", fit.raw_score);
    assert!(fit.missing_metrics.is_empty());
}

/// 300 passes over 10 games, every one 35 long and forward from y = 25,
/// with one in twenty unsuccessful.
fn season_long_passer() -> (EventTable, MatchResults) {
    let mut events = String::from(
        "game_id,player_id,team_id,type_name,result_name,start_x,start_y,end_x,end_y,\
         player_name,team_name,main_position\n",
    );
    for i in 0..300u64 {
        let result = if i % 20 == 19 { "Unsuccessful" } else { "Successful" };
        let _ = writeln!(
            events,
            "{},10,1,Pass,{result},50.0,25.0,50.0,60.0,Lee Long,Jeonbuk,CM",
            i % 10 + 1
        );
    }
    let mut results = String::from("game_id,home_team_id,away_team_id,home_score,away_score\n");
    for game in 1..=10 {
        let _ = writeln!(results, "{game},1,2,{},1", game % 3);
    }
    let table = EventTable::from_reader(events.as_bytes(), "season events").expect("events parse");
    let results = MatchResults::from_reader(results.as_bytes(), "season results")
        .expect("results parse");
    (table, results)
}

#[test]
fn season_long_passer_profile_and_fit() {
    let (table, results) = season_long_passer();
    let cfg = AnalysisConfig::default();
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    assert_eq!(samples.len(), 1);
    let player = &samples[0];
    assert_eq!(player.games(), 10);
    assert_eq!(player.events(), 300);

    let p = &player.profile;
    assert_float_absolute_eq!(p.value_or(Metric::PassSuccessRate, 0.0), 0.95, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::ForwardPassSuccessRate, 0.0), 0.95, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::AveragePassLength, 0.0), 35.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::LongPassRatio, 0.0), 1.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::VeryLongPassRatio, 0.0), 1.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::ForwardPassRatio, 0.0), 1.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::AverageTouchY, 0.0), 25.0, 1e-9);
    assert_float_absolute_eq!(p.value_or(Metric::ShotFrequency, 0.0), 0.0, 1e-12);
    assert_float_absolute_eq!(p.value_or(Metric::DefensiveActionFrequency, 0.0), 0.0, 1e-12);

    let templates = RoleTemplates::load(&fixture("long_passer_templates.json"))
        .expect("template fixture should load");
    let roles = templates.for_position("CM").expect("CM roles");
    let evidence = Evidence::from(player);
    let (role, fit) = best_role(p, roles, &evidence, &cfg.scoring).expect("a best role");
    assert_eq!(role, "Deep-Lying Playmaker");
    assert_float_absolute_eq!(fit.confidence, 1.0, 1e-12);
    assert!(fit.raw_score > 80.0, "raw score {}", fit.raw_score);

    // four games sits below the full-confidence game count
    let short = Evidence {
        games: 4,
        ..evidence
    };
    let thin = fit_score(p, &roles[role].template, &short, &cfg.scoring);
    assert_float_absolute_eq!(thin.confidence, 0.8f64.sqrt(), 1e-12);
    assert!(thin.final_score < fit.final_score);
}

#[test]
fn thin_samples_are_skipped_not_fatal() {
    let (table, results) = load_fixture_league();
    let cfg = AnalysisConfig::default();
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Exploratory);
    let ids: Vec<u64> = samples.iter().map(|s| s.player_id()).collect();
    assert_eq!(ids, vec![10]);
    assert_eq!(table.player_directory().len(), 2);
}

#[test]
fn team_results_feed_impact() {
    let (table, results) = load_fixture_league();
    let cfg = AnalysisConfig::default();
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    let impact = &samples[0].impact;
    assert_eq!(impact.wins, 2);
    assert_eq!(impact.draws, 2);
    assert_eq!(impact.losses, 1);
    assert_eq!(impact.games_with, 5);
    assert_float_absolute_eq!(impact.team_win_rate.expect("win rate"), 0.4, 1e-12);
}

#[test]
fn missing_columns_are_fatal() {
    let err = EventTable::from_path(&fixture("missing_columns_events.csv"))
        .expect_err("missing columns should abort");
    match err.downcast_ref::<RoleError>() {
        Some(RoleError::MissingColumns { columns, .. }) => {
            assert_eq!(columns, &vec!["team_id".to_string(), "start_y".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_row_names_the_line() {
    let err = EventTable::from_path(&fixture("malformed_events.csv"))
        .expect_err("bad number should abort");
    match err.downcast_ref::<RoleError>() {
        Some(RoleError::MalformedRow { line, reason, .. }) => {
            assert_eq!(*line, 3);
            assert!(reason.contains("start_x"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn ranking_without_templates_points_at_define_roles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = RoleTemplates::load(&dir.path().join("role_templates_named.json"))
        .expect_err("absent templates are fatal");
    assert!(err.to_string().contains(DEFINE_ROLES_COMMAND), "{err}");
}
