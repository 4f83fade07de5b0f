use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::debug;

use role_scout::config::AnalysisConfig;
use role_scout::events::{EventTable, MatchResults};
use role_scout::profile::{Metric, PlayerSample, Profile, ProfileGrade, build_samples};
use role_scout::rankings::{rank_players, role_key};
use role_scout::scoring::{Evidence, FitScore, fit_score};
use role_scout::suggestions::suggest_improvements;
use role_scout::templates::{DEFAULT_TEMPLATES_FILE, RoleTemplates};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// player to score
    #[clap(long)]
    player: u64,

    /// event CSV
    #[clap(long)]
    events: PathBuf,

    /// match-result CSV
    #[clap(long)]
    results: PathBuf,

    #[clap(long, default_value = DEFAULT_TEMPLATES_FILE)]
    templates: PathBuf,

    #[clap(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    role_scout::init_tracing();

    let args = Args::parse();
    debug!("args: {args:?}");
    let cfg = AnalysisConfig::load(args.config.as_deref())?;
    let templates = RoleTemplates::load(&args.templates)?;
    let table = EventTable::from_path(&args.events)?;
    let results = MatchResults::from_path(&args.results)?;

    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Exploratory);
    let sample = samples
        .iter()
        .find(|s| s.player_id() == args.player)
        .ok_or_else(|| {
            anyhow!(
                "player {} has fewer than {} events",
                args.player,
                cfg.profile.min_events_exploratory
            )
        })?;
    let position = sample
        .position()
        .with_context(|| format!("player {} has no position", args.player))?;
    let roles = templates.require_position(position)?;

    let evidence = Evidence::from(sample);
    let mut scored: Vec<(&str, FitScore)> = roles
        .iter()
        .map(|(name, entry)| {
            (
                name.as_str(),
                fit_score(&sample.profile, &entry.template, &evidence, &cfg.scoring),
            )
        })
        .collect();
    scored.sort_by(|a, b| b.1.final_score.total_cmp(&a.1.final_score));

    println!(
        "{} ({}, {}) {} games, {} events",
        sample.info.name,
        sample.info.team_name,
        position,
        sample.games(),
        sample.events()
    );
    print_profile(&sample.profile);
    println!();
    println!("Role fit:");
    for (role, fit) in &scored {
        println!(
            "  {role:<28} final {:>5.1}  raw {:>5.1}  dir {:.3}  mag {:.3}  conf {:.2}",
            fit.final_score, fit.raw_score, fit.direction, fit.magnitude, fit.confidence
        );
        if !fit.missing_metrics.is_empty() {
            let missing: Vec<&str> = fit.missing_metrics.iter().map(|m| m.name()).collect();
            println!("  {:<28} missing: {}", "", missing.join(", "));
        }
    }

    let Some((best, _)) = scored.first() else {
        return Ok(());
    };
    let rankings = rank_players(&samples, &templates, &cfg);
    let top_profiles: Vec<&Profile> = rankings
        .roles
        .get(&role_key(position, best))
        .map(|r| {
            r.top(cfg.ranking.reference_top_n)
                .iter()
                .filter_map(|p| find(&samples, p.player_id).map(|s| &s.profile))
                .collect()
        })
        .unwrap_or_default();
    let suggestions = suggest_improvements(
        &sample.profile,
        &roles[*best].template,
        &top_profiles,
        best,
        cfg.ranking.max_weaknesses,
    );

    println!();
    println!("Suggestions for {best} (vs top {}):", top_profiles.len());
    if suggestions.is_empty() {
        println!("  none");
    }
    for s in &suggestions {
        println!(
            "  {}. {:<32} {:?} {:.3} -> {:.3} (importance {:.2})",
            s.priority,
            s.weakness.metric.name(),
            s.weakness.direction,
            s.weakness.player_value,
            s.weakness.goal,
            s.weakness.importance
        );
    }
    Ok(())
}

fn find(samples: &[PlayerSample], player_id: u64) -> Option<&PlayerSample> {
    samples
        .binary_search_by_key(&player_id, PlayerSample::player_id)
        .ok()
        .map(|idx| &samples[idx])
}

fn print_profile(profile: &Profile) {
    for metric in Metric::ALL {
        if let Some(value) = profile.get(metric) {
            println!("  {:<32} {value:.3}", metric.name());
        }
    }
}
