use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use role_scout::cluster::PositionClusters;
use role_scout::combinations::{TeamCombinations, analyze_combinations};
use role_scout::config::AnalysisConfig;
use role_scout::events::{EventTable, MatchResults};
use role_scout::export::export_rankings;
use role_scout::profile::{PlayerSample, ProfileGrade, build_samples};
use role_scout::rankings::{Rankings, TeamRoster, rank_players, team_rosters};
use role_scout::report::{
    Envelope, TeamReport, combinations_markdown, rankings_markdown, roles_markdown, write_json,
    write_text,
};
use role_scout::suggestions::{PlayerImprovement, improvement_plan};
use role_scout::team::{analyze_all_teams, best_elevens};
use role_scout::templates::{DEFAULT_TEMPLATES_FILE, RoleTemplates, define_roles};

#[derive(Debug, Parser)]
#[command(name = "role_scout", about = "Data-derived player roles, fit scores and rankings")]
struct Cli {
    /// JSON analysis config; falls back to ROLE_SCOUT_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cluster each position into roles and write the named templates
    DefineRoles {
        #[command(flatten)]
        inputs: Inputs,

        /// where to write the template JSON
        #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
        out: PathBuf,

        /// optional Markdown summary of the roles
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
    /// Score eligible players against every role of their position
    Rank {
        #[command(flatten)]
        inputs: Inputs,

        #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
        templates: PathBuf,

        #[arg(long, default_value = "role_rankings.json")]
        out: PathBuf,

        #[arg(long)]
        markdown: Option<PathBuf>,

        /// XLSX workbook of rankings, assignments, rosters and best XIs
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// per-player improvement suggestions JSON
        #[arg(long)]
        improvements: Option<PathBuf>,
    },
    /// Team weaknesses, recommended signings and league best XIs
    Teams {
        #[command(flatten)]
        inputs: Inputs,

        #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
        templates: PathBuf,

        #[arg(long, default_value = "team_improvements.json")]
        out: PathBuf,
    },
    /// Pass networks, role pairings, player synergy and spatial coverage per team
    Combinations {
        #[command(flatten)]
        inputs: Inputs,

        #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
        templates: PathBuf,

        #[arg(long, default_value = "team_combinations.json")]
        out: PathBuf,

        #[arg(long)]
        markdown: Option<PathBuf>,

        /// only this team id
        #[arg(long)]
        team: Option<u64>,
    },
    /// Report how strongly each metric separates the clustered roles
    ValidateRoles {
        #[command(flatten)]
        inputs: Inputs,

        /// optional JSON dump of the clusters and separation statistics
        #[arg(long)]
        out: Option<PathBuf>,

        /// metrics shown per position
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[derive(Debug, Args)]
struct Inputs {
    /// event CSV
    #[arg(long)]
    events: PathBuf,

    /// match-result CSV
    #[arg(long)]
    results: PathBuf,
}

impl Inputs {
    fn load(&self) -> Result<(EventTable, MatchResults)> {
        let table = EventTable::from_path(&self.events)?;
        let results = MatchResults::from_path(&self.results)?;
        info!(
            events = table.len(),
            matches = results.len(),
            "loaded inputs"
        );
        Ok((table, results))
    }
}

#[derive(Debug, Serialize)]
struct RankingsReport<'a> {
    #[serde(flatten)]
    rankings: &'a Rankings,
    teams: Vec<TeamRoster>,
}

#[derive(Debug, Serialize)]
struct SeparationReport<'a> {
    positions: &'a [PositionClusters],
}

#[derive(Debug, Serialize)]
struct CombinationsReport<'a> {
    teams: &'a [TeamCombinations],
}

#[derive(Debug, Serialize)]
struct ImprovementsReport {
    players: Vec<PlayerImprovement>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    role_scout::init_tracing();

    let cli = Cli::parse();
    debug!("args: {cli:?}");
    let cfg = AnalysisConfig::load(cli.config.as_deref())?;
    let start_time = Instant::now();

    match cli.command {
        Command::DefineRoles {
            inputs,
            out,
            markdown,
        } => run_define_roles(&inputs, &out, markdown.as_deref(), &cfg)?,
        Command::Rank {
            inputs,
            templates,
            out,
            markdown,
            xlsx,
            improvements,
        } => run_rank(
            &inputs,
            &templates,
            &out,
            markdown.as_deref(),
            xlsx.as_deref(),
            improvements.as_deref(),
            &cfg,
        )?,
        Command::Teams {
            inputs,
            templates,
            out,
        } => run_teams(&inputs, &templates, &out, &cfg)?,
        Command::Combinations {
            inputs,
            templates,
            out,
            markdown,
            team,
        } => run_combinations(&inputs, &templates, &out, markdown.as_deref(), team, &cfg)?,
        Command::ValidateRoles { inputs, out, top } => {
            run_validate_roles(&inputs, out.as_deref(), top, &cfg)?
        }
    }

    println!("Done in {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_define_roles(
    inputs: &Inputs,
    out: &Path,
    markdown: Option<&Path>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let (table, results) = inputs.load()?;
    let definition = define_roles(&table, &results, cfg);
    definition.templates.save(out)?;
    if let Some(path) = markdown {
        write_text(path, &roles_markdown(&definition.templates, &definition.clusters))?;
    }

    println!("Role templates written to {}", out.display());
    for (position, roles) in definition.templates.positions() {
        let names: Vec<&str> = roles.keys().map(String::as_str).collect();
        println!(" - {position}: {}", names.join(", "));
    }
    Ok(())
}

/// Templates first so a missing artifact aborts before any input is read.
fn ranked(
    inputs: &Inputs,
    templates_path: &Path,
    cfg: &AnalysisConfig,
) -> Result<(RoleTemplates, Vec<PlayerSample>, Rankings)> {
    let templates = RoleTemplates::load(templates_path)?;
    let (table, results) = inputs.load()?;
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    let rankings = rank_players(&samples, &templates, cfg);
    Ok((templates, samples, rankings))
}

fn run_rank(
    inputs: &Inputs,
    templates_path: &Path,
    out: &Path,
    markdown: Option<&Path>,
    xlsx: Option<&Path>,
    improvements: Option<&Path>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let (templates, samples, rankings) = ranked(inputs, templates_path, cfg)?;
    let best = best_elevens(&rankings.assignments);

    write_json(
        out,
        &Envelope::new(RankingsReport {
            rankings: &rankings,
            teams: team_rosters(&rankings),
        }),
    )
    .with_context(|| format!("write rankings to {}", out.display()))?;
    if let Some(path) = markdown {
        write_text(path, &rankings_markdown(&rankings, &best))?;
    }
    if let Some(path) = xlsx {
        let report = export_rankings(path, &rankings, &best)?;
        println!(
            "Workbook {}: {} ranking rows, {} assignments",
            path.display(),
            report.ranking_rows,
            report.assignment_rows
        );
    }
    if let Some(path) = improvements {
        let by_id: BTreeMap<u64, &PlayerSample> =
            samples.iter().map(|s| (s.player_id(), s)).collect();
        let players: Vec<PlayerImprovement> = rankings
            .assignments
            .iter()
            .filter_map(|a| improvement_plan(a, &rankings, &by_id, &templates, &cfg.ranking))
            .collect();
        write_json(path, &Envelope::new(ImprovementsReport { players }))?;
    }

    println!("Rankings written to {}", out.display());
    println!("Roles ranked: {}", rankings.roles.len());
    println!("Players assigned: {}", rankings.assignments.len());
    for (key, ranking) in &rankings.roles {
        if let Some(top) = ranking.players.first() {
            println!(
                " - {key}: {} ({}) {:.1}",
                top.player_name, top.team_name, top.fit.final_score
            );
        }
    }
    Ok(())
}

fn run_teams(
    inputs: &Inputs,
    templates_path: &Path,
    out: &Path,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let (_, _, rankings) = ranked(inputs, templates_path, cfg)?;
    let teams = analyze_all_teams(&rankings.assignments, &cfg.ranking);
    let best = best_elevens(&rankings.assignments);
    write_json(
        out,
        &Envelope::new(TeamReport {
            teams: &teams,
            best_11: &best,
        }),
    )?;

    println!("Team analysis written to {}", out.display());
    for team in &teams {
        println!(
            " - {}: {} quality gaps, {} recommendations",
            team.team_name,
            team.weaknesses.quality_gaps.len(),
            team.recommendations.len()
        );
    }
    Ok(())
}

fn run_combinations(
    inputs: &Inputs,
    templates_path: &Path,
    out: &Path,
    markdown: Option<&Path>,
    team: Option<u64>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let templates = RoleTemplates::load(templates_path)?;
    let (table, results) = inputs.load()?;
    let samples = build_samples(&table, &results, &cfg.profile, ProfileGrade::Ranking);
    let rankings = rank_players(&samples, &templates, cfg);
    let teams = analyze_combinations(&table, &results, &rankings.assignments, team, cfg);
    if let Some(id) = team
        && teams.is_empty()
    {
        anyhow::bail!("team {id} has no events in {}", inputs.events.display());
    }

    write_json(out, &Envelope::new(CombinationsReport { teams: &teams }))?;
    if let Some(path) = markdown {
        write_text(path, &combinations_markdown(&teams))?;
    }

    println!("Combination analysis written to {}", out.display());
    for t in &teams {
        let (passes, links) = t
            .pass_network
            .as_ref()
            .map_or((0, 0), |n| (n.total_passes, n.links.len()));
        println!(
            " - {}: {passes} passes, {links} links, {} role pairs, {} synergy pairs",
            t.team_name,
            t.role_pairs.len(),
            t.synergies.len()
        );
    }
    Ok(())
}

fn run_validate_roles(
    inputs: &Inputs,
    out: Option<&Path>,
    top: usize,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let (table, results) = inputs.load()?;
    let definition = define_roles(&table, &results, cfg);
    if let Some(path) = out {
        write_json(
            path,
            &Envelope::new(SeparationReport {
                positions: &definition.clusters,
            }),
        )?;
    }

    for position in &definition.clusters {
        println!(
            "{} (k={}, {} players)",
            position.position, position.k, position.population
        );
        if position.separation.is_empty() {
            println!("   single role, nothing to separate");
            continue;
        }
        let mut by_effect: Vec<_> = position.separation.iter().collect();
        by_effect.sort_by(|a, b| b.eta_squared.total_cmp(&a.eta_squared));
        for s in by_effect.into_iter().take(top) {
            let f = s
                .f_statistic
                .map(|f| format!("{f:.2}"))
                .unwrap_or_else(|| "n/a".to_string());
            println!("   {:<32} eta²={:.3} F={f}", s.metric.name(), s.eta_squared);
        }
    }
    Ok(())
}
