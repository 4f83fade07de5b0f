use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::rankings::{Rankings, team_rosters};
use crate::team::BestEleven;

pub struct ExportReport {
    pub ranking_rows: usize,
    pub assignment_rows: usize,
    pub roster_rows: usize,
    pub best_eleven_rows: usize,
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Number(value as f64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::from(*n)).collect()
}

fn ranking_rows(rankings: &Rankings) -> Vec<Vec<Cell>> {
    let mut rows = vec![header(&[
        "role_key",
        "position",
        "role",
        "rank",
        "player_id",
        "player_name",
        "team_name",
        "games",
        "events",
        "final_score",
        "raw_score",
        "direction",
        "magnitude",
        "confidence",
        "games_bonus",
        "war_bonus",
        "win_rate_bonus",
        "war",
        "team_win_rate",
    ])];
    for (key, ranking) in &rankings.roles {
        for p in &ranking.players {
            rows.push(vec![
                key.as_str().into(),
                ranking.position.as_str().into(),
                ranking.role.as_str().into(),
                p.rank.into(),
                p.player_id.into(),
                p.player_name.as_str().into(),
                p.team_name.as_str().into(),
                p.games.into(),
                p.events.into(),
                p.fit.final_score.into(),
                p.fit.raw_score.into(),
                p.fit.direction.into(),
                p.fit.magnitude.into(),
                p.fit.confidence.into(),
                p.fit.games_bonus.into(),
                p.fit.war_bonus.into(),
                p.fit.win_rate_bonus.into(),
                p.war.into(),
                p.team_win_rate.into(),
            ]);
        }
    }
    rows
}

fn assignment_rows(rankings: &Rankings) -> Vec<Vec<Cell>> {
    let mut rows = vec![header(&[
        "player_id",
        "player_name",
        "team_name",
        "position",
        "best_role",
        "final_score",
        "role_rank",
        "role_size",
        "games",
        "events",
    ])];
    for a in &rankings.assignments {
        rows.push(vec![
            a.player_id.into(),
            a.player_name.as_str().into(),
            a.team_name.as_str().into(),
            a.position.as_str().into(),
            a.best_role.as_str().into(),
            a.fit.final_score.into(),
            a.role_rank.into(),
            a.role_size.into(),
            a.games.into(),
            a.events.into(),
        ]);
    }
    rows
}

fn roster_rows(rankings: &Rankings) -> Vec<Vec<Cell>> {
    let mut rows = vec![header(&[
        "team_id",
        "team_name",
        "player_id",
        "player_name",
        "position",
        "best_role",
        "score",
    ])];
    for team in team_rosters(rankings) {
        for p in &team.players {
            rows.push(vec![
                team.team_id.into(),
                team.team_name.as_str().into(),
                p.player_id.into(),
                p.player_name.as_str().into(),
                p.position.as_str().into(),
                p.best_role.as_str().into(),
                p.score.into(),
            ]);
        }
    }
    rows
}

fn best_eleven_rows(best: &[BestEleven]) -> Vec<Vec<Cell>> {
    let mut rows = vec![header(&[
        "formation",
        "slot",
        "player_id",
        "player_name",
        "team_name",
        "position",
        "role",
        "fit_score",
    ])];
    for xi in best {
        for p in &xi.players {
            rows.push(vec![
                xi.formation.as_str().into(),
                p.slot.as_str().into(),
                p.player_id.into(),
                p.player_name.as_str().into(),
                p.team_name.as_str().into(),
                p.position.as_str().into(),
                p.role.as_str().into(),
                p.fit_score.into(),
            ]);
        }
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match cell {
                Cell::Text(value) => worksheet.write_string(r, c, value),
                Cell::Number(value) => worksheet.write_number(r, c, *value),
                Cell::Empty => continue,
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

/// Rankings, assignments, rosters and best XIs as one workbook.
pub fn export_rankings(
    path: &Path,
    rankings: &Rankings,
    best: &[BestEleven],
) -> Result<ExportReport> {
    let sheets = [
        ("Rankings", ranking_rows(rankings)),
        ("Assignments", assignment_rows(rankings)),
        ("Teams", roster_rows(rankings)),
        ("BestXI", best_eleven_rows(best)),
    ];

    let mut workbook = Workbook::new();
    for (name, rows) in &sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        write_rows(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        ranking_rows: sheets[0].1.len().saturating_sub(1),
        assignment_rows: sheets[1].1.len().saturating_sub(1),
        roster_rows: sheets[2].1.len().saturating_sub(1),
        best_eleven_rows: sheets[3].1.len().saturating_sub(1),
    })
}
