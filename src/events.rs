use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;
use tracing::{debug, info};

use crate::error::RoleError;

pub const EVENT_REQUIRED_COLUMNS: [&str; 7] = [
    "game_id",
    "player_id",
    "team_id",
    "type_name",
    "result_name",
    "start_x",
    "start_y",
];

pub const MATCH_REQUIRED_COLUMNS: [&str; 5] = [
    "game_id",
    "home_team_id",
    "away_team_id",
    "home_score",
    "away_score",
];

pub const PASS: &str = "Pass";
pub const CARRY: &str = "Carry";
pub const SHOT: &str = "Shot";
pub const TACKLE: &str = "Tackle";
pub const CLEARANCE: &str = "Clearance";
pub const PASS_RECEIVED: &str = "Pass Received";

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub game_id: u64,
    pub player_id: Option<u64>,
    pub team_id: u64,
    pub type_name: String,
    pub result_name: Option<String>,
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: Option<f64>,
    pub end_y: Option<f64>,
    pub dx: Option<f64>,
    pub dy: Option<f64>,
    pub time_seconds: Option<f64>,
    pub action_id: Option<u64>,
    pub period_id: Option<u32>,
    pub player_name: Option<String>,
    pub team_name: Option<String>,
    pub main_position: Option<String>,
}

impl Event {
    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    pub fn is_successful(&self, success_result: &str) -> bool {
        self.result_name.as_deref() == Some(success_result)
    }

    /// End point, reconstructed from the displacement when the log omits it.
    pub fn end(&self) -> (f64, f64) {
        let end_x = self
            .end_x
            .unwrap_or_else(|| self.start_x + self.dx.unwrap_or(0.0));
        let end_y = self
            .end_y
            .unwrap_or_else(|| self.start_y + self.dy.unwrap_or(0.0));
        (end_x, end_y)
    }

    pub fn length(&self) -> f64 {
        let (end_x, end_y) = self.end();
        ((end_x - self.start_x).powi(2) + (end_y - self.start_y).powi(2)).sqrt()
    }

    pub fn moves_forward(&self) -> bool {
        self.end().1 > self.start_y
    }
}

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub player_id: u64,
    pub name: String,
    pub team_id: u64,
    pub team_name: String,
    pub position: Option<String>,
    pub event_count: usize,
    pub game_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EventTable {
    events: Vec<Event>,
}

impl EventTable {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open event log {}", path.display()))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        info!(
            path = %path.display(),
            events = table.events.len(),
            "loaded event log"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .with_context(|| format!("read header of {label}"))?
            .clone();
        let cols = ColumnIndex::new(&headers, label, &EVENT_REQUIRED_COLUMNS)?;

        let mut events = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let line = idx as u64 + 2;
            let record = record.with_context(|| format!("read {label} line {line}"))?;
            events.push(parse_event(&cols, &record, label, line)?);
        }
        Ok(Self { events })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events grouped per player; rows without a player id are team events and are dropped.
    pub fn player_events(&self) -> BTreeMap<u64, Vec<&Event>> {
        let mut out: BTreeMap<u64, Vec<&Event>> = BTreeMap::new();
        for event in &self.events {
            if let Some(player_id) = event.player_id {
                out.entry(player_id).or_default().push(event);
            }
        }
        out
    }

    pub fn team_names(&self) -> BTreeMap<u64, String> {
        let mut out = BTreeMap::new();
        for event in &self.events {
            if let Some(name) = event.team_name.as_deref() {
                out.entry(event.team_id).or_insert_with(|| name.to_string());
            }
        }
        out
    }

    pub fn player_directory(&self) -> BTreeMap<u64, PlayerInfo> {
        let team_names = self.team_names();
        self.player_events()
            .into_iter()
            .map(|(player_id, events)| {
                let info = describe_player(player_id, &events, &team_names);
                (player_id, info)
            })
            .collect()
    }
}

pub fn describe_player(
    player_id: u64,
    events: &[&Event],
    team_names: &BTreeMap<u64, String>,
) -> PlayerInfo {
    let team_id = most_common(events.iter().map(|e| e.team_id)).unwrap_or_default();
    let position = most_common(events.iter().filter_map(|e| e.main_position.clone()));
    let name = events
        .iter()
        .find_map(|e| e.player_name.clone())
        .unwrap_or_else(|| format!("Player {player_id}"));
    let team_name = team_names
        .get(&team_id)
        .cloned()
        .unwrap_or_else(|| format!("Team {team_id}"));
    let games: BTreeSet<u64> = events.iter().map(|e| e.game_id).collect();
    PlayerInfo {
        player_id,
        name,
        team_id,
        team_name,
        position,
        event_count: events.len(),
        game_count: games.len(),
    }
}

/// Most frequent value; ties go to the smallest value so the result is stable.
fn most_common<T: Ord + Clone>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub game_id: u64,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub home_score: i32,
    pub away_score: i32,
}

impl MatchResult {
    pub fn involves(&self, team_id: u64) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchResults {
    by_game: BTreeMap<u64, MatchResult>,
}

impl MatchResults {
    pub fn new(results: impl IntoIterator<Item = MatchResult>) -> Self {
        Self {
            by_game: results.into_iter().map(|r| (r.game_id, r)).collect(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open match results {}", path.display()))?;
        let results = Self::from_reader(file, &path.display().to_string())?;
        info!(path = %path.display(), games = results.len(), "loaded match results");
        Ok(results)
    }

    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .with_context(|| format!("read header of {label}"))?
            .clone();
        let cols = ColumnIndex::new(&headers, label, &MATCH_REQUIRED_COLUMNS)?;

        let mut by_game = BTreeMap::new();
        for (idx, record) in reader.records().enumerate() {
            let line = idx as u64 + 2;
            let record = record.with_context(|| format!("read {label} line {line}"))?;
            let row = RowReader {
                cols: &cols,
                record: &record,
                label,
                line,
            };
            let result = MatchResult {
                game_id: row.required_id("game_id")?,
                home_team_id: row.required_id("home_team_id")?,
                away_team_id: row.required_id("away_team_id")?,
                home_score: row.required_score("home_score")?,
                away_score: row.required_score("away_score")?,
            };
            if by_game.insert(result.game_id, result).is_some() {
                debug!(game_id = result.game_id, "duplicate match result row, keeping last");
            }
        }
        Ok(Self { by_game })
    }

    pub fn get(&self, game_id: u64) -> Option<&MatchResult> {
        self.by_game.get(&game_id)
    }

    pub fn team_games(&self, team_id: u64) -> impl Iterator<Item = &MatchResult> + '_ {
        self.by_game.values().filter(move |r| r.involves(team_id))
    }

    pub fn len(&self) -> usize {
        self.by_game.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_game.is_empty()
    }
}

struct ColumnIndex {
    by_name: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &StringRecord, label: &str, required: &[&str]) -> Result<Self, RoleError> {
        let by_name: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !by_name.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RoleError::MissingColumns {
                file: label.to_string(),
                columns: missing,
            });
        }
        Ok(Self { by_name })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}

struct RowReader<'a> {
    cols: &'a ColumnIndex,
    record: &'a StringRecord,
    label: &'a str,
    line: u64,
}

impl RowReader<'_> {
    /// First non-empty value among the named columns.
    fn raw(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| {
            let idx = self.cols.index_of(name)?;
            let value = self.record.get(idx)?.trim();
            (!value.is_empty() && !value.eq_ignore_ascii_case("nan")).then_some(value)
        })
    }

    fn malformed(&self, reason: String) -> RoleError {
        RoleError::MalformedRow {
            file: self.label.to_string(),
            line: self.line,
            reason,
        }
    }

    fn opt_f64(&self, name: &str) -> Result<Option<f64>, RoleError> {
        match self.raw(&[name]) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.malformed(format!("{name}: not a number: {raw:?}"))),
        }
    }

    fn required_f64(&self, name: &str) -> Result<f64, RoleError> {
        self.opt_f64(name)?
            .ok_or_else(|| self.malformed(format!("{name}: missing value")))
    }

    fn opt_id(&self, name: &str) -> Result<Option<u64>, RoleError> {
        match self.raw(&[name]) {
            None => Ok(None),
            Some(raw) => parse_id(raw)
                .map(Some)
                .ok_or_else(|| self.malformed(format!("{name}: not an id: {raw:?}"))),
        }
    }

    fn required_id(&self, name: &str) -> Result<u64, RoleError> {
        self.opt_id(name)?
            .ok_or_else(|| self.malformed(format!("{name}: missing value")))
    }

    fn required_score(&self, name: &str) -> Result<i32, RoleError> {
        let raw = self
            .raw(&[name])
            .ok_or_else(|| self.malformed(format!("{name}: missing value")))?;
        parse_id(raw)
            .and_then(|goals| i32::try_from(goals).ok())
            .ok_or_else(|| self.malformed(format!("{name}: not a goal count: {raw:?}")))
    }

    fn opt_string(&self, names: &[&str]) -> Option<String> {
        self.raw(names).map(ToString::to_string)
    }
}

fn parse_event(
    cols: &ColumnIndex,
    record: &StringRecord,
    label: &str,
    line: u64,
) -> Result<Event, RoleError> {
    let row = RowReader {
        cols,
        record,
        label,
        line,
    };
    Ok(Event {
        game_id: row.required_id("game_id")?,
        player_id: row.opt_id("player_id")?,
        team_id: row.required_id("team_id")?,
        type_name: row
            .opt_string(&["type_name"])
            .ok_or_else(|| row.malformed("type_name: missing value".to_string()))?,
        result_name: row.opt_string(&["result_name"]),
        start_x: row.required_f64("start_x")?,
        start_y: row.required_f64("start_y")?,
        end_x: row.opt_f64("end_x")?,
        end_y: row.opt_f64("end_y")?,
        dx: row.opt_f64("dx")?,
        dy: row.opt_f64("dy")?,
        time_seconds: row.opt_f64("time_seconds")?,
        action_id: row.opt_id("action_id")?,
        period_id: row.opt_id("period_id")?.map(|p| p as u32),
        player_name: row.opt_string(&["player_name_ko", "player_name"]),
        team_name: row.opt_string(&["team_name_ko", "team_name"]),
        main_position: row.opt_string(&["main_position"]),
    })
}

/// Ids sometimes come through as floats ("123.0") after a pandas round trip.
pub fn parse_id(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
        Some(v as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS_CSV: &str = "\
game_id,player_id,team_id,type_name,result_name,start_x,start_y,end_x,end_y,dx,dy,main_position,player_name_ko,team_name_ko
1,10.0,100,Pass,Successful,50,20,50,45,0,25,CM,Kim,Alpha
1,,100,Pass,Successful,50,20,50,45,0,25,,,Alpha
2,10,100,Carry,,40,30,,,5,0,CM,Kim,Alpha
";

    #[test]
    fn parse_id_accepts_float_ids() {
        assert_eq!(parse_id("123"), Some(123));
        assert_eq!(parse_id("123.0"), Some(123));
        assert_eq!(parse_id("12.5"), None);
        assert_eq!(parse_id("-1"), None);
    }

    #[test]
    fn team_rows_are_not_player_events() {
        let table = EventTable::from_reader(EVENTS_CSV.as_bytes(), "events").unwrap();
        assert_eq!(table.len(), 3);
        let by_player = table.player_events();
        assert_eq!(by_player.len(), 1);
        assert_eq!(by_player[&10].len(), 2);
    }

    #[test]
    fn end_point_falls_back_to_displacement() {
        let table = EventTable::from_reader(EVENTS_CSV.as_bytes(), "events").unwrap();
        let carry = &table.events()[2];
        assert_eq!(carry.end(), (45.0, 30.0));
        assert!((carry.length() - 5.0).abs() < 1e-12);
        assert!(!carry.moves_forward());
    }

    #[test]
    fn directory_describes_player() {
        let table = EventTable::from_reader(EVENTS_CSV.as_bytes(), "events").unwrap();
        let dir = table.player_directory();
        let info = &dir[&10];
        assert_eq!(info.name, "Kim");
        assert_eq!(info.team_name, "Alpha");
        assert_eq!(info.position.as_deref(), Some("CM"));
        assert_eq!(info.game_count, 2);
    }

    #[test]
    fn empty_localized_name_falls_back() {
        let csv = "\
game_id,player_id,team_id,type_name,result_name,start_x,start_y,player_name,player_name_ko
1,7,1,Pass,Successful,50,20,Kim Jin,
";
        let table = EventTable::from_reader(csv.as_bytes(), "events").unwrap();
        assert_eq!(table.events()[0].player_name.as_deref(), Some("Kim Jin"));
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = EventTable::from_reader("game_id,team_id\n1,2\n".as_bytes(), "events")
            .unwrap_err();
        let err = err.downcast::<RoleError>().unwrap();
        match err {
            RoleError::MissingColumns { columns, .. } => {
                assert!(columns.contains(&"player_id".to_string()));
                assert!(columns.contains(&"start_y".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn match_results_index_team_games() {
        let csv = "\
game_id,home_team_id,away_team_id,home_score,away_score
1,100,200,2,1
2,300,100,0,0
3,300,200,1,1
";
        let results = MatchResults::from_reader(csv.as_bytes(), "matches").unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.team_games(100).count(), 2);
        assert_eq!(results.get(1).unwrap().home_score, 2);
    }

    #[test]
    fn scores_must_be_whole_goal_counts() {
        let header = "game_id,home_team_id,away_team_id,home_score,away_score\n";
        let ok = format!("{header}1,100,200,2.0,1\n");
        let results = MatchResults::from_reader(ok.as_bytes(), "matches").unwrap();
        assert_eq!(results.get(1).unwrap().home_score, 2);

        for bad in ["2.7", "nan", "99999999999", "-1"] {
            let csv = format!("{header}1,100,200,{bad},1\n");
            let err = MatchResults::from_reader(csv.as_bytes(), "matches").unwrap_err();
            match err.downcast::<RoleError>().unwrap() {
                RoleError::MalformedRow { line, reason, .. } => {
                    assert_eq!(line, 2);
                    assert!(reason.contains("home_score"), "{reason}");
                }
                other => panic!("unexpected error {other:?} for {bad}"),
            }
        }
    }
}
