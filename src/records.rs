use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, DatasetResult};
use crate::source::Table;

/// Columns recomputed locally and never trusted from gameweek snapshots.
pub const GENERATED_COLUMNS: [&str; 2] = ["team", "position"];

/// Default column order of a compiled season table.
pub const SEASON_COLUMNS: [&str; 29] = [
    "element",
    "name",
    "round",
    "year",
    "value",
    "selected",
    "transfers_in",
    "transfers_out",
    "minutes",
    "goals_scored",
    "assists",
    "clean_sheets",
    "goals_conceded",
    "yellow_cards",
    "red_cards",
    "saves",
    "bonus",
    "bps",
    "influence",
    "creativity",
    "threat",
    "ict_index",
    "was_home",
    "opponent_team",
    "team",
    "position",
    "fixture_difficulty",
    "total_points",
    "next_gw_points",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Maps the raw `element_type` code of the player reference.
    pub fn from_element_type(code: u32) -> Option<Self> {
        match code {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        Position::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One player's performance in one gameweek of one season.
#[derive(Debug, Clone, PartialEq)]
pub struct GameweekRecord {
    pub element: u32,
    pub name: String,
    pub round: u32,
    pub year: String,
    pub value: i64,
    pub selected: i64,
    pub transfers_in: i64,
    pub transfers_out: i64,
    pub minutes: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub goals_conceded: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub saves: i64,
    pub bonus: i64,
    pub bps: i64,
    pub influence: f64,
    pub creativity: f64,
    pub threat: f64,
    pub ict_index: f64,
    pub was_home: bool,
    pub opponent_team_id: u32,
    pub total_points: i64,
    pub opponent_team: Option<String>,
    pub team: Option<String>,
    pub position: Option<Position>,
    pub fixture_difficulty: Option<f64>,
    pub next_gw_points: Option<i64>,
}

impl GameweekRecord {
    /// Renders one output cell. `None` means the column is unknown.
    pub fn cell(&self, column: &str) -> Option<String> {
        let out = match column {
            "element" => self.element.to_string(),
            "name" => self.name.clone(),
            "round" => self.round.to_string(),
            "year" => self.year.clone(),
            "value" => self.value.to_string(),
            "selected" => self.selected.to_string(),
            "transfers_in" => self.transfers_in.to_string(),
            "transfers_out" => self.transfers_out.to_string(),
            "minutes" => self.minutes.to_string(),
            "goals_scored" => self.goals_scored.to_string(),
            "assists" => self.assists.to_string(),
            "clean_sheets" => self.clean_sheets.to_string(),
            "goals_conceded" => self.goals_conceded.to_string(),
            "yellow_cards" => self.yellow_cards.to_string(),
            "red_cards" => self.red_cards.to_string(),
            "saves" => self.saves.to_string(),
            "bonus" => self.bonus.to_string(),
            "bps" => self.bps.to_string(),
            "influence" => self.influence.to_string(),
            "creativity" => self.creativity.to_string(),
            "threat" => self.threat.to_string(),
            "ict_index" => self.ict_index.to_string(),
            "was_home" => (if self.was_home { "True" } else { "False" }).to_string(),
            "opponent_team" => self.opponent_team.clone().unwrap_or_default(),
            "team" => self.team.clone().unwrap_or_default(),
            "position" => self.position.map(|p| p.code().to_string()).unwrap_or_default(),
            "fixture_difficulty" => self
                .fixture_difficulty
                .map(|d| d.to_string())
                .unwrap_or_default(),
            "total_points" => self.total_points.to_string(),
            "next_gw_points" => self
                .next_gw_points
                .map(|p| p.to_string())
                .unwrap_or_default(),
            _ => return None,
        };
        Some(out)
    }

    /// Folds a second fixture of the same gameweek into this record.
    /// Additive statistics are summed; snapshot and fixture fields keep the
    /// first fixture's values.
    pub fn absorb_fixture(&mut self, other: &GameweekRecord) {
        self.minutes += other.minutes;
        self.goals_scored += other.goals_scored;
        self.assists += other.assists;
        self.clean_sheets += other.clean_sheets;
        self.goals_conceded += other.goals_conceded;
        self.yellow_cards += other.yellow_cards;
        self.red_cards += other.red_cards;
        self.saves += other.saves;
        self.bonus += other.bonus;
        self.bps += other.bps;
        self.influence += other.influence;
        self.creativity += other.creativity;
        self.threat += other.threat;
        self.ict_index += other.ict_index;
        self.total_points += other.total_points;
    }
}

pub fn is_season_column(column: &str) -> bool {
    SEASON_COLUMNS.contains(&column)
}

/// Column positions of a gameweek snapshot, resolved once per table.
struct SnapshotColumns {
    element: usize,
    name: usize,
    round: usize,
    value: usize,
    selected: usize,
    transfers_in: usize,
    transfers_out: usize,
    minutes: usize,
    goals_scored: usize,
    assists: usize,
    clean_sheets: usize,
    goals_conceded: usize,
    yellow_cards: usize,
    red_cards: usize,
    saves: usize,
    bonus: usize,
    bps: usize,
    influence: usize,
    creativity: usize,
    threat: usize,
    ict_index: usize,
    was_home: usize,
    opponent_team: usize,
    total_points: usize,
}

impl SnapshotColumns {
    fn resolve(table: &Table) -> DatasetResult<Self> {
        Ok(Self {
            element: table.require_column("element")?,
            name: table.require_column("name")?,
            round: table.require_column("round")?,
            value: table.require_column("value")?,
            selected: table.require_column("selected")?,
            transfers_in: table.require_column("transfers_in")?,
            transfers_out: table.require_column("transfers_out")?,
            minutes: table.require_column("minutes")?,
            goals_scored: table.require_column("goals_scored")?,
            assists: table.require_column("assists")?,
            clean_sheets: table.require_column("clean_sheets")?,
            goals_conceded: table.require_column("goals_conceded")?,
            yellow_cards: table.require_column("yellow_cards")?,
            red_cards: table.require_column("red_cards")?,
            saves: table.require_column("saves")?,
            bonus: table.require_column("bonus")?,
            bps: table.require_column("bps")?,
            influence: table.require_column("influence")?,
            creativity: table.require_column("creativity")?,
            threat: table.require_column("threat")?,
            ict_index: table.require_column("ict_index")?,
            was_home: table.require_column("was_home")?,
            opponent_team: table.require_column("opponent_team")?,
            total_points: table.require_column("total_points")?,
        })
    }
}

/// Records parsed from one gameweek snapshot plus the number of rows
/// skipped because a required cell was blank.
#[derive(Debug, Clone, Default)]
pub struct ParsedSnapshot {
    pub records: Vec<GameweekRecord>,
    pub blank_rows: usize,
}

/// Parses a gameweek snapshot into records tagged with `season`.
pub fn parse_snapshot(table: &Table, season: &str) -> DatasetResult<ParsedSnapshot> {
    let cols = SnapshotColumns::resolve(table)?;
    let mut out = ParsedSnapshot::default();

    for (idx, row) in table.rows().iter().enumerate() {
        let cells = RowCells {
            table,
            row,
            row_no: idx + 1,
        };
        if cells.has_blank(&cols) {
            out.blank_rows += 1;
            continue;
        }
        out.records.push(GameweekRecord {
            element: cells.uint(cols.element, "element")?,
            name: row[cols.name].clone(),
            round: cells.uint(cols.round, "round")?,
            year: season.to_string(),
            value: cells.int(cols.value, "value")?,
            selected: cells.int(cols.selected, "selected")?,
            transfers_in: cells.int(cols.transfers_in, "transfers_in")?,
            transfers_out: cells.int(cols.transfers_out, "transfers_out")?,
            minutes: cells.int(cols.minutes, "minutes")?,
            goals_scored: cells.int(cols.goals_scored, "goals_scored")?,
            assists: cells.int(cols.assists, "assists")?,
            clean_sheets: cells.int(cols.clean_sheets, "clean_sheets")?,
            goals_conceded: cells.int(cols.goals_conceded, "goals_conceded")?,
            yellow_cards: cells.int(cols.yellow_cards, "yellow_cards")?,
            red_cards: cells.int(cols.red_cards, "red_cards")?,
            saves: cells.int(cols.saves, "saves")?,
            bonus: cells.int(cols.bonus, "bonus")?,
            bps: cells.int(cols.bps, "bps")?,
            influence: cells.float(cols.influence, "influence")?,
            creativity: cells.float(cols.creativity, "creativity")?,
            threat: cells.float(cols.threat, "threat")?,
            ict_index: cells.float(cols.ict_index, "ict_index")?,
            was_home: cells.boolean(cols.was_home, "was_home")?,
            opponent_team_id: cells.uint(cols.opponent_team, "opponent_team")?,
            total_points: cells.int(cols.total_points, "total_points")?,
            opponent_team: None,
            team: None,
            position: None,
            fixture_difficulty: None,
            next_gw_points: None,
        });
    }
    Ok(out)
}

struct RowCells<'a> {
    table: &'a Table,
    row: &'a [String],
    row_no: usize,
}

impl RowCells<'_> {
    fn has_blank(&self, cols: &SnapshotColumns) -> bool {
        [
            cols.element,
            cols.name,
            cols.round,
            cols.minutes,
            cols.was_home,
            cols.opponent_team,
            cols.total_points,
        ]
        .iter()
        .any(|idx| self.row[*idx].is_empty())
    }

    fn invalid(&self, column: &str, value: &str) -> DatasetError {
        DatasetError::InvalidValue {
            resource: self.table.resource().to_string(),
            column: column.to_string(),
            row: self.row_no,
            value: value.to_string(),
        }
    }

    fn int(&self, idx: usize, column: &str) -> DatasetResult<i64> {
        let raw = self.row[idx].as_str();
        parse_int(raw).ok_or_else(|| self.invalid(column, raw))
    }

    fn uint(&self, idx: usize, column: &str) -> DatasetResult<u32> {
        let raw = self.row[idx].as_str();
        parse_int(raw)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.invalid(column, raw))
    }

    fn float(&self, idx: usize, column: &str) -> DatasetResult<f64> {
        let raw = self.row[idx].as_str();
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(column, raw))
    }

    fn boolean(&self, idx: usize, column: &str) -> DatasetResult<bool> {
        let raw = self.row[idx].as_str();
        parse_bool(raw).ok_or_else(|| self.invalid(column, raw))
    }
}

/// Integer cells occasionally arrive as `55.0`; whole floats are accepted.
/// Blank optional cells count as zero.
pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
