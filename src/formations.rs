//! Maximum achievable points per formation shape, per gameweek.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::records::{GameweekRecord, Position};
use crate::season::SeasonCompiler;

/// Outfield slots in every shape; the goalkeeper slot is implicit.
pub const OUTFIELD_PLAYERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormationShape {
    pub name: String,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl FormationShape {
    pub fn new(name: &str, defenders: usize, midfielders: usize, forwards: usize) -> Self {
        Self {
            name: name.to_string(),
            defenders,
            midfielders,
            forwards,
        }
    }

    pub fn required(&self, position: Position) -> usize {
        match position {
            Position::Goalkeeper => 1,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    pub fn outfield(&self) -> usize {
        self.defenders + self.midfielders + self.forwards
    }
}

pub fn default_shapes() -> Vec<FormationShape> {
    vec![
        FormationShape::new("3-4-3", 3, 4, 3),
        FormationShape::new("3-5-2", 3, 5, 2),
        FormationShape::new("4-3-3", 4, 3, 3),
        FormationShape::new("4-4-2", 4, 4, 2),
        FormationShape::new("4-5-1", 4, 5, 1),
        FormationShape::new("5-2-3", 5, 2, 3),
        FormationShape::new("5-3-2", 5, 3, 2),
        FormationShape::new("5-4-1", 5, 4, 1),
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("formation catalog is empty")]
    Empty,

    #[error("formation {name} has {total} outfield players, expected 10")]
    WrongOutfield { name: String, total: usize },

    #[error("formation {name} leaves a line empty")]
    EmptyLine { name: String },

    #[error("formation {0} declared twice")]
    DuplicateName(String),
}

/// Validated, ordered set of formation shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationCatalog {
    shapes: Vec<FormationShape>,
}

impl FormationCatalog {
    pub fn new(shapes: Vec<FormationShape>) -> Result<Self, CatalogError> {
        if shapes.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut names = HashSet::new();
        for shape in &shapes {
            if !names.insert(shape.name.as_str()) {
                return Err(CatalogError::DuplicateName(shape.name.clone()));
            }
            if shape.defenders == 0 || shape.midfielders == 0 || shape.forwards == 0 {
                return Err(CatalogError::EmptyLine {
                    name: shape.name.clone(),
                });
            }
            if shape.outfield() != OUTFIELD_PLAYERS {
                return Err(CatalogError::WrongOutfield {
                    name: shape.name.clone(),
                    total: shape.outfield(),
                });
            }
        }
        Ok(Self { shapes })
    }

    pub fn standard() -> Self {
        Self {
            shapes: default_shapes(),
        }
    }

    pub fn shapes(&self) -> &[FormationShape] {
        &self.shapes
    }

    /// Deepest single outfield line any shape requires. Keeping this many
    /// players per position is enough to score every shape.
    pub fn max_line_depth(&self) -> usize {
        self.shapes
            .iter()
            .map(|s| s.defenders.max(s.midfielders).max(s.forwards))
            .max()
            .unwrap_or(0)
    }
}

/// One player's points in one gameweek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPoints {
    pub element: u32,
    pub name: String,
    pub position: Position,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationScore {
    pub name: String,
    pub forwards: i64,
    pub midfielders: i64,
    pub defenders: i64,
    pub total_points: i64,
}

/// Output row of the formation dataset; field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormationRow {
    pub name: String,
    pub forwards: i64,
    pub midfielders: i64,
    pub defenders: i64,
    pub round: u32,
    pub total_points: i64,
    pub year: String,
}

impl FormationRow {
    fn from_score(score: FormationScore, round: u32, season: &str) -> Self {
        Self {
            name: score.name,
            forwards: score.forwards,
            midfielders: score.midfielders,
            defenders: score.defenders,
            round,
            total_points: score.total_points,
            year: season.to_string(),
        }
    }
}

/// Sum of the `n` highest point values at `position`. Fewer than `n`
/// players sums what is there. Equal values are interchangeable, so which
/// of several tied players fills the last slot is left unordered.
pub fn top_points(players: &[PlayerPoints], position: Position, n: usize) -> i64 {
    let mut points: Vec<i64> = players
        .iter()
        .filter(|p| p.position == position)
        .map(|p| p.points)
        .collect();
    points.sort_unstable_by(|a, b| b.cmp(a));
    points.into_iter().take(n).sum()
}

/// Scores every catalog shape for one gameweek, in catalog order.
pub fn score(players: &[PlayerPoints], catalog: &FormationCatalog) -> Vec<FormationScore> {
    catalog
        .shapes()
        .iter()
        .map(|shape| {
            let line = |position| top_points(players, position, shape.required(position));
            let forwards = line(Position::Forward);
            let midfielders = line(Position::Midfielder);
            let defenders = line(Position::Defender);
            FormationScore {
                name: shape.name.clone(),
                forwards,
                midfielders,
                defenders,
                total_points: forwards + midfielders + defenders,
            }
        })
        .collect()
}

/// Keeps the `depth` highest scorers of each position, grouped by position.
pub fn top_per_position(mut players: Vec<PlayerPoints>, depth: usize) -> Vec<PlayerPoints> {
    players.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| b.points.cmp(&a.points))
    });
    let mut out = Vec::new();
    let mut current: Option<Position> = None;
    let mut kept = 0usize;
    for player in players {
        if current != Some(player.position) {
            current = Some(player.position);
            kept = 0;
        }
        if kept < depth {
            out.push(player);
            kept += 1;
        }
    }
    out
}

/// Players of `round` with a resolved position.
pub fn gameweek_players(records: &[GameweekRecord], round: u32) -> Vec<PlayerPoints> {
    records
        .iter()
        .filter(|rec| rec.round == round)
        .filter_map(|rec| {
            Some(PlayerPoints {
                element: rec.element,
                name: rec.name.clone(),
                position: rec.position?,
                points: rec.total_points,
            })
        })
        .collect()
}

/// Scores every gameweek `1..=rounds` of an already compiled season.
pub fn score_season(
    season: &str,
    records: &[GameweekRecord],
    catalog: &FormationCatalog,
    rounds: u32,
) -> Vec<FormationRow> {
    let depth = catalog.max_line_depth();
    let mut rows = Vec::with_capacity(rounds as usize * catalog.shapes().len());
    for round in 1..=rounds {
        let players = top_per_position(gameweek_players(records, round), depth);
        rows.extend(
            score(&players, catalog)
                .into_iter()
                .map(|s| FormationRow::from_score(s, round, season)),
        );
    }
    rows
}

/// Formation rows for several seasons plus the seasons that failed.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub rows: Vec<FormationRow>,
    pub failures: Vec<(String, DatasetError)>,
}

pub struct FormationAggregator<'a> {
    compiler: &'a SeasonCompiler<'a>,
    catalog: &'a FormationCatalog,
}

impl<'a> FormationAggregator<'a> {
    pub fn new(compiler: &'a SeasonCompiler<'a>, catalog: &'a FormationCatalog) -> Self {
        Self { compiler, catalog }
    }

    pub fn aggregate(&self, season: &str) -> Result<Vec<FormationRow>, DatasetError> {
        info!(season, "gathering formation stats for season");
        let table = self.compiler.compile(season)?;
        Ok(score_season(
            season,
            &table.records,
            self.catalog,
            self.compiler.rounds(),
        ))
    }

    /// Aggregates seasons in the given order. A failing season is recorded
    /// and skipped.
    pub fn aggregate_seasons(&self, seasons: &[String]) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();
        for season in seasons {
            match self.aggregate(season) {
                Ok(rows) => outcome.rows.extend(rows),
                Err(err) => {
                    warn!(season = %season, error = %err, "formation aggregation failed");
                    outcome.failures.push((season.clone(), err));
                }
            }
        }
        outcome
    }
}
