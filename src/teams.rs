use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::records::{Position, parse_int};
use crate::source::{Projection, SourceLoader, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct TeamEntry {
    pub name: String,
    pub difficulty: Option<f64>,
}

/// Team id → name/difficulty for a single season. Team ids are season-local.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamReference {
    season: String,
    teams: BTreeMap<u32, TeamEntry>,
}

impl TeamReference {
    pub fn season(&self) -> &str {
        &self.season
    }

    pub fn get(&self, team_id: u32) -> Option<&TeamEntry> {
        self.teams.get(&team_id)
    }

    pub fn name(&self, team_id: u32) -> Option<&str> {
        self.get(team_id).map(|t| t.name.as_str())
    }

    pub fn difficulty(&self, team_id: u32) -> Option<f64> {
        self.get(team_id).and_then(|t| t.difficulty)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn has_difficulty(&self) -> bool {
        self.teams.values().any(|t| t.difficulty.is_some())
    }

    pub fn from_table(
        season: &str,
        table: &Table,
        difficulty_column: Option<&str>,
    ) -> DatasetResult<Self> {
        let id_col = table.require_column("id")?;
        let name_col = table.require_column("name")?;
        let difficulty_col = match difficulty_column {
            Some(column) => Some(table.require_column(column)?),
            None => None,
        };

        let mut teams = BTreeMap::new();
        for (idx, row) in table.rows().iter().enumerate() {
            let team_id = parse_id(table, idx, "id", &row[id_col])?;
            let difficulty = match difficulty_col {
                Some(col) if !row[col].is_empty() => Some(row[col].parse::<f64>().map_err(
                    |_| DatasetError::InvalidValue {
                        resource: table.resource().to_string(),
                        column: difficulty_column.unwrap_or_default().to_string(),
                        row: idx + 1,
                        value: row[col].clone(),
                    },
                )?),
                _ => None,
            };
            let entry = TeamEntry {
                name: row[name_col].clone(),
                difficulty,
            };
            if teams.insert(team_id, entry).is_some() {
                return Err(DatasetError::AmbiguousTeamId {
                    season: season.to_string(),
                    team_id,
                });
            }
        }

        Ok(Self {
            season: season.to_string(),
            teams,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub team: String,
    pub position: Position,
}

/// Player id → (team name, position) for one season.
#[derive(Debug, Clone, Default)]
pub struct PlayerReference {
    players: HashMap<u32, PlayerEntry>,
    unresolved: usize,
}

impl PlayerReference {
    pub fn get(&self, element: u32) -> Option<&PlayerEntry> {
        self.players.get(&element)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players listed in the reference whose team or position could not be
    /// resolved.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    pub fn from_table(table: &Table, teams: &TeamReference) -> DatasetResult<Self> {
        let id_col = table.require_column("id")?;
        let team_col = table.require_column("team")?;
        let type_col = table.require_column("element_type")?;

        let mut out = Self::default();
        // the first row of an id wins, resolvable or not
        let mut seen = HashSet::new();
        for (idx, row) in table.rows().iter().enumerate() {
            let element = parse_id(table, idx, "id", &row[id_col])?;
            if !seen.insert(element) {
                continue;
            }
            let team_id = parse_id(table, idx, "team", &row[team_col])?;
            let element_type = parse_id(table, idx, "element_type", &row[type_col])?;
            let (Some(team), Some(position)) = (
                teams.name(team_id),
                Position::from_element_type(element_type),
            ) else {
                out.unresolved += 1;
                continue;
            };
            out.players.insert(
                element,
                PlayerEntry {
                    team: team.to_string(),
                    position,
                },
            );
        }
        Ok(out)
    }
}

fn parse_id(table: &Table, idx: usize, column: &str, raw: &str) -> DatasetResult<u32> {
    if raw.is_empty() {
        return Err(DatasetError::InvalidValue {
            resource: table.resource().to_string(),
            column: column.to_string(),
            row: idx + 1,
            value: String::new(),
        });
    }
    parse_int(raw)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DatasetError::InvalidValue {
            resource: table.resource().to_string(),
            column: column.to_string(),
            row: idx + 1,
            value: raw.to_string(),
        })
}

/// Loads the per-season team and player references.
pub struct TeamResolver<'a> {
    loader: &'a SourceLoader,
    sources: &'a SourceConfig,
}

impl<'a> TeamResolver<'a> {
    pub fn new(loader: &'a SourceLoader, sources: &'a SourceConfig) -> Self {
        Self { loader, sources }
    }

    /// Builds the team reference for `season`. Seasons whose team resource
    /// lacks the difficulty column fall back to names only.
    pub fn resolve(&self, season: &str) -> DatasetResult<TeamReference> {
        let resource = self.sources.teams(season);
        let difficulty = self.sources.team_difficulty_column.as_str();

        let full = Projection::include(&["id", "name", difficulty]);
        let reference = match self.loader.load(&resource, &full) {
            Ok(table) => TeamReference::from_table(season, &table, Some(difficulty))?,
            Err(DatasetError::SchemaMismatch { column, .. }) if column == difficulty => {
                warn!(season, column = %column, "team reference has no difficulty data");
                let table = self
                    .loader
                    .load(&resource, &Projection::include(&["id", "name"]))?;
                TeamReference::from_table(season, &table, None)?
            }
            Err(err) => return Err(err),
        };
        info!(season, teams = reference.len(), "team reference resolved");
        Ok(reference)
    }

    pub fn resolve_players(
        &self,
        season: &str,
        teams: &TeamReference,
    ) -> DatasetResult<PlayerReference> {
        let resource = self.sources.players(season);
        let table = self.loader.load(
            &resource,
            &Projection::include(&["id", "team", "element_type"]),
        )?;
        let players = PlayerReference::from_table(&table, teams)?;
        if players.unresolved() > 0 {
            warn!(
                season,
                unresolved = players.unresolved(),
                "players without a resolvable team or position"
            );
        }
        Ok(players)
    }
}
