use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::corrections::CorrectionRegistry;
use crate::error::DatasetResult;
use crate::records::{GENERATED_COLUMNS, GameweekRecord, ParsedSnapshot, parse_snapshot};
use crate::source::{Projection, SourceLoader};
use crate::teams::{PlayerReference, TeamReference, TeamResolver};

/// Row counts dropped or merged while compiling a season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub raw_rows: usize,
    pub blank_rows: usize,
    pub unresolved_rows: usize,
    pub merged_fixtures: usize,
}

#[derive(Debug, Clone)]
pub struct SeasonTable {
    pub season: String,
    pub records: Vec<GameweekRecord>,
    pub stats: CompileStats,
}

pub struct SeasonCompiler<'a> {
    loader: &'a SourceLoader,
    sources: &'a SourceConfig,
    corrections: &'a CorrectionRegistry,
    rounds: u32,
    parallelism: usize,
}

impl<'a> SeasonCompiler<'a> {
    pub fn new(
        loader: &'a SourceLoader,
        sources: &'a SourceConfig,
        corrections: &'a CorrectionRegistry,
        rounds: u32,
    ) -> Self {
        Self {
            loader,
            sources,
            corrections,
            rounds,
            parallelism: 1,
        }
    }

    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = threads.max(1);
        self
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Loads every gameweek of `season`, corrects irregular numbering and
    /// enriches each row with team, position and opponent data.
    pub fn compile(&self, season: &str) -> DatasetResult<SeasonTable> {
        info!(season, "gathering stats for season");
        let rounds: Vec<u32> = (1..=self.rounds).collect();
        let snapshots = with_fetch_pool(self.parallelism, || {
            rounds
                .par_iter()
                .map(|round| self.load_gameweek(season, *round))
                .collect::<DatasetResult<Vec<_>>>()
        })?;

        let mut stats = CompileStats::default();
        let raw = snapshots
            .into_iter()
            .fold(Vec::new(), |mut acc: Vec<GameweekRecord>, snapshot| {
                stats.blank_rows += snapshot.blank_rows;
                acc.extend(snapshot.records);
                acc
            });
        stats.raw_rows = raw.len();

        let corrected = self.corrections.correct(raw, season);

        let resolver = TeamResolver::new(self.loader, self.sources);
        let teams = resolver.resolve(season)?;
        let players = resolver.resolve_players(season, &teams)?;
        let (enriched, unresolved) = enrich(corrected, &teams, &players);
        stats.unresolved_rows = unresolved;

        let (mut records, merged) = merge_double_gameweeks(enriched);
        stats.merged_fixtures = merged;
        attach_next_gameweek_points(&mut records);

        if stats.blank_rows > 0 {
            warn!(season, rows = stats.blank_rows, "rows with blank key cells skipped");
        }
        if unresolved > 0 {
            warn!(season, rows = unresolved, "rows without a resolvable player dropped");
        }
        if merged > 0 {
            info!(season, rows = merged, "double gameweek fixtures consolidated");
        }
        info!(season, rows = records.len(), "season compiled");

        Ok(SeasonTable {
            season: season.to_string(),
            records,
            stats,
        })
    }

    fn load_gameweek(&self, season: &str, round: u32) -> DatasetResult<ParsedSnapshot> {
        let source_round = self.corrections.source_round(season, round);
        let resource = self.sources.gameweek(season, source_round);
        debug!(season, round, source_round, resource = %resource, "loading gameweek");
        let table = self
            .loader
            .load(&resource, &Projection::exclude(&GENERATED_COLUMNS))?;
        parse_snapshot(&table, season)
    }
}

/// Attaches team, position, opponent name and fixture difficulty. Rows whose
/// player is absent from the player reference are dropped and counted.
fn enrich(
    records: Vec<GameweekRecord>,
    teams: &TeamReference,
    players: &PlayerReference,
) -> (Vec<GameweekRecord>, usize) {
    let mut dropped = 0usize;
    let mut out = Vec::with_capacity(records.len());
    for mut rec in records {
        let Some(player) = players.get(rec.element) else {
            dropped += 1;
            continue;
        };
        rec.team = Some(player.team.clone());
        rec.position = Some(player.position);
        rec.opponent_team = teams.name(rec.opponent_team_id).map(str::to_string);
        rec.fixture_difficulty = teams.difficulty(rec.opponent_team_id);
        out.push(rec);
    }
    (out, dropped)
}

/// Collapses multiple fixtures of one player in one gameweek into the first
/// row seen, keeping encounter order.
pub fn merge_double_gameweeks(records: Vec<GameweekRecord>) -> (Vec<GameweekRecord>, usize) {
    let mut index: HashMap<(u32, u32), usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<GameweekRecord> = Vec::with_capacity(records.len());
    let mut merged = 0usize;
    for rec in records {
        let key = (rec.element, rec.round);
        match index.get(&key).copied() {
            Some(pos) => {
                out[pos].absorb_fixture(&rec);
                merged += 1;
            }
            None => {
                index.insert(key, out.len());
                out.push(rec);
            }
        }
    }
    (out, merged)
}

pub fn attach_next_gameweek_points(records: &mut [GameweekRecord]) {
    let points: HashMap<(u32, u32), i64> = records
        .iter()
        .map(|rec| ((rec.element, rec.round), rec.total_points))
        .collect();
    for rec in records.iter_mut() {
        rec.next_gw_points = points.get(&(rec.element, rec.round + 1)).copied();
    }
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
