use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::eligibility;
use crate::error::DatasetResult;
use crate::export;
use crate::formations::{self, FormationCatalog, FormationRow};
use crate::season::SeasonCompiler;
use crate::source::SourceLoader;

/// Which outputs a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub season_tables: bool,
    pub formations: bool,
}

impl RunOptions {
    pub fn all() -> Self {
        Self {
            season_tables: true,
            formations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub output_dir: PathBuf,
    pub seasons_total: usize,
    pub seasons_succeeded: usize,
    pub season_rows_written: usize,
    pub players_removed: usize,
    pub formation_rows: usize,
    pub season_files: Vec<PathBuf>,
    pub formation_file: Option<PathBuf>,
    pub errors: Vec<String>,
}

struct SeasonOutput {
    rows_written: usize,
    players_removed: usize,
    file: Option<PathBuf>,
    formation_rows: Vec<FormationRow>,
}

/// Runs every configured season. A failing season is reported in the
/// summary and the remaining seasons still run.
pub fn run(
    config: &PipelineConfig,
    loader: &SourceLoader,
    options: RunOptions,
) -> Result<RunSummary> {
    let started_at = Utc::now().to_rfc3339();
    let catalog = config
        .formation_catalog()
        .context("invalid formation catalog")?;
    let corrections = config.correction_registry();
    let compiler = SeasonCompiler::new(loader, &config.sources, &corrections, config.rounds)
        .with_parallelism(config.fetch_parallelism);

    let mut summary = RunSummary {
        started_at,
        finished_at: String::new(),
        output_dir: config.output_dir.clone(),
        seasons_total: config.seasons.len(),
        seasons_succeeded: 0,
        season_rows_written: 0,
        players_removed: 0,
        formation_rows: 0,
        season_files: Vec::new(),
        formation_file: None,
        errors: Vec::new(),
    };
    let mut formation_rows = Vec::new();

    for season in &config.seasons {
        match run_season(config, &compiler, &catalog, season, options) {
            Ok(output) => {
                summary.seasons_succeeded += 1;
                summary.season_rows_written += output.rows_written;
                summary.players_removed += output.players_removed;
                summary.season_files.extend(output.file);
                formation_rows.extend(output.formation_rows);
            }
            Err(err) => {
                warn!(season = %season, error = %err, "season failed");
                summary.errors.push(format!("season {season}: {err}"));
            }
        }
    }

    if options.formations && summary.seasons_succeeded > 0 {
        let path = export::formations_path(&config.output_dir);
        summary.formation_rows = export::write_formation_table(&path, &formation_rows)
            .context("write formation dataset")?;
        info!(path = %path.display(), rows = summary.formation_rows, "formation dataset written");
        summary.formation_file = Some(path);
    }

    summary.finished_at = Utc::now().to_rfc3339();
    Ok(summary)
}

fn run_season(
    config: &PipelineConfig,
    compiler: &SeasonCompiler<'_>,
    catalog: &FormationCatalog,
    season: &str,
    options: RunOptions,
) -> DatasetResult<SeasonOutput> {
    let table = compiler.compile(season)?;

    let formation_rows = if options.formations {
        formations::score_season(season, &table.records, catalog, config.rounds)
    } else {
        Vec::new()
    };

    let mut output = SeasonOutput {
        rows_written: 0,
        players_removed: 0,
        file: None,
        formation_rows,
    };
    if !options.season_tables {
        return Ok(output);
    }

    let records = if config.clean {
        let filtered = eligibility::filter(table.records, &config.eligibility);
        info!(
            season = %season,
            removed_players = filtered.removed_players,
            removed_rows = filtered.removed_rows,
            "eligibility filter applied"
        );
        output.players_removed = filtered.removed_players;
        filtered.records
    } else {
        table.records
    };

    let path = export::season_path(&config.output_dir, season);
    output.rows_written = export::write_season_table(&path, &records, &config.season_columns)?;
    info!(season, path = %path.display(), rows = output.rows_written, "season table written");
    output.file = Some(path);
    Ok(output)
}

pub fn write_summary(path: &std::path::Path, summary: &RunSummary) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let json = serde_json::to_string_pretty(summary).context("serialize run summary")?;
    std::fs::write(path, json).with_context(|| format!("write run summary {}", path.display()))?;
    Ok(())
}
