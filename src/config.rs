// Pipeline configuration: TOML file with full defaults, environment overrides
// and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corrections::{Correction, CorrectionRegistry, CorrectionRule, POSTPONED_SEASON};
use crate::eligibility::EligibilityThresholds;
use crate::formations::{CatalogError, FormationCatalog, FormationShape, default_shapes};
use crate::records::{SEASON_COLUMNS, is_season_column};
use crate::source::Resource;

pub const DEFAULT_CONFIG_FILE: &str = "fpl_seasons.toml";
pub const RAW_DATASET_URL: &str =
    "https://raw.githubusercontent.com/vaastav/Fantasy-Premier-League/master/data";
pub const DEFAULT_SEASONS: [&str; 6] = [
    "2016-17", "2017-18", "2018-19", "2019-20", "2020-21", "2021-22",
];
/// Length of the league fixture calendar.
pub const SEASON_ROUNDS: u32 = 38;

const MAX_FETCH_PARALLELISM: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("invalid formation catalog: {0}")]
    Formations(#[from] CatalogError),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Resource locations. Templates may reference `{raw_base}`, `{season}` and
/// (gameweek only) `{round}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub raw_base: String,
    pub gameweek: String,
    pub players: String,
    pub teams: String,
    pub team_difficulty_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            raw_base: RAW_DATASET_URL.to_string(),
            gameweek: "{raw_base}/{season}/gws/gw{round}.csv".to_string(),
            players: "{raw_base}/{season}/players_raw.csv".to_string(),
            teams: "resources/teams/{season}_teams.csv".to_string(),
            team_difficulty_column: "strength".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn gameweek(&self, season: &str, round: u32) -> Resource {
        Resource::parse(&self.render(&self.gameweek, season, Some(round)))
    }

    pub fn players(&self, season: &str) -> Resource {
        Resource::parse(&self.render(&self.players, season, None))
    }

    pub fn teams(&self, season: &str) -> Resource {
        Resource::parse(&self.render(&self.teams, season, None))
    }

    fn render(&self, template: &str, season: &str, round: Option<u32>) -> String {
        let mut out = template
            .replace("{raw_base}", self.raw_base.trim_end_matches('/'))
            .replace("{season}", season);
        if let Some(round) = round {
            out = out.replace("{round}", &round.to_string());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub seasons: Vec<String>,
    pub rounds: u32,
    pub output_dir: PathBuf,
    /// Apply the eligibility filter before writing season tables.
    pub clean: bool,
    pub fetch_parallelism: usize,
    pub http_timeout_secs: u64,
    pub use_http_cache: bool,
    /// Serve cached bodies when a request fails at the transport level.
    pub offline_fallback: bool,
    pub season_columns: Vec<String>,
    pub sources: SourceConfig,
    pub eligibility: EligibilityThresholds,
    pub formations: Vec<FormationShape>,
    pub corrections: Vec<CorrectionRule>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: DEFAULT_SEASONS.iter().map(|s| s.to_string()).collect(),
            rounds: SEASON_ROUNDS,
            output_dir: PathBuf::from("resources"),
            clean: true,
            fetch_parallelism: 6,
            http_timeout_secs: 30,
            use_http_cache: true,
            offline_fallback: false,
            season_columns: SEASON_COLUMNS.iter().map(|c| c.to_string()).collect(),
            sources: SourceConfig::default(),
            eligibility: EligibilityThresholds::default(),
            formations: default_shapes(),
            corrections: vec![CorrectionRule {
                season: POSTPONED_SEASON.to_string(),
                correction: Correction::ShiftRounds {
                    after: 29,
                    offset: 9,
                },
            }],
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = non_empty(lookup("FPL_RAW_BASE_URL")) {
            self.sources.raw_base = base;
        }
        if let Some(dir) = non_empty(lookup("FPL_OUTPUT_DIR")) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty(lookup("FPL_SEASONS")) {
            let seasons = parse_season_list(&raw);
            if !seasons.is_empty() {
                self.seasons = seasons;
            }
        }
        if let Some(n) = lookup("FETCH_PARALLELISM").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.fetch_parallelism = n.clamp(1, MAX_FETCH_PARALLELISM);
        }
        if let Some(secs) = lookup("HTTP_TIMEOUT_SECS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.http_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seasons.is_empty() {
            return Err(ConfigError::invalid("seasons", "at least one season is required"));
        }
        for (idx, season) in self.seasons.iter().enumerate() {
            if season.trim().is_empty() {
                return Err(ConfigError::invalid("seasons", "season labels must be non-empty"));
            }
            if self.seasons[..idx].contains(season) {
                return Err(ConfigError::invalid(
                    "seasons",
                    format!("season {season} listed twice"),
                ));
            }
        }
        if self.rounds == 0 {
            return Err(ConfigError::invalid("rounds", "must be greater than zero"));
        }
        if self.fetch_parallelism == 0 || self.fetch_parallelism > MAX_FETCH_PARALLELISM {
            return Err(ConfigError::invalid(
                "fetch_parallelism",
                format!("must be within 1..={MAX_FETCH_PARALLELISM}"),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::invalid("http_timeout_secs", "must be greater than zero"));
        }
        if self.season_columns.is_empty() {
            return Err(ConfigError::invalid("season_columns", "no output columns"));
        }
        if let Some(unknown) = self.season_columns.iter().find(|c| !is_season_column(c)) {
            return Err(ConfigError::invalid(
                "season_columns",
                format!("unknown column `{unknown}`"),
            ));
        }
        if self.sources.team_difficulty_column.trim().is_empty() {
            return Err(ConfigError::invalid(
                "sources.team_difficulty_column",
                "must be non-empty",
            ));
        }
        if !self.sources.gameweek.contains("{round}") {
            return Err(ConfigError::invalid(
                "sources.gameweek",
                "template must contain {round}",
            ));
        }
        if self.eligibility.min_points < 0 || self.eligibility.min_minutes < 0 {
            return Err(ConfigError::invalid("eligibility", "thresholds must be non-negative"));
        }
        self.formation_catalog()?;
        Ok(())
    }

    pub fn formation_catalog(&self) -> Result<FormationCatalog, ConfigError> {
        Ok(FormationCatalog::new(self.formations.clone())?)
    }

    pub fn correction_registry(&self) -> CorrectionRegistry {
        CorrectionRegistry::from_rules(&self.corrections)
    }
}

/// Loads the config from `path`, or from `fpl_seasons.toml` in the working
/// directory when present, falling back to defaults. Environment overrides
/// are applied and the result validated.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                PipelineConfig::default()
            }
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    PipelineConfig::from_toml_str(&raw, path)
}

pub fn parse_season_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split([',', ';', ' ']) {
        let season = part.trim();
        if !season.is_empty() && !out.iter().any(|s| s == season) {
            out.push(season.to_string());
        }
    }
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
