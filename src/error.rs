use thiserror::Error;

/// Failures raised while loading and compiling season data.
///
/// Data-quality reductions (unresolvable players, fringe players, short
/// positional pools) are not represented here; they are counted and logged.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("resource unavailable: {resource}: {reason}")]
    SourceUnavailable { resource: String, reason: String },

    #[error("column `{column}` missing from {resource}")]
    SchemaMismatch { resource: String, column: String },

    #[error("duplicate team id {team_id} in team reference for season {season}")]
    AmbiguousTeamId { season: String, team_id: u32 },

    #[error("invalid value `{value}` for column `{column}` in {resource} (row {row})")]
    InvalidValue {
        resource: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("malformed table {resource}: {reason}")]
    MalformedTable { resource: String, reason: String },

    #[error("include and exclude column lists are mutually exclusive")]
    InvalidProjection,

    #[error("failed to write {path}: {reason}")]
    Output { path: String, reason: String },
}

impl DatasetError {
    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_column(resource: impl Into<String>, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            resource: resource.into(),
            column: column.into(),
        }
    }

    pub fn output(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Output {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type DatasetResult<T> = Result<T, DatasetError>;
