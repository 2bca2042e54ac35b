// error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a dashboard session from starting.
///
/// Malformed cells, unknown countries and empty selections are not errors;
/// they are recovered where they happen and never reach this type.
#[derive(Debug, Error)]
pub enum GreenbroError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv trouble in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("workbook trouble in {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("{0} has no sheets with data")]
    EmptyWorkbook(PathBuf),

    #[error("required columns missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("unsupported file type: {0} (expected .csv, .xls or .xlsx)")]
    UnsupportedFile(PathBuf),

    #[error("config is not valid JSON: {0}")]
    Config(#[from] serde_json::Error),

    #[error("country registry is unusable: {0}")]
    CountryRegistry(String),
}

pub type Result<T> = std::result::Result<T, GreenbroError>;

impl GreenbroError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GreenbroError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        GreenbroError::Csv {
            path: path.into(),
            source,
        }
    }
}
