use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty plan list, duplicate group names, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A column the engine cannot run without is absent from a source table.
    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// Window bounds are reversed.
    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
    /// CSV text could not be read into a table.
    #[error("table '{table}': {message}")]
    Csv { table: String, message: String },
}
