use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scheme {0} has no dataset configurations")]
    EmptySelection(String),

    #[error("No datasets selected")]
    NoDatasetsSelected,

    #[error("Some dataset configurations do not exist or are duplicated (requested {requested}, found {found})")]
    PartialOrDuplicateSelection { requested: usize, found: usize },

    #[error("Tasks cannot be compared: {0}")]
    IncomparableTasks(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Engine exited with code {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".to_string()))]
    EngineExecutionFailed { exit_code: Option<i32> },

    #[error("No summary table found under {0}")]
    NoSummaryFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(feature = "database")]
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(err: csv::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
