use thiserror::Error;

/// Errors raised while building, solving or reading a network
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("No feasible dispatch exists for the network")]
    Infeasible,
    #[error("The objective has no finite minimum")]
    Unbounded,
    #[error("The network has not been solved")]
    NotSolved,
    #[error("Unknown component: {0}")]
    UnknownComponent(String),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn validation(desc: impl Into<String>) -> Self {
        Self::Validation(desc.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
