use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Catalog is empty")]
    EmptyCatalog,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient data: need at least {needed} distinct records, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
