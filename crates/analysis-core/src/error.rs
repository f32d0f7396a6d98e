use std::time::Duration;
use thiserror::Error;

use crate::StatementKind;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Missing required {statement} field: {field}")]
    MissingField {
        statement: StatementKind,
        field: &'static str,
    },

    #[error("EBIT is {0}, ATFCF cannot be calculated")]
    NonPositiveEbit(f64),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Gave up after {0:?}")]
    Timeout(Duration),
}
