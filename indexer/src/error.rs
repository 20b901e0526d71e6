use oncoseek_connectors::ConnectorError;
use oncoseek_core::{AccumulatorError, StagingError, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Failures that end an indexing run.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("recovery record from an interrupted pass found at {0}; rerun with a recovery mode (resume or discard)")]
    RecoveryPending(String),

    #[error("the pass harvested no documents; the live index was left untouched")]
    EmptyPass,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websites list line {line}: {details}")]
    InvalidWebsite { line: usize, details: String },
}

/// Why one source or one document produced nothing. Logged, never propagated.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),

    #[error("task aborted: {0}")]
    Aborted(String),
}
