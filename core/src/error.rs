use crate::{DocKey, SourceKey};
use crate::staging::StagingState;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("no staged document with logical key {0}")]
    UnknownDocument(DocKey),

    #[error("no staged source with logical key {0}")]
    UnknownSource(SourceKey),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt value under {key}: {details}")]
    Corrupt { key: String, details: String },

    #[error("staged batch is inconsistent: {0}")]
    InconsistentBatch(String),

    #[error("document statistics are missing; run an indexing pass first")]
    MissingStatistics,
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("unsupported recovery record version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("illegal staging transition {from:?} -> {to:?}")]
    InvalidTransition { from: StagingState, to: StagingState },

    #[error("no recovery record at {0}")]
    MissingRecord(String),

    #[error("commit failed: {0}")]
    Store(#[from] StoreError),
}
