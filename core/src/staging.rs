//! Write-ahead staging of an indexing pass.
//!
//! ```text
//! EMPTY --stage/load--> STAGED --commit--> COMMITTING --ok--> COMMITTED --> EMPTY
//!                         ^  \                 |
//!                         |   discard -> EMPTY |
//!                         +------- failure ----+
//! ```
//!
//! The recovery record is written before the store is touched and only deleted once the store
//! has accepted the whole batch.

use crate::error::StagingError;
use crate::index::InvertedIndex;
use crate::persist::{
    delete_recovery_record, load_recovery_record, recovery_record_exists, save_recovery_record,
    StagingPaths,
};
use crate::store::{CommitReport, Store};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    Empty,
    Staged,
    Committing,
    Committed,
}

impl StagingState {
    fn allows(self, next: StagingState) -> bool {
        use StagingState::*;
        matches!(
            (self, next),
            (Empty, Staged)
                | (Staged, Committing)
                | (Staged, Empty)
                | (Committing, Committed)
                | (Committing, Staged)
                | (Committed, Empty)
        )
    }
}

pub struct StagingManager {
    paths: StagingPaths,
    state: StagingState,
    staged: Option<InvertedIndex>,
}

impl StagingManager {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { paths: StagingPaths::new(root), state: StagingState::Empty, staged: None }
    }

    pub fn state(&self) -> StagingState {
        self.state
    }

    pub fn paths(&self) -> &StagingPaths {
        &self.paths
    }

    /// Whether a recovery record from an earlier, uncommitted pass is on disk.
    pub fn has_record(&self) -> bool {
        recovery_record_exists(&self.paths)
    }

    pub fn staged(&self) -> Option<&InvertedIndex> {
        self.staged.as_ref()
    }

    fn transition(&mut self, next: StagingState) -> Result<(), StagingError> {
        if !self.state.allows(next) {
            return Err(StagingError::InvalidTransition { from: self.state, to: next });
        }
        self.state = next;
        Ok(())
    }

    /// Durably records `index` before anything is written to the store.
    pub fn stage(&mut self, index: InvertedIndex) -> Result<(), StagingError> {
        if !self.state.allows(StagingState::Staged) {
            return Err(StagingError::InvalidTransition {
                from: self.state,
                to: StagingState::Staged,
            });
        }
        save_recovery_record(&self.paths, &index)?;
        info!(
            sources = index.source_count(),
            documents = index.document_count(),
            terms = index.term_count(),
            "staged indexing pass"
        );
        self.staged = Some(index);
        self.transition(StagingState::Staged)
    }

    /// Reloads a recovery record left by an interrupted pass.
    pub fn load(&mut self) -> Result<&InvertedIndex, StagingError> {
        if !self.state.allows(StagingState::Staged) {
            return Err(StagingError::InvalidTransition {
                from: self.state,
                to: StagingState::Staged,
            });
        }
        let record = load_recovery_record(&self.paths)?;
        info!(
            created_at = %record.created_at,
            documents = record.index.document_count(),
            "loaded recovery record"
        );
        self.transition(StagingState::Staged)?;
        Ok(self.staged.insert(record.index))
    }

    /// Drops staged state and the recovery record. Also valid with nothing loaded, to throw away
    /// a record found at startup.
    pub fn discard(&mut self) -> Result<(), StagingError> {
        match self.state {
            StagingState::Staged => self.transition(StagingState::Empty)?,
            StagingState::Empty => {}
            other => {
                return Err(StagingError::InvalidTransition { from: other, to: StagingState::Empty })
            }
        }
        self.staged = None;
        if delete_recovery_record(&self.paths)? {
            info!(path = %self.paths.record().display(), "discarded recovery record");
        }
        Ok(())
    }

    /// Runs the bulk commit. On failure the staged state and the recovery record stay in place.
    pub fn commit(&mut self, store: &Store) -> Result<CommitReport, StagingError> {
        self.transition(StagingState::Committing)?;
        let outcome = match self.staged.as_ref() {
            Some(index) => store.commit(index),
            None => {
                self.state = StagingState::Staged;
                return Err(StagingError::MissingRecord(self.paths.record().display().to_string()));
            }
        };

        let report = match outcome {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, record = %self.paths.record().display(), "commit failed; recovery record kept");
                self.transition(StagingState::Staged)?;
                return Err(error.into());
            }
        };

        self.transition(StagingState::Committed)?;
        if let Err(error) = delete_recovery_record(&self.paths) {
            warn!(%error, "committed, but the recovery record could not be removed");
        }
        self.staged = None;
        self.transition(StagingState::Empty)?;
        Ok(report)
    }
}
