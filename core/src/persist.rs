use crate::error::StagingError;
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const RECOVERY_RECORD_VERSION: u32 = 1;

/// Durable snapshot of a staged-but-uncommitted pass.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub version: u32,
    pub created_at: String,
    pub index: InvertedIndex,
}

#[derive(Serialize)]
struct RecoveryRecordRef<'a> {
    version: u32,
    created_at: String,
    index: &'a InvertedIndex,
}

#[derive(Debug, Clone)]
pub struct StagingPaths {
    pub root: PathBuf,
}

impl StagingPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn record(&self) -> PathBuf { self.root.join("staged.bin") }
    fn partial(&self) -> PathBuf { self.root.join("staged.bin.partial") }
}

pub fn recovery_record_exists(paths: &StagingPaths) -> bool {
    paths.record().is_file()
}

/// Writes the record next to its final location, syncs it, then renames it into place so a
/// crash mid-write never leaves a truncated record behind.
pub fn save_recovery_record(paths: &StagingPaths, index: &InvertedIndex) -> Result<(), StagingError> {
    create_dir_all(&paths.root)?;
    let record = RecoveryRecordRef {
        version: RECOVERY_RECORD_VERSION,
        created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        index,
    };
    let bytes = bincode::serialize(&record)?;

    let partial = paths.partial();
    let mut f = File::create(&partial)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&partial, paths.record())?;
    tracing::debug!(path = %paths.record().display(), bytes = bytes.len(), "recovery record written");
    Ok(())
}

pub fn load_recovery_record(paths: &StagingPaths) -> Result<RecoveryRecord, StagingError> {
    let mut f = match File::open(paths.record()) {
        Ok(f) => f,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(StagingError::MissingRecord(paths.record().display().to_string()))
        }
        Err(error) => return Err(error.into()),
    };
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let record: RecoveryRecord = bincode::deserialize(&buf)?;
    if record.version != RECOVERY_RECORD_VERSION {
        return Err(StagingError::UnsupportedVersion {
            found: record.version,
            expected: RECOVERY_RECORD_VERSION,
        });
    }
    Ok(record)
}

/// Removes the record (and any half-written temp file). Returns whether a record existed.
pub fn delete_recovery_record(paths: &StagingPaths) -> Result<bool, StagingError> {
    remove_if_present(&paths.partial())?;
    remove_if_present(&paths.record())
}

fn remove_if_present(path: &Path) -> Result<bool, StagingError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentType, Source};
    use tempfile::tempdir;

    fn sample() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        let source = index.stage_source(Source::new("PubMed", "https://pubmed.ncbi.nlm.nih.gov/"));
        let key = index
            .stage_document(Document::new("t", "s", DocumentType::Paper, "https://p/1", source))
            .unwrap();
        index.record_term_frequency(key, "tumor", 3).unwrap();
        index
    }

    #[test]
    fn record_round_trips() {
        let dir = tempdir().unwrap();
        let paths = StagingPaths::new(dir.path().join("staging"));
        assert!(!recovery_record_exists(&paths));

        let index = sample();
        save_recovery_record(&paths, &index).unwrap();
        assert!(recovery_record_exists(&paths));

        let record = load_recovery_record(&paths).unwrap();
        assert_eq!(record.version, RECOVERY_RECORD_VERSION);
        assert_eq!(record.index, index);
        assert!(!record.created_at.is_empty());
    }

    #[test]
    fn delete_reports_presence() {
        let dir = tempdir().unwrap();
        let paths = StagingPaths::new(dir.path());
        assert!(!delete_recovery_record(&paths).unwrap());
        save_recovery_record(&paths, &sample()).unwrap();
        assert!(delete_recovery_record(&paths).unwrap());
        assert!(!recovery_record_exists(&paths));
    }

    #[test]
    fn missing_record_is_reported() {
        let dir = tempdir().unwrap();
        let paths = StagingPaths::new(dir.path());
        assert!(matches!(load_recovery_record(&paths), Err(StagingError::MissingRecord(_))));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let paths = StagingPaths::new(dir.path());
        let stale = RecoveryRecord { version: 99, created_at: String::new(), index: sample() };
        fs::write(paths.record(), bincode::serialize(&stale).unwrap()).unwrap();
        assert!(matches!(
            load_recovery_record(&paths),
            Err(StagingError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
