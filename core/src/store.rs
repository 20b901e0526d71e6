//! Persistent store on top of sled.
//!
//! Relations live in per-generation trees (`gen-<n>.source`, `.document`, `.term`, `.appears`).
//! A commit fills a fresh generation and, inside one multi-tree transaction, switches the
//! active-generation pointer in `meta`, overwrites the document statistics and advances the row
//! id counters. Readers therefore see either the previous corpus or the new one in full.

use crate::error::StoreError;
use crate::index::InvertedIndex;
use crate::{DocumentRecord, DocumentStatistics, RowId, SourceRecord, TermRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info, warn};

const META_TREE: &str = "meta";
const ACTIVE_GENERATION: &[u8] = b"active_generation";
const LAST_SOURCE_ID: &[u8] = b"last_source_id";
const LAST_DOCUMENT_ID: &[u8] = b"last_document_id";
const STATISTICS: &[u8] = b"document_statistics";
const GENERATION_PREFIX: &str = "gen-";

#[derive(Debug, Clone, Copy)]
enum Relation {
    Source,
    Document,
    Term,
    Appears,
}

impl Relation {
    const ALL: [Relation; 4] = [Relation::Source, Relation::Document, Relation::Term, Relation::Appears];

    fn tree_name(self, generation: u64) -> String {
        let suffix = match self {
            Relation::Source => "source",
            Relation::Document => "document",
            Relation::Term => "term",
            Relation::Appears => "appears",
        };
        format!("{GENERATION_PREFIX}{generation:020}.{suffix}")
    }
}

struct Generation {
    sources: Tree,
    documents: Tree,
    terms: Tree,
    appears: Tree,
}

/// What a successful commit wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub generation: u64,
    /// Row id of staged source `k` is `source_offset + k`.
    pub source_offset: RowId,
    /// Row id of staged document `k` is `document_offset + k`.
    pub document_offset: RowId,
    pub sources: usize,
    pub documents: usize,
    pub terms: usize,
    pub postings: usize,
    pub statistics: DocumentStatistics,
}

pub struct Store {
    db: Db,
    meta: Tree,
}

impl Store {
    /// Opens (or creates) the store and drops generation trees left behind by an interrupted
    /// commit.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let meta = db.open_tree(META_TREE)?;
        let store = Self { db, meta };
        store.drop_stale_generations()?;
        Ok(store)
    }

    /// No-op read used as a liveness check during long passes.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.meta.get(ACTIVE_GENERATION)?;
        Ok(())
    }

    pub fn active_generation(&self) -> Result<Option<u64>, StoreError> {
        self.meta
            .get(ACTIVE_GENERATION)?
            .map(|bytes| decode_u64(ACTIVE_GENERATION, &bytes))
            .transpose()
    }

    fn generation(&self, number: u64) -> Result<Generation, StoreError> {
        Ok(Generation {
            sources: self.db.open_tree(Relation::Source.tree_name(number))?,
            documents: self.db.open_tree(Relation::Document.tree_name(number))?,
            terms: self.db.open_tree(Relation::Term.tree_name(number))?,
            appears: self.db.open_tree(Relation::Appears.tree_name(number))?,
        })
    }

    fn active(&self) -> Result<Option<Generation>, StoreError> {
        self.active_generation()?.map(|number| self.generation(number)).transpose()
    }

    fn drop_generation(&self, number: u64) -> Result<(), StoreError> {
        for relation in Relation::ALL {
            self.db.drop_tree(relation.tree_name(number))?;
        }
        Ok(())
    }

    fn drop_stale_generations(&self) -> Result<(), StoreError> {
        let active = self.active_generation()?;
        for name in self.db.tree_names() {
            let name = String::from_utf8_lossy(&name).into_owned();
            let Some(generation) = parse_generation(&name) else { continue };
            if Some(generation) != active {
                debug!(tree = %name, "dropping stale generation tree");
                self.db.drop_tree(name.as_bytes())?;
            }
        }
        Ok(())
    }

    pub fn statistics(&self) -> Result<Option<DocumentStatistics>, StoreError> {
        self.meta.get(STATISTICS)?.map(|bytes| decode(&bytes)).transpose()
    }

    /// All sources of the active generation, in row order.
    pub fn sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        match self.active()? {
            Some(generation) => decode_values(&generation.sources),
            None => Ok(Vec::new()),
        }
    }

    /// All documents of the active generation, in row (insertion) order.
    pub fn documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        match self.active()? {
            Some(generation) => decode_values(&generation.documents),
            None => Ok(Vec::new()),
        }
    }

    pub fn document(&self, id: RowId) -> Result<Option<DocumentRecord>, StoreError> {
        let Some(generation) = self.active()? else { return Ok(None) };
        generation.documents.get(id.to_be_bytes())?.map(|bytes| decode(&bytes)).transpose()
    }

    pub fn term(&self, term: &str) -> Result<Option<TermRecord>, StoreError> {
        let Some(generation) = self.active()? else { return Ok(None) };
        generation.terms.get(term.as_bytes())?.map(|bytes| decode(&bytes)).transpose()
    }

    /// (document id, frequency) for every document containing `term`, in row order.
    pub fn postings(&self, term: &str) -> Result<Vec<(RowId, u32)>, StoreError> {
        let Some(generation) = self.active()? else { return Ok(Vec::new()) };
        let prefix = appears_prefix(term);
        let mut postings = Vec::new();
        for entry in generation.appears.scan_prefix(&prefix) {
            let (key, value) = entry?;
            let id = decode_u64("appears key", &key[prefix.len()..])?;
            let frequency = decode_u32("appears value", &value)?;
            postings.push((id, frequency));
        }
        Ok(postings)
    }

    /// Writes the staged batch as a new generation, in order: sources, documents with their
    /// lengths, terms with df/idf, postings, statistics. Either all of it becomes visible or none.
    pub fn commit(&self, index: &InvertedIndex) -> Result<CommitReport, StoreError> {
        validate(index)?;

        let previous = self.active_generation()?;
        let number = previous.map_or(1, |g| g + 1);
        let next = self.generation(number)?;
        for tree in [&next.sources, &next.documents, &next.terms, &next.appears] {
            tree.clear()?;
        }

        let statistics = DocumentStatistics {
            document_count: index.document_count() as u64,
            average_document_length: index.average_document_length(),
        };
        let encoded_statistics = bincode::serialize(&statistics)?;
        let encoded_terms = index
            .postings
            .keys()
            .map(|term| {
                let record = TermRecord {
                    term: term.clone(),
                    document_frequency: index.document_frequency(term),
                    idf: index.inverse_document_frequency(term),
                };
                Ok((term.as_bytes().to_vec(), bincode::serialize(&record)?))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let (source_offset, document_offset) = (
            &next.sources,
            &next.documents,
            &next.terms,
            &next.appears,
            &self.meta,
        )
            .transaction(|(sources, documents, terms, appears, meta)| {
                let source_offset = match meta.get(LAST_SOURCE_ID)? {
                    Some(bytes) => decode_u64(LAST_SOURCE_ID, &bytes).map_err(abort)?,
                    None => 0,
                };
                let document_offset = match meta.get(LAST_DOCUMENT_ID)? {
                    Some(bytes) => decode_u64(LAST_DOCUMENT_ID, &bytes).map_err(abort)?,
                    None => 0,
                };

                for (position, source) in index.sources.iter().enumerate() {
                    let id = source_offset + position as u64 + 1;
                    let record = SourceRecord {
                        id,
                        name: source.name.clone(),
                        base_url: source.base_url.clone(),
                        icon: source.icon.clone(),
                    };
                    sources.insert(&id.to_be_bytes()[..], encode(&record)?)?;
                }

                for (position, (document, length)) in
                    index.documents.iter().zip(&index.lengths).enumerate()
                {
                    let id = document_offset + position as u64 + 1;
                    let record = DocumentRecord {
                        id,
                        title: document.title.clone(),
                        summary: document.summary.clone(),
                        doc_type: document.doc_type,
                        publish_date: document.publish_date,
                        url: document.url.clone(),
                        language: document.language.unwrap_or_default(),
                        source_id: source_offset + u64::from(document.source),
                        length: *length,
                    };
                    documents.insert(&id.to_be_bytes()[..], encode(&record)?)?;
                }

                for (key, value) in &encoded_terms {
                    terms.insert(key.as_slice(), value.as_slice())?;
                }

                for (term, postings) in &index.postings {
                    for (document, frequency) in postings {
                        let id = document_offset + u64::from(*document);
                        appears.insert(appears_key(term, id), &frequency.to_be_bytes()[..])?;
                    }
                }

                let last_source = source_offset + index.sources.len() as u64;
                let last_document = document_offset + index.documents.len() as u64;
                meta.insert(STATISTICS, encoded_statistics.as_slice())?;
                meta.insert(LAST_SOURCE_ID, &last_source.to_be_bytes()[..])?;
                meta.insert(LAST_DOCUMENT_ID, &last_document.to_be_bytes()[..])?;
                meta.insert(ACTIVE_GENERATION, &number.to_be_bytes()[..])?;
                Ok((source_offset, document_offset))
            })
            .map_err(|error| match error {
                TransactionError::Abort(error) => error,
                TransactionError::Storage(error) => StoreError::Sled(error),
            })?;

        self.db.flush()?;
        if let Some(old) = previous {
            if let Err(error) = self.drop_generation(old) {
                warn!(%error, generation = old, "failed to drop superseded generation");
            }
        }

        let report = CommitReport {
            generation: number,
            source_offset,
            document_offset,
            sources: index.source_count(),
            documents: index.document_count(),
            terms: index.term_count(),
            postings: index.posting_count(),
            statistics,
        };
        info!(
            generation = number,
            documents = report.documents,
            terms = report.terms,
            postings = report.postings,
            "committed index generation"
        );
        Ok(report)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

fn validate(index: &InvertedIndex) -> Result<(), StoreError> {
    if index.lengths.len() != index.documents.len() {
        return Err(StoreError::InconsistentBatch(format!(
            "{} documents but {} length accumulators",
            index.documents.len(),
            index.lengths.len()
        )));
    }
    let sources = index.sources.len();
    if let Some(document) = index.documents.iter().find(|d| d.source == 0 || d.source as usize > sources) {
        return Err(StoreError::InconsistentBatch(format!(
            "document {} refers to unknown source key {}",
            document.url, document.source
        )));
    }
    let documents = index.documents.len();
    for (term, postings) in &index.postings {
        if let Some(key) = postings.keys().find(|k| **k == 0 || **k as usize > documents) {
            return Err(StoreError::InconsistentBatch(format!(
                "posting for {term:?} refers to unknown document key {key}"
            )));
        }
    }
    Ok(())
}

fn parse_generation(tree_name: &str) -> Option<u64> {
    let rest = tree_name.strip_prefix(GENERATION_PREFIX)?;
    let (number, _) = rest.split_once('.')?;
    number.parse().ok()
}

fn appears_prefix(term: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(term.len() + 1);
    prefix.extend_from_slice(term.as_bytes());
    prefix.push(0);
    prefix
}

fn appears_key(term: &str, document: RowId) -> Vec<u8> {
    let mut key = appears_prefix(term);
    key.extend_from_slice(&document.to_be_bytes());
    key
}

fn abort(error: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(error)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<StoreError>> {
    bincode::serialize(value).map_err(|error| abort(error.into()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_values<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
    tree.iter()
        .values()
        .map(|value| {
            let value: IVec = value?;
            decode(&value)
        })
        .collect()
}

fn decode_u64(key: impl AsRef<[u8]>, bytes: &[u8]) -> Result<u64, StoreError> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| StoreError::Corrupt {
        key: String::from_utf8_lossy(key.as_ref()).into_owned(),
        details: format!("expected 8 bytes, found {}", bytes.len()),
    })?;
    Ok(u64::from_be_bytes(array))
}

fn decode_u32(key: &str, bytes: &[u8]) -> Result<u32, StoreError> {
    let array: [u8; 4] = bytes.try_into().map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        details: format!("expected 4 bytes, found {}", bytes.len()),
    })?;
    Ok(u32::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentType, Language, Source};
    use tempfile::tempdir;

    fn batch(urls: &[&str]) -> InvertedIndex {
        let mut index = InvertedIndex::new();
        let arxiv = index.stage_source(Source::new("arXiv", "https://arxiv.org"));
        let site = index.stage_source(Source::new("Cancer.org", "https://www.cancer.org"));
        for (n, url) in urls.iter().enumerate() {
            let source = if n % 2 == 0 { arxiv } else { site };
            let key = index
                .stage_document(
                    Document::new(format!("doc {n}"), "summary", DocumentType::Paper, *url, source)
                        .with_language(Language::English),
                )
                .unwrap();
            index.record_term_frequency(key, "tumor", n as u32 + 1).unwrap();
            if n % 2 == 1 {
                index.record_term_frequency(key, "therapi", 2).unwrap();
            }
        }
        index
    }

    #[test]
    fn empty_store_has_no_statistics() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.statistics().unwrap().is_none());
        assert!(store.documents().unwrap().is_empty());
        assert!(store.postings("tumor").unwrap().is_empty());
        store.ping().unwrap();
    }

    #[test]
    fn logical_keys_map_to_rows_in_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let index = batch(&["u1", "u2", "u3"]);
        let report = store.commit(&index).unwrap();
        assert_eq!(report.document_offset, 0);

        let rows = store.documents().unwrap();
        assert_eq!(rows.len(), 3);
        for (position, (row, staged)) in rows.iter().zip(&index.documents).enumerate() {
            let key = position as u64 + 1;
            assert_eq!(row.id, report.document_offset + key);
            assert_eq!(row.url, staged.url);
            assert_eq!(row.length, index.lengths[position]);
            assert_eq!(row.source_id, report.source_offset + u64::from(staged.source));
        }
    }

    #[test]
    fn terms_carry_document_frequency_and_idf() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.commit(&batch(&["u1", "u2", "u3", "u4"])).unwrap();

        let tumor = store.term("tumor").unwrap().unwrap();
        assert_eq!(tumor.document_frequency, 4);
        assert!((tumor.idf - 1.0).abs() < 1e-12);

        let therapy = store.term("therapi").unwrap().unwrap();
        assert_eq!(therapy.document_frequency, 2);
        assert!((therapy.idf - 2.0).abs() < 1e-12);
        assert_eq!(store.postings("therapi").unwrap(), vec![(2, 2), (4, 2)]);
    }

    #[test]
    fn statistics_are_overwritten_per_commit() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.commit(&batch(&["u1", "u2"])).unwrap();
        // lengths: 1, 2 + 2
        let first = store.statistics().unwrap().unwrap();
        assert_eq!(first.document_count, 2);
        assert!((first.average_document_length - 2.5).abs() < 1e-12);

        let report = store.commit(&batch(&["v1"])).unwrap();
        let second = store.statistics().unwrap().unwrap();
        assert_eq!(second, report.statistics);
        assert_eq!(second.document_count, 1);
        assert_eq!(store.documents().unwrap().len(), 1);
    }

    #[test]
    fn row_ids_continue_across_generations() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.commit(&batch(&["u1", "u2"])).unwrap();
        let report = store.commit(&batch(&["v1", "v2", "v3"])).unwrap();
        assert_eq!(report.generation, 2);
        assert_eq!(report.document_offset, 2);
        assert_eq!(report.source_offset, 2);
        let ids: Vec<_> = store.documents().unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        let source_ids: Vec<_> = store.sources().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(source_ids, vec![3, 4]);
    }

    #[test]
    fn term_prefixes_do_not_leak_between_terms() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut index = InvertedIndex::new();
        let source = index.stage_source(Source::new("s", "https://s"));
        let key = index
            .stage_document(Document::new("t", "s", DocumentType::Website, "u", source))
            .unwrap();
        index.record_term_frequency(key, "run", 1).unwrap();
        index.record_term_frequency(key, "runner", 5).unwrap();
        store.commit(&index).unwrap();
        assert_eq!(store.postings("run").unwrap(), vec![(1, 1)]);
        assert_eq!(store.postings("runner").unwrap(), vec![(1, 5)]);
    }

    #[test]
    fn inconsistent_batch_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.commit(&batch(&["u1"])).unwrap();

        let mut broken = batch(&["v1", "v2"]);
        broken.lengths.pop();
        assert!(matches!(store.commit(&broken), Err(StoreError::InconsistentBatch(_))));
        assert_eq!(store.documents().unwrap().len(), 1);
        assert_eq!(store.active_generation().unwrap(), Some(1));
    }

    #[test]
    fn reopening_drops_orphaned_generation_trees() {
        let dir = tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store.commit(&batch(&["u1"])).unwrap();
            // Simulates a crash after the next generation's trees were created.
            store.generation(9).unwrap().documents.insert(&b"x"[..], b"y".to_vec()).unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(dir.path()).unwrap();
        let names: Vec<String> = store
            .db
            .tree_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect();
        assert!(names.iter().all(|n| parse_generation(n).map_or(true, |g| g == 1)));
        assert_eq!(store.documents().unwrap().len(), 1);
    }
}
