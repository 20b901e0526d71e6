use crate::error::AccumulatorError;
use crate::tokenizer::TermFrequencies;
use crate::{DocKey, Document, Source, SourceKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one indexing pass has staged so far.
///
/// Logical keys are 1-based positions in `sources` / `documents`; `lengths[k - 1]` is the
/// accumulated length of document `k`. For every document the sum of its postings equals its
/// length.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub sources: Vec<Source>,
    pub documents: Vec<Document>,
    pub lengths: Vec<u64>,
    /// term -> document key -> frequency
    pub postings: BTreeMap<String, BTreeMap<DocKey, u32>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_source(&mut self, source: Source) -> SourceKey {
        self.sources.push(source);
        self.sources.len() as SourceKey
    }

    pub fn stage_document(&mut self, document: Document) -> Result<DocKey, AccumulatorError> {
        if document.source == 0 || document.source as usize > self.sources.len() {
            return Err(AccumulatorError::UnknownSource(document.source));
        }
        self.documents.push(document);
        self.lengths.push(0);
        Ok(self.documents.len() as DocKey)
    }

    /// Adds `frequency` to the posting of (`document`, `term`) and to the document length.
    /// Frequencies are additive: recording the same pair twice counts it twice.
    pub fn record_term_frequency(
        &mut self,
        document: DocKey,
        term: &str,
        frequency: u32,
    ) -> Result<(), AccumulatorError> {
        let slot = self.slot(document)?;
        if frequency == 0 {
            return Ok(());
        }
        *self
            .postings
            .entry(term.to_string())
            .or_default()
            .entry(document)
            .or_insert(0) += frequency;
        self.lengths[slot] += u64::from(frequency);
        Ok(())
    }

    pub fn record_terms(
        &mut self,
        document: DocKey,
        terms: &TermFrequencies,
    ) -> Result<(), AccumulatorError> {
        for (term, frequency) in terms {
            self.record_term_frequency(document, term, *frequency)?;
        }
        Ok(())
    }

    fn slot(&self, document: DocKey) -> Result<usize, AccumulatorError> {
        let slot = (document as usize).wrapping_sub(1);
        if slot < self.documents.len() {
            Ok(slot)
        } else {
            Err(AccumulatorError::UnknownDocument(document))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn posting_count(&self) -> usize {
        self.postings.values().map(BTreeMap::len).sum()
    }

    pub fn document(&self, key: DocKey) -> Option<&Document> {
        self.slot(key).ok().map(|slot| &self.documents[slot])
    }

    pub fn document_length(&self, key: DocKey) -> Option<u64> {
        self.slot(key).ok().map(|slot| self.lengths[slot])
    }

    pub fn total_length(&self) -> u64 {
        self.lengths.iter().sum()
    }

    pub fn average_document_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_length() as f64 / self.documents.len() as f64
        }
    }

    /// Number of distinct documents with a nonzero posting for `term`.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.postings
            .get(term)
            .map(|postings| postings.values().filter(|f| **f > 0).count() as u32)
            .unwrap_or(0)
    }

    /// `document_count / document_frequency`, or 0 for unknown terms.
    pub fn inverse_document_frequency(&self, term: &str) -> f64 {
        match self.document_frequency(term) {
            0 => 0.0,
            df => self.documents.len() as f64 / f64::from(df),
        }
    }
}

/// Shared accumulator mutated from many concurrent harvesting tasks.
#[derive(Debug, Default)]
pub struct IndexAccumulator {
    inner: Mutex<InvertedIndex>,
}

impl IndexAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_source(&self, source: Source) -> SourceKey {
        self.inner.lock().stage_source(source)
    }

    pub fn stage_document(&self, document: Document) -> Result<DocKey, AccumulatorError> {
        self.inner.lock().stage_document(document)
    }

    pub fn record_term_frequency(
        &self,
        document: DocKey,
        term: &str,
        frequency: u32,
    ) -> Result<(), AccumulatorError> {
        self.inner.lock().record_term_frequency(document, term, frequency)
    }

    /// Stages `document` and all of its terms under a single lock acquisition, so a document
    /// never becomes visible without its postings.
    pub fn index_document(
        &self,
        document: Document,
        terms: &TermFrequencies,
    ) -> Result<DocKey, AccumulatorError> {
        let mut index = self.inner.lock();
        let key = index.stage_document(document)?;
        index.record_terms(key, terms)?;
        Ok(key)
    }

    pub fn document_count(&self) -> usize {
        self.inner.lock().document_count()
    }

    pub fn snapshot(&self) -> InvertedIndex {
        self.inner.lock().clone()
    }

    pub fn into_inner(self) -> InvertedIndex {
        self.inner.into_inner()
    }
}
