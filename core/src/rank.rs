use crate::error::StoreError;
use crate::store::Store;
use crate::tokenizer::TermProcessor;
use crate::{truncate_chars, DocumentRecord, Language, RowId, MAX_SUMMARY_LEN};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 1_000;
pub const DEFAULT_SUMMARY_LEN: usize = 400;

/// Whether the stored inverse document frequency takes part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdfWeighting {
    /// Term-frequency saturation and length normalisation only.
    #[default]
    None,
    /// Each term contribution is multiplied by `ln(1 + N/df)`.
    Smoothed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub idf: IdfWeighting,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B, idf: IdfWeighting::None }
    }
}

/// `tf·(k1+1) / (tf + k1·(1 − b + b·len/avgdl))`. An empty corpus (avgdl = 0) is treated as
/// every document having average length.
pub fn bm25_term_score(tf: u32, document_length: u64, average_length: f64, params: &Bm25Params) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = f64::from(tf);
    let relative_length = if average_length > 0.0 {
        document_length as f64 / average_length
    } else {
        1.0
    };
    (tf * (params.k1 + 1.0)) / (tf + params.k1 * (1.0 - params.b + params.b * relative_length))
}

pub fn idf_factor(idf: f64, weighting: IdfWeighting) -> f64 {
    match weighting {
        IdfWeighting::None => 1.0,
        IdfWeighting::Smoothed => (1.0 + idf).ln(),
    }
}

/// Number of pages needed for `document_count` documents; never less than one.
pub fn max_pages(document_count: u64, limit: usize) -> usize {
    let limit = limit.max(1) as u64;
    (document_count.div_ceil(limit) as usize).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    /// Clamps caller input: `limit` to `[1, MAX_LIMIT]`, then `page` to `[1, max_pages]`.
    pub fn clamp(page: i64, limit: i64, document_count: u64) -> Self {
        let limit = limit.clamp(1, MAX_LIMIT as i64) as usize;
        let last = max_pages(document_count, limit) as i64;
        let page = page.clamp(1, last) as usize;
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }
}

pub fn clamp_summary_len(raw: i64) -> usize {
    raw.clamp(1, MAX_SUMMARY_LEN as i64) as usize
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankRequest {
    pub query: String,
    pub language: Option<Language>,
    pub page: i64,
    pub limit: i64,
    pub max_summary_len: i64,
}

impl RankRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            page: 1,
            limit: DEFAULT_LIMIT as i64,
            max_summary_len: DEFAULT_SUMMARY_LEN as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub document: DocumentRecord,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPage {
    pub terms: Vec<String>,
    pub pagination: Pagination,
    pub total_documents: u64,
    pub documents: Vec<RankedDocument>,
}

/// Scores every stored document against a query and returns one page of results.
pub struct Ranker<'a> {
    store: &'a Store,
    processor: &'a TermProcessor,
    params: Bm25Params,
}

impl<'a> Ranker<'a> {
    pub fn new(store: &'a Store, processor: &'a TermProcessor, params: Bm25Params) -> Self {
        Self { store, processor, params }
    }

    pub fn rank(&self, request: &RankRequest) -> Result<RankedPage, StoreError> {
        let statistics = self.store.statistics()?.ok_or(StoreError::MissingStatistics)?;
        let pagination = Pagination::clamp(request.page, request.limit, statistics.document_count);
        let summary_len = clamp_summary_len(request.max_summary_len);
        let terms = self.processor.query_terms(&request.query, request.language);

        let documents = self.store.documents()?;
        let scores = self.score(&terms, &documents, statistics.average_document_length)?;

        let mut ranked: Vec<RankedDocument> = documents
            .into_iter()
            .map(|document| RankedDocument {
                score: scores.get(&document.id).copied().unwrap_or(0.0),
                document,
            })
            .collect();
        // Stable: equal scores keep row order.
        ranked.sort_by(|left, right| right.score.total_cmp(&left.score));

        let documents = ranked
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit)
            .map(|mut hit| {
                hit.document.summary = truncate_chars(&hit.document.summary, summary_len);
                hit
            })
            .collect();

        tracing::debug!(query = %request.query, terms = terms.len(), page = pagination.page, "ranked query");
        Ok(RankedPage { terms, pagination, total_documents: statistics.document_count, documents })
    }

    fn score(
        &self,
        terms: &[String],
        documents: &[DocumentRecord],
        average_length: f64,
    ) -> Result<HashMap<RowId, f64>, StoreError> {
        let lengths: HashMap<RowId, u64> = documents.iter().map(|d| (d.id, d.length)).collect();
        let mut scores: HashMap<RowId, f64> = HashMap::new();
        for term in terms {
            let factor = match self.params.idf {
                IdfWeighting::None => 1.0,
                IdfWeighting::Smoothed => match self.store.term(term)? {
                    Some(record) => idf_factor(record.idf, self.params.idf),
                    None => continue,
                },
            };
            for (id, tf) in self.store.postings(term)? {
                if let Some(length) = lengths.get(&id) {
                    *scores.entry(id).or_insert(0.0) +=
                        factor * bm25_term_score(tf, *length, average_length, &self.params);
                }
            }
        }
        Ok(scores)
    }
}
