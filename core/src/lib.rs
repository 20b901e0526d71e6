use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::Date;

pub mod error;
pub mod index;
pub mod persist;
pub mod rank;
pub mod staging;
pub mod store;
pub mod tokenizer;

pub use error::{AccumulatorError, ParseEnumError, StagingError, StoreError};
pub use index::{IndexAccumulator, InvertedIndex};
pub use rank::{Bm25Params, IdfWeighting, Pagination, RankRequest, RankedDocument, RankedPage, Ranker};
pub use staging::{StagingManager, StagingState};
pub use store::{CommitReport, Store};
pub use tokenizer::{Analysis, TermFrequencies, TermProcessor};

/// 1-based position of a source inside the staged batch.
pub type SourceKey = u32;
/// 1-based position of a document inside the staged batch. Only valid until commit.
pub type DocKey = u32;
/// Row identity handed out by the persistent store.
pub type RowId = u64;

/// Upper bound on stored summaries, in characters.
pub const MAX_SUMMARY_LEN: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Spanish,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Spanish];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Spanish => "spanish",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "spanish" | "es" => Ok(Language::Spanish),
            _ => Err(ParseEnumError::new("language", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Paper,
    Website,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Paper => "paper",
            DocumentType::Website => "website",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paper" => Ok(DocumentType::Paper),
            "website" => Ok(DocumentType::Website),
            _ => Err(ParseEnumError::new("document type", value)),
        }
    }
}

/// Source descriptor produced by a connector. Has no identity until committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub base_url: String,
    pub icon: Option<Vec<u8>>,
}

impl Source {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { name: name.into(), base_url: base_url.into(), icon: None }
    }

    pub fn with_icon(mut self, icon: Option<Vec<u8>>) -> Self {
        self.icon = icon;
        self
    }
}

/// Document descriptor produced by a connector.
///
/// `language` is a hint; the indexer resolves it before staging. The length is not part of the
/// descriptor: it is accumulated from term frequencies while indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub summary: String,
    pub doc_type: DocumentType,
    pub publish_date: Option<Date>,
    pub url: String,
    pub language: Option<Language>,
    pub source: SourceKey,
}

impl Document {
    /// Builds a descriptor, truncating the summary to [`MAX_SUMMARY_LEN`] characters.
    pub fn new(
        title: impl Into<String>,
        summary: &str,
        doc_type: DocumentType,
        url: impl Into<String>,
        source: SourceKey,
    ) -> Self {
        Self {
            title: title.into(),
            summary: truncate_chars(summary, MAX_SUMMARY_LEN),
            doc_type,
            publish_date: None,
            url: url.into(),
            language: None,
            source,
        }
    }

    pub fn with_publish_date(mut self, publish_date: Option<Date>) -> Self {
        self.publish_date = publish_date;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }
}

/// Corpus-wide singleton, overwritten by every successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentStatistics {
    pub document_count: u64,
    pub average_document_length: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: RowId,
    pub name: String,
    pub base_url: String,
    pub icon: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: RowId,
    pub title: String,
    pub summary: String,
    pub doc_type: DocumentType,
    pub publish_date: Option<Date>,
    pub url: String,
    pub language: Language,
    pub source_id: RowId,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub term: String,
    pub document_frequency: u32,
    pub idf: f64,
}

/// Truncates on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_truncated_at_creation() {
        let long = "é".repeat(MAX_SUMMARY_LEN + 25);
        let doc = Document::new("t", &long, DocumentType::Paper, "https://x", 1);
        assert_eq!(doc.summary.chars().count(), MAX_SUMMARY_LEN);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("Spanish".parse::<Language>().ok(), Some(Language::Spanish));
        assert_eq!("WEBSITE".parse::<DocumentType>().ok(), Some(DocumentType::Website));
        assert!("klingon".parse::<Language>().is_err());
    }
}
