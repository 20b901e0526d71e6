use crate::error::ConnectorError;
use crate::http::{fetch_favicon, send_checked};
use crate::paper::PaperQuery;
use crate::pdf::paper_text;
use crate::sanitize::{non_empty, parse_pubmed_date};
use crate::SourceConnector;
use async_trait::async_trait;
use oncoseek_core::{Document, DocumentType, Source, SourceKey};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const NAME: &str = "PubMed";
pub const SITE: &str = "https://pubmed.ncbi.nlm.nih.gov/";
pub const ENDPOINT: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed Central through the E-utilities: `esearch` for ids, then one `esummary` for details.
pub struct PubMedConnector {
    client: Client,
    query: PaperQuery,
    endpoint: String,
    site: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: Map<String, Value>,
}

impl PubMedConnector {
    pub fn new(client: Client, query: PaperQuery) -> Self {
        Self { client, query, endpoint: ENDPOINT.to_string(), site: SITE.to_string() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    async fn search_ids(&self) -> Result<Vec<String>, ConnectorError> {
        let request = self.client.get(format!("{}/esearch.fcgi", self.endpoint)).query(&[
            ("db", "pmc".to_string()),
            ("term", self.query.disjunction()),
            ("retmax", self.query.max_results.to_string()),
            ("retmode", "json".to_string()),
        ]);
        let response: SearchResponse = send_checked(request).await?.json().await?;
        Ok(response.esearchresult.idlist)
    }

    async fn summaries(&self, ids: &[String]) -> Result<Map<String, Value>, ConnectorError> {
        let request = self.client.get(format!("{}/esummary.fcgi", self.endpoint)).query(&[
            ("db", "pmc".to_string()),
            ("id", ids.join(",")),
            ("retmode", "json".to_string()),
        ]);
        let response: SummaryResponse = send_checked(request).await?.json().await?;
        Ok(response.result)
    }
}

pub fn article_pdf_url(id: &str) -> String {
    format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{id}/pdf/")
}

/// `esummary` records to descriptors, in `ids` order. Records lacking a title or summary are
/// skipped.
pub fn parse_summaries(ids: &[String], result: &Map<String, Value>, source: SourceKey) -> Vec<Document> {
    ids.iter()
        .filter_map(|id| {
            let record = result.get(id)?;
            let title = non_empty(record.get("title").and_then(Value::as_str))?;
            let summary = non_empty(record.get("summary").and_then(Value::as_str))?;
            let published = record.get("pubdate").and_then(Value::as_str).and_then(parse_pubmed_date);
            Some(
                Document::new(title, &summary, DocumentType::Paper, article_pdf_url(id), source)
                    .with_publish_date(published),
            )
        })
        .collect()
}

#[async_trait]
impl SourceConnector for PubMedConnector {
    fn name(&self) -> &str {
        NAME
    }

    async fn source_descriptor(&self) -> Result<Source, ConnectorError> {
        let icon = fetch_favicon(&self.client, &self.site).await;
        Ok(Source::new(NAME, self.site.as_str()).with_icon(icon))
    }

    async fn document_descriptors(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError> {
        let ids = self.search_ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.summaries(&ids).await?;
        Ok(parse_summaries(&ids, &result, source))
    }

    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError> {
        Ok(paper_text(&self.client, document, self.query.use_full_text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_without_summary_are_skipped() {
        let result = json!({
            "uids": ["11", "12", "13"],
            "11": {"title": "Immunotherapy outcomes", "summary": "Outcomes of immunotherapy.", "pubdate": "2023 Feb 10"},
            "12": {"title": "Title only"},
            "13": {"title": "", "summary": "Summary only"}
        });
        let ids: Vec<String> = vec!["11".into(), "12".into(), "13".into(), "14".into()];
        let documents = parse_summaries(&ids, result.as_object().unwrap(), 2);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].url, "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC11/pdf/");
        assert_eq!(documents[0].publish_date.map(|d| d.day()), Some(10));
    }
}
