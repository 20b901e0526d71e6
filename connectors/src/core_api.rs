use crate::error::ConnectorError;
use crate::http::{fetch_favicon, send_checked};
use crate::paper::PaperQuery;
use crate::pdf::paper_text;
use crate::sanitize::{non_empty, parse_iso_date};
use crate::SourceConnector;
use async_trait::async_trait;
use oncoseek_core::{Document, DocumentType, Source, SourceKey};
use reqwest::Client;
use serde::Deserialize;

pub const NAME: &str = "CORE";
pub const SITE: &str = "https://core.ac.uk/";
pub const ENDPOINT: &str = "https://api.core.ac.uk/v3";

/// CORE v3 works search. Needs an API key, sent as a bearer token.
pub struct CoreConnector {
    client: Client,
    query: PaperQuery,
    api_key: String,
    endpoint: String,
    site: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Work {
    title: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    download_url: Option<String>,
    published_date: Option<String>,
}

impl CoreConnector {
    pub fn new(client: Client, query: PaperQuery, api_key: impl Into<String>) -> Self {
        Self {
            client,
            query,
            api_key: api_key.into(),
            endpoint: ENDPOINT.to_string(),
            site: SITE.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }
}

fn work_document(work: Work, source: SourceKey) -> Option<Document> {
    let title = non_empty(work.title.as_deref())?;
    let summary = non_empty(work.summary.as_deref())?;
    let url = work.download_url.filter(|url| !url.trim().is_empty())?;
    let published = work.published_date.as_deref().and_then(parse_iso_date);
    Some(Document::new(title, &summary, DocumentType::Paper, url, source).with_publish_date(published))
}

#[async_trait]
impl SourceConnector for CoreConnector {
    fn name(&self) -> &str {
        NAME
    }

    async fn source_descriptor(&self) -> Result<Source, ConnectorError> {
        let icon = fetch_favicon(&self.client, &self.site).await;
        Ok(Source::new(NAME, self.site.as_str()).with_icon(icon))
    }

    async fn document_descriptors(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError> {
        let request = self
            .client
            .get(format!("{}/search/works", self.endpoint))
            .bearer_auth(&self.api_key)
            .query(&[("q", self.query.disjunction()), ("limit", self.query.max_results.to_string())]);
        let response: SearchResponse = send_checked(request).await?.json().await?;
        Ok(response.results.into_iter().filter_map(|work| work_document(work, source)).collect())
    }

    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError> {
        Ok(paper_text(&self.client, document, self.query.use_full_text).await)
    }
}
