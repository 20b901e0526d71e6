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

pub const NAME: &str = "DOAJ";
pub const SITE: &str = "https://doaj.org";
pub const ENDPOINT: &str = "https://doaj.org/api";

/// Directory of Open Access Journals article search. The query goes in the path.
pub struct DoajConnector {
    client: Client,
    query: PaperQuery,
    endpoint: String,
    site: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    created_date: Option<String>,
    bibjson: Bibjson,
}

#[derive(Debug, Deserialize)]
struct Bibjson {
    title: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    #[serde(default)]
    link: Vec<Link>,
    created_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    url: Option<String>,
}

impl DoajConnector {
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

    fn search_url(&self) -> String {
        format!("{}/search/articles/{}", self.endpoint, urlencoding::encode(&self.query.disjunction()))
    }
}

fn article_document(article: Article, source: SourceKey) -> Option<Document> {
    let bibjson = article.bibjson;
    let title = non_empty(bibjson.title.as_deref())?;
    let summary = non_empty(bibjson.summary.as_deref())?;
    let url = bibjson.link.into_iter().next()?.url.filter(|url| !url.trim().is_empty())?;
    let published = bibjson
        .created_date
        .or(article.created_date)
        .as_deref()
        .and_then(parse_iso_date);
    Some(Document::new(title, &summary, DocumentType::Paper, url, source).with_publish_date(published))
}

#[async_trait]
impl SourceConnector for DoajConnector {
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
            .get(self.search_url())
            .query(&[("page", "1".to_string()), ("pageSize", self.query.max_results.to_string())]);
        let response: SearchResponse = send_checked(request).await?.json().await?;
        Ok(response.results.into_iter().filter_map(|article| article_document(article, source)).collect())
    }

    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError> {
        Ok(paper_text(&self.client, document, self.query.use_full_text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_path_encoded() {
        let connector = DoajConnector::new(Client::new(), PaperQuery::new(vec!["a b".into(), "c".into()], 1, false))
            .with_endpoint("http://localhost/api");
        assert_eq!(connector.search_url(), "http://localhost/api/search/articles/a%20b%20OR%20c");
    }
}
