use crate::error::ConnectorError;
use crate::http::{fetch_favicon, send_checked};
use crate::paper::PaperQuery;
use crate::pdf::paper_text;
use crate::sanitize::{non_empty, parse_iso_date};
use crate::SourceConnector;
use async_trait::async_trait;
use oncoseek_core::{Document, DocumentType, Source, SourceKey};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

pub const NAME: &str = "ArXiv";
pub const SITE: &str = "https://arxiv.org";
pub const ENDPOINT: &str = "http://export.arxiv.org/api/query";

/// arXiv export API (Atom feed). The PDF link is the abstract URL with `/abs/` swapped for
/// `/pdf/`.
pub struct ArxivConnector {
    client: Client,
    query: PaperQuery,
    endpoint: String,
    site: String,
}

impl ArxivConnector {
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

    fn search_query(&self) -> String {
        self.query.terms.iter().map(|term| format!("all:{term}")).collect::<Vec<_>>().join(" OR ")
    }
}

fn child_text(entry: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = entry.select(selector).next().map(|node| node.text().collect::<String>());
    non_empty(text.as_deref())
}

/// Atom entries to document descriptors. Entries without id, title or summary are skipped.
pub fn parse_feed(feed: &str, source: SourceKey) -> Vec<Document> {
    let entry_sel = Selector::parse("entry").unwrap();
    let id_sel = Selector::parse("id").unwrap();
    let title_sel = Selector::parse("title").unwrap();
    let summary_sel = Selector::parse("summary").unwrap();
    let published_sel = Selector::parse("published").unwrap();

    let html = Html::parse_document(feed);
    let mut documents = Vec::new();
    for entry in html.select(&entry_sel) {
        let (Some(id), Some(title), Some(summary)) = (
            child_text(&entry, &id_sel),
            child_text(&entry, &title_sel),
            child_text(&entry, &summary_sel),
        ) else {
            continue;
        };
        let published = child_text(&entry, &published_sel).and_then(|date| parse_iso_date(&date));
        documents.push(
            Document::new(title, &summary, DocumentType::Paper, id.replace("/abs/", "/pdf/"), source)
                .with_publish_date(published),
        );
    }
    documents
}

#[async_trait]
impl SourceConnector for ArxivConnector {
    fn name(&self) -> &str {
        NAME
    }

    async fn source_descriptor(&self) -> Result<Source, ConnectorError> {
        let icon = fetch_favicon(&self.client, &self.site).await;
        Ok(Source::new(NAME, self.site.as_str()).with_icon(icon))
    }

    async fn document_descriptors(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("search_query", self.search_query()),
            ("start", "0".to_string()),
            ("max_results", self.query.max_results.to_string()),
        ]);
        let feed = send_checked(request).await?.text().await?;
        Ok(parse_feed(&feed, source))
    }

    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError> {
        Ok(paper_text(&self.client, document, self.query.use_full_text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: all:cancer</title>
  <id>http://arxiv.org/api/feed</id>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-02T10:00:00Z</published>
    <title>Deep learning for
      tumour segmentation</title>
    <summary>  We segment tumours.  </summary>
    <link href="http://arxiv.org/abs/2401.00001v1" rel="alternate" type="text/html"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CV"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <title>No abstract here</title>
  </entry>
</feed>"#;

    #[test]
    fn entries_become_documents() {
        let documents = parse_feed(FEED, 4);
        assert_eq!(documents.len(), 1);
        let document = &documents[0];
        assert_eq!(document.title, "Deep learning for tumour segmentation");
        assert_eq!(document.summary, "We segment tumours.");
        assert_eq!(document.url, "http://arxiv.org/pdf/2401.00001v1");
        assert_eq!(document.source, 4);
        assert_eq!(document.publish_date.map(|d| d.year()), Some(2024));
    }

    #[test]
    fn terms_are_field_qualified() {
        let client = Client::new();
        let connector =
            ArxivConnector::new(client, PaperQuery::new(vec!["cancer".into(), "tumor".into()], 3, false));
        assert_eq!(connector.search_query(), "all:cancer OR all:tumor");
    }
}
