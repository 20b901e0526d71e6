use crate::error::ConnectorError;
use crate::http::{fetch_favicon, send_checked};
use crate::robots::Robots;
use crate::sanitize::{sanitize_text, sanitize_title};
use crate::SourceConnector;
use async_trait::async_trait;
use oncoseek_core::{Document, DocumentType, Source, SourceKey};
use parking_lot::RwLock;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    /// Pages more than `max_depth - 1` links away from the base URL are not fetched.
    pub max_depth: usize,
    pub max_pages: usize,
    /// Pause between two page fetches. A larger robots.txt `Crawl-delay` takes precedence.
    pub delay: Duration,
    pub respect_robots: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self { max_depth: 5, max_pages: 200, delay: Duration::from_secs(1), respect_robots: true }
    }
}

/// Breadth-first crawler over one site. Only URLs under `base_url` are followed; every HTML
/// page with a title and paragraph text becomes a document.
pub struct WebsiteConnector {
    client: Client,
    name: String,
    base_url: String,
    options: CrawlOptions,
    page_text: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Page {
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<Url>,
}

fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Title, paragraph text and outgoing http(s) links of one HTML page.
pub fn parse_page(html: &str, page_url: &Url) -> Page {
    let title_sel = Selector::parse("title").unwrap();
    let h1_sel = Selector::parse("h1").unwrap();
    let p_sel = Selector::parse("p").unwrap();
    let a_sel = Selector::parse("a[href]").unwrap();

    let document = Html::parse_document(html);
    let title = document
        .select(&title_sel)
        .chain(document.select(&h1_sel))
        .find_map(|node| sanitize_title(&node.text().collect::<String>()));
    let text = document
        .select(&p_sel)
        .map(|p| sanitize_text(&p.text().collect::<String>()))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let links = document
        .select(&a_sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| normalize(&url))
        .collect();
    Page { title, text, links }
}

impl WebsiteConnector {
    pub fn new(client: Client, name: impl Into<String>, base_url: impl Into<String>, options: CrawlOptions) -> Self {
        Self {
            client,
            name: name.into(),
            base_url: base_url.into(),
            options,
            page_text: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `Ok(None)` for answers that are not HTML or are too large to index.
    async fn fetch_page(&self, url: &Url) -> Result<Option<Page>, ConnectorError> {
        let response = send_checked(self.client.get(url.clone())).await?;
        let is_html = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(true, |value| value.starts_with("text/html"));
        if !is_html {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.len() > MAX_PAGE_BYTES {
            return Ok(None);
        }
        Ok(Some(parse_page(&String::from_utf8_lossy(&bytes), url)))
    }

    async fn crawl(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError> {
        let base = normalize(&Url::parse(&self.base_url)?);
        if base.host_str().is_none() {
            return Err(ConnectorError::malformed(&self.name, format!("{base} has no host")));
        }
        let robots = if self.options.respect_robots {
            Robots::fetch(&self.client, &base).await
        } else {
            Robots::default()
        };
        let delay = robots.crawl_delay.map_or(self.options.delay, |d| d.max(self.options.delay));
        let max_depth = self.options.max_depth.max(1);

        let mut frontier = VecDeque::from([(base.clone(), 0usize)]);
        let mut seen = HashSet::from([base.to_string()]);
        let mut documents = Vec::new();
        let mut texts = HashMap::new();
        let mut fetched = 0usize;

        while let Some((url, depth)) = frontier.pop_front() {
            if fetched >= self.options.max_pages {
                break;
            }
            if !robots.allows(url.path()) {
                debug!(site = %self.name, url = %url, "disallowed by robots.txt");
                continue;
            }
            if fetched > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            fetched += 1;

            let page = match self.fetch_page(&url).await {
                Ok(Some(page)) => page,
                Ok(None) => continue,
                Err(error) if depth == 0 => return Err(error),
                Err(error) => {
                    debug!(site = %self.name, url = %url, %error, "page skipped");
                    continue;
                }
            };

            if depth + 1 < max_depth {
                for link in &page.links {
                    if link.as_str().starts_with(base.as_str()) && seen.insert(link.to_string()) {
                        frontier.push_back((link.clone(), depth + 1));
                    }
                }
            }

            match page.title {
                Some(title) if !page.text.is_empty() => {
                    documents.push(Document::new(title, &page.text, DocumentType::Website, url.as_str(), source));
                    texts.insert(url.to_string(), page.text);
                }
                _ => debug!(site = %self.name, url = %url, "page without title or text"),
            }
        }

        info!(site = %self.name, pages = fetched, documents = documents.len(), "crawl finished");
        self.page_text.write().extend(texts);
        Ok(documents)
    }
}

#[async_trait]
impl SourceConnector for WebsiteConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn source_descriptor(&self) -> Result<Source, ConnectorError> {
        let icon = fetch_favicon(&self.client, &self.base_url).await;
        Ok(Source::new(self.name.as_str(), self.base_url.as_str()).with_icon(icon))
    }

    async fn document_descriptors(&self, source: SourceKey) -> Result<Vec<Document>, ConnectorError> {
        self.crawl(source).await
    }

    /// The full page text seen while crawling; the stored summary if the page is unknown.
    async fn document_text(&self, document: &Document) -> Result<String, ConnectorError> {
        let cached = self.page_text.read().get(&document.url).cloned();
        Ok(cached.unwrap_or_else(|| document.summary.clone()))
    }
}
