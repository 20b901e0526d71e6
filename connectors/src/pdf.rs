use crate::error::ConnectorError;
use crate::http::send_checked;
use lopdf::Document as PdfDocument;
use oncoseek_core::Document;
use reqwest::Client;

/// Text of every page of an in-memory PDF, in page order.
pub fn extract_text(bytes: &[u8]) -> Result<String, ConnectorError> {
    let document = PdfDocument::load_mem(bytes).map_err(|error| ConnectorError::Pdf(error.to_string()))?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(ConnectorError::Pdf("document has no pages".to_string()));
    }
    let text = document
        .extract_text(&pages)
        .map_err(|error| ConnectorError::Pdf(error.to_string()))?;
    if text.trim().is_empty() {
        return Err(ConnectorError::Pdf("no readable page text".to_string()));
    }
    Ok(text)
}

/// Parsing is CPU-bound, so it runs on the blocking pool.
pub async fn extract_text_blocking(bytes: Vec<u8>) -> Result<String, ConnectorError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|error| ConnectorError::Pdf(error.to_string()))?
}

pub async fn download_text(client: &Client, url: &str) -> Result<String, ConnectorError> {
    let response = send_checked(client.get(url)).await?;
    let bytes = response.bytes().await?;
    extract_text_blocking(bytes.to_vec()).await
}

/// Text used when no document body is available.
pub fn fallback_text(document: &Document) -> String {
    format!("{} {}", document.title, document.summary)
}

/// Document body for a paper. Without full text, or when the download or extraction fails,
/// the title and summary stand in for it.
pub async fn paper_text(client: &Client, document: &Document, use_full_text: bool) -> String {
    if !use_full_text {
        return fallback_text(document);
    }
    match download_text(client, &document.url).await {
        Ok(text) => text,
        Err(error) => {
            tracing::warn!(%error, url = %document.url, "full text unavailable; using title and summary");
            fallback_text(document)
        }
    }
}
