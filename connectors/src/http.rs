use crate::error::ConnectorError;
use reqwest::{Client, RequestBuilder, Response};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; oncoseek-indexer/0.1; +https://github.com/oncoseek)";

/// Shared HTTP client for every connector in a pass.
pub fn build_client(timeout: Duration) -> Result<Client, ConnectorError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()?)
}

/// Sends `request` and turns any non-2xx answer into [`ConnectorError::Status`].
pub async fn send_checked(request: RequestBuilder) -> Result<Response, ConnectorError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ConnectorError::Status { url: response.url().to_string(), status: status.as_u16() });
    }
    Ok(response)
}

/// Icon advertised by `<link rel="icon">` on the landing page, else `/favicon.ico`.
/// Any failure yields `None`: a source without an icon is still a source.
pub async fn fetch_favicon(client: &Client, base_url: &str) -> Option<Vec<u8>> {
    let base = Url::parse(base_url).ok()?;
    let advertised = match send_checked(client.get(base.clone())).await {
        Ok(response) => response.text().await.ok().and_then(|html| icon_href(&html)),
        Err(error) => {
            tracing::debug!(%error, base = %base, "landing page unavailable for favicon lookup");
            None
        }
    };
    let icon_url = match advertised {
        Some(href) => base.join(&href).ok()?,
        None => base.join("/favicon.ico").ok()?,
    };
    let response = send_checked(client.get(icon_url)).await.ok()?;
    let bytes = response.bytes().await.ok()?;
    (!bytes.is_empty()).then(|| bytes.to_vec())
}

fn icon_href(html: &str) -> Option<String> {
    let selector = Selector::parse(r#"link[rel~="icon"][href]"#).unwrap();
    let document = Html::parse_document(html);
    let href = document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string);
    href
}
