use crate::error::IndexerError;
use std::fs;
use std::path::Path;

/// One crawl target from the websites list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteEntry {
    pub url: String,
    pub name: String,
}

/// `url,name` per line. Blank lines and `#` comments are skipped; the name may contain commas.
pub fn parse_websites(text: &str) -> Result<Vec<WebsiteEntry>, IndexerError> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let invalid = |details: &str| IndexerError::InvalidWebsite { line: index + 1, details: details.to_string() };
        let (url, name) = line.split_once(',').ok_or_else(|| invalid("expected `url,name`"))?;
        let (url, name) = (url.trim(), name.trim().trim_matches('"'));
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("url must be http(s)"));
        }
        if name.is_empty() {
            return Err(invalid("empty site name"));
        }
        entries.push(WebsiteEntry { url: url.to_string(), name: name.to_string() });
    }
    Ok(entries)
}

pub fn read_websites(path: &Path) -> Result<Vec<WebsiteEntry>, IndexerError> {
    parse_websites(&fs::read_to_string(path)?)
}
