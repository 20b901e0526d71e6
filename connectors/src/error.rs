use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("pdf extraction failed: {0}")]
    Pdf(String),

    #[error("malformed response from {origin}: {details}")]
    Malformed { origin: String, details: String },
}

impl ConnectorError {
    pub(crate) fn malformed(origin: &str, details: impl ToString) -> Self {
        Self::Malformed { origin: origin.to_string(), details: details.to_string() }
    }
}
