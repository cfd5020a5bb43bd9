use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// 項目已從媒體庫移除
    #[error("catalog item not found: {0}")]
    NotFound(String),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: StatusCode, url: String },
    #[error("Invalid catalog response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CatalogError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
