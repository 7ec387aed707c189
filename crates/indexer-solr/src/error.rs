//! Error types for the Solr clients.

use thiserror::Error;

/// Errors from the Solr HTTP clients.
#[derive(Debug, Error)]
pub enum SolrError {
    /// Connection-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Solr answered with a non-success HTTP status
    #[error("Solr returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Unexpected Solr response: {0}")]
    Parse(String),

    /// Admin operation reported a failure in its response body
    #[error("Solr admin operation failed: {0}")]
    Admin(String),

    /// A config set needed uploading but no file was configured
    #[error("Config set file not configured for '{0}'")]
    MissingConfigFile(String),

    /// Local I/O failure while reading a config set archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SolrError {
    fn from(err: reqwest::Error) -> Self {
        SolrError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for SolrError {
    fn from(err: serde_json::Error) -> Self {
        SolrError::Parse(err.to_string())
    }
}
