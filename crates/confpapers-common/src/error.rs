use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfPapersError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Fetch failed for {url} after {attempts} attempt(s): {last}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<ConfPapersError>,
    },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConfPapersError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Connection failures, timeouts, body read errors and every non-2xx
    /// response are transient. A request reqwest refuses to build (bad URL)
    /// fails the same way every time and is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ConfPapersError::Http(e) => !e.is_builder(),
            ConfPapersError::Transport(_) | ConfPapersError::Status { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfPapersError>;
