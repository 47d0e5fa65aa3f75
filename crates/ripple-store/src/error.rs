use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, timed out, or failing server-side. Callers
    /// recover by switching to the local store.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Corrupt(e.to_string());
        }
        if e.is_builder() {
            return Self::Other(e.into());
        }
        match e.status() {
            Some(status) if status.is_client_error() => Self::Rejected {
                status: status.as_u16(),
                body: e.to_string(),
            },
            // connect, timeout, body and 5xx errors
            _ => Self::Unavailable(e.to_string()),
        }
    }
}
