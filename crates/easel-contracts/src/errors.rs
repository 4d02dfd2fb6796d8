use thiserror::Error;

/// Failure taxonomy for one generation attempt. Adapters never catch and
/// continue; every variant aborts the attempt and reaches the caller intact
/// so it can decide about retries and refunds.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("model '{0}' not found")]
    NotFound(String),

    #[error("{0} is disabled")]
    Disabled(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported channel type '{0}'")]
    UnsupportedProvider(String),

    #[error("{provider} request failed ({status}): {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider}: {}", .message.as_deref().unwrap_or("response contained no image"))]
    EmptyResult {
        provider: &'static str,
        message: Option<String>,
    },

    #[error("{provider} requires a reference image")]
    MissingInput { provider: &'static str },

    #[error("reference image upload failed: {0}")]
    Upload(String),

    #[error("{provider} task did not finish within {attempts} polls")]
    Timeout {
        provider: &'static str,
        attempts: usize,
    },
}

impl GenerateError {
    pub fn empty(provider: &'static str) -> Self {
        Self::EmptyResult {
            provider,
            message: None,
        }
    }

    pub fn refused(provider: &'static str, message: impl Into<String>) -> Self {
        Self::EmptyResult {
            provider,
            message: Some(message.into()),
        }
    }
}
