use thiserror::Error;

/// Errors from the library API client.
///
/// Only transport-level problems appear here. Status codes and malformed bodies are carried in
/// [crate::types::ApiResponse] because the workflow treats them as branch conditions.
#[derive(Error, Debug)]
pub enum LibraryApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
