use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZohoError>;

/// Error type returned by our library.
#[derive(Debug, Error)]
pub enum ZohoError {
    /// One of the client ID, client secret or refresh token was not supplied.
    #[error("Client ID, secret and refresh token are all required: missing {0}")]
    MissingCredential(&'static str),
    #[error("Invalid Zoho datacenter: {0:?}")]
    InvalidDataCenter(String),
    /// A refresh was required and Zoho did not hand back an access token.
    #[error("Could not obtain client access token from Zoho")]
    TokenUnavailable,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("Zoho client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}
