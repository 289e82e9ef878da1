//! Result contract shared by every core boundary.
//!
//! A request either produces its data or a [`Failure`] carrying a stable
//! [`ErrorCode`]. Inner codes are never re-labelled by outer layers: whatever
//! code the store or the provider reports is the code the caller sees.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Outcome<T> = Result<T, Failure>;

/// Closed error taxonomy surfaced to callers as `err_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No usable image was supplied.
    InvalidImage,
    /// The referenced token is unknown or expired.
    ImageNotFound,
    ProviderError,
    ProviderTimeout,
    MalformedResponse,
    StorageError,
    StorageTimeout,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidImage => "INVALID_IMAGE",
            ErrorCode::ImageNotFound => "IMAGE_NOT_FOUND",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::ProviderTimeout => "PROVIDER_TIMEOUT",
            ErrorCode::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::StorageTimeout => "STORAGE_TIMEOUT",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure branch of the result contract.
///
/// `message` is safe to show to a user or write to logs. Anything closer to
/// the transport (status lines, reqwest errors) belongs in `details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Failure {
    pub message: String,
    #[serde(rename = "err_code")]
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl fmt::Display) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn invalid_image() -> Self {
        Self::new(ErrorCode::InvalidImage, "No image was provided.")
    }

    pub fn image_not_found() -> Self {
        Self::new(
            ErrorCode::ImageNotFound,
            "The referenced image has expired or does not exist. Please capture it again.",
        )
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }
}
