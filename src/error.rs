//! Error types for nyt_corpus.
//!
//! A single [`Error`] enum covers every failure the pipeline can hit. The
//! corpus builder decides per variant whether a failure is fatal (credential
//! loading, merging) or only costs the current month.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nyt_corpus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nyt_corpus
#[derive(Debug, Error)]
pub enum Error {
    /// The API key file does not exist
    #[error("API key file not found: {}", .path.display())]
    CredentialMissing {
        /// Path that was looked up
        path: PathBuf,
    },

    /// The API key file exists but could not be used
    #[error("failed to read API key file {}: {source}", .path.display())]
    Credential {
        /// Path of the key file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A single request was answered with HTTP 429
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// Every retry of a unit was answered with HTTP 429
    #[error("rate limit still exceeded for {year}-{month} after {attempts} attempts")]
    RateLimitExceeded {
        /// Year of the unit
        year: i32,
        /// Month of the unit
        month: u32,
        /// Number of requests issued
        attempts: usize,
    },

    /// Non-success HTTP status other than 429
    #[error("HTTP error {status}: {message}")]
    Http {
        /// Status code returned by the API
        status: u16,
        /// Response body (truncated)
        message: String,
    },

    /// Transport or body decoding failure. The request URL is stripped
    /// because its query string carries the API key.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request URL could not be built
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The archive response is missing an expected field
    #[error("malformed response: missing or invalid `{field}`{}", document_suffix(.index))]
    MalformedResponse {
        /// Index of the offending document, if the failure is document-scoped
        index: Option<usize>,
        /// Dotted path of the field
        field: &'static str,
    },

    /// Delimited file encoding or decoding failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn document_suffix(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" in document {i}"),
        None => String::new(),
    }
}

impl Error {
    /// Only a bare rate-limit response is worth retrying. Every other HTTP
    /// failure is treated as persistent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited)
    }
}

/// Errors raised by the delimited file codec
#[derive(Debug, Error)]
pub enum CodecError {
    /// Nothing to write, so no header can be derived
    #[error("no records to write")]
    EmptyInput,

    /// The separator must be at least one character
    #[error("separator must not be empty")]
    EmptySeparator,

    /// The placeholder byte already appears in the file being read
    #[error("placeholder byte 0xFF found in {}", .path.display())]
    PlaceholderInInput {
        /// File being read
        path: PathBuf,
    },

    /// A field value contains the separator and would be split on read
    #[error("field `{field}` of record {row} contains the separator")]
    SeparatorCollision {
        /// Zero-based record index
        row: usize,
        /// Field name
        field: String,
    },

    /// CSV parse or serialization failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The finished temporary file could not be moved into place
    #[error("failed to persist {}: {source}", .path.display())]
    Persist {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limited_is_retryable() {
        assert!(Error::RateLimited.is_retryable());
        assert!(
            !Error::Http {
                status: 500,
                message: "boom".to_string()
            }
            .is_retryable()
        );
        assert!(
            !Error::RateLimitExceeded {
                year: 2020,
                month: 1,
                attempts: 11
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_malformed_response_message_names_document() {
        let e = Error::MalformedResponse {
            index: Some(3),
            field: "headline.main",
        };
        assert_eq!(
            e.to_string(),
            "malformed response: missing or invalid `headline.main` in document 3"
        );

        let e = Error::MalformedResponse {
            index: None,
            field: "response.docs",
        };
        assert_eq!(
            e.to_string(),
            "malformed response: missing or invalid `response.docs`"
        );
    }
}
