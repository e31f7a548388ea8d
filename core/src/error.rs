//! Error types for the rental store client.
//!
//! # Design
//! `NotConfigured` is checked before anything touches the network, so it
//! gets its own variant. Every rejection coming back from the backend (and
//! every transport failure) lands in `Store` with the backend's own detail
//! left untouched. `NotFound` is reserved for lookups in caller-supplied
//! data; the REST backend never produces it.

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by `RentalClient` parse methods and the store workflows.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No endpoint URL or access key was configured.
    #[error("backend not configured")]
    NotConfigured,

    /// The backend rejected the call, or it never reached the backend.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A referenced record is absent from the data supplied by the caller.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A computed amount does not fit in a `Decimal`.
    #[error("amount out of range: {0}")]
    AmountOverflow(String),
}

/// Detail of a failed backend call.
///
/// `status` is `None` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error{}: {message}", status_suffix(.status))]
pub struct StoreError {
    pub status: Option<u16>,
    pub message: String,
    pub code: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Error body as sent by PostgREST.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl StoreError {
    /// Build from a non-success response. Structured error bodies are
    /// unpacked; anything else is kept verbatim as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => Self {
                status: Some(status),
                message: err.message,
                code: err.code,
                details: err.details,
                hint: err.hint,
            },
            Err(_) => Self {
                status: Some(status),
                message: body.to_string(),
                code: None,
                details: None,
                hint: None,
            },
        }
    }

    /// The request never produced a response (connection refused, DNS, TLS...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            code: None,
            details: None,
            hint: None,
        }
    }
}
