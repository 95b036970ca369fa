//! Error types for the storefront API client.
//!
//! # Design
//! `MissingAuthToken` gets a dedicated variant because the failure router
//! must recognise it and stay silent: public pages routinely call
//! authenticated endpoints before anyone has logged in. Every other non-2xx
//! response lands in `Http` with the numeric status and the message extracted
//! from the response body.

use thiserror::Error;

/// Classification code carried by an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// An authenticated request was attempted without a stored token.
    NoAuthToken,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoAuthToken => "NO_AUTH_TOKEN",
        }
    }
}

/// Failures raised by a [`Transport`](crate::Transport) before any HTTP
/// status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Errors returned by the dispatcher and the search helper.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request requires authentication and no token is stored.
    #[error("NO_AUTH_TOKEN")]
    MissingAuthToken,

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A method string did not name a supported HTTP method.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),
}

impl ApiError {
    /// HTTP status attached to the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiError::MissingAuthToken => Some(ErrorCode::NoAuthToken),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
