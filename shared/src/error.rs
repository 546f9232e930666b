use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::HttpError;

/// Longest server-provided message we surface verbatim.
const MAX_SERVER_MESSAGE_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
    Status,
    Network,
    Decode,
    InvalidRequest,
    Config,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Server => "SERVER_ERROR",
            Self::Status => "HTTP_STATUS",
            Self::Network => "NETWORK_ERROR",
            Self::Decode => "DECODE_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Config => "CONFIG_ERROR",
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::Server,
            _ => Self::Status,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    server_message: bool,
    internal_message: Option<String>,
    context: BTreeMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            server_message: false,
            internal_message: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Maps a non-2xx response to a domain error. The message comes from the
    /// body when the server supplied one.
    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let kind = ErrorKind::from_status(status);
        let (message, server_message) = match extract_server_message(body) {
            Some(message) => (message, true),
            None => (format!("Request failed with status {status}"), false),
        };

        Self {
            kind,
            message,
            status: Some(status),
            server_message,
            internal_message: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Text the UI can show as-is: the server's own wording when present,
    /// otherwise a generic sentence for the error kind.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        if self.server_message {
            return self.message.clone();
        }
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Unauthorized => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Forbidden => "You don't have permission to perform this action.".into(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::BadRequest | ErrorKind::InvalidRequest => self.message.clone(),
            ErrorKind::Server | ErrorKind::Status => {
                "The server could not complete the request. Please try again later.".into()
            }
            ErrorKind::Decode | ErrorKind::Config => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let kind = if e.is_network() {
            ErrorKind::Network
        } else if matches!(
            e,
            HttpError::InvalidResponse { .. } | HttpError::ResponseTooLarge { .. }
        ) {
            ErrorKind::Decode
        } else {
            ErrorKind::InvalidRequest
        };
        let mut error = Self::new(kind, e.to_string());
        if let Some(request_id) = e.request_id() {
            error = error.with_context("request_id", request_id);
        }
        error
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Pulls a human-readable message out of an error body.
///
/// Looks at `detail`, `error` and `message` first, then falls back to the
/// first field error of a validation map such as `{"email": ["taken"]}`.
pub fn extract_server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let message = match &value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["detail", "error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(first_text))
            .or_else(|| {
                map.iter().find_map(|(field, v)| {
                    first_text(v).map(|text| {
                        if field == "non_field_errors" {
                            text
                        } else {
                            format!("{field}: {text}")
                        }
                    })
                })
            }),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }?;

    let message = message.trim().to_string();
    if message.is_empty() {
        return None;
    }
    Some(truncate(message))
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(map) => ["detail", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(first_text)),
        _ => None,
    }
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_SERVER_MESSAGE_LEN {
        let mut end = MAX_SERVER_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}
