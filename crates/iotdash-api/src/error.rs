use thiserror::Error;

/// Top-level error type for the `iotdash-api` crate.
///
/// Every failure the backend or the transport can produce is folded into
/// one of these variants before it leaves the client. `iotdash-core`
/// mirrors them for its callers.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// No response was received (connection refused, DNS failure, reset).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request exceeded its deadline, or the server answered 408/504.
    #[error("Request timed out")]
    Timeout,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Backend responses ───────────────────────────────────────────
    /// 404 from the backend.
    #[error("Not found{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    NotFound { message: Option<String> },

    /// 400 or 422 from the backend. Carries the server's `error` text.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Any other non-2xx status.
    #[error("Server error (HTTP {status}){}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Server { status: u16, message: Option<String> },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Push channel ────────────────────────────────────────────────
    /// Websocket handshake failed or the connection errored.
    #[error("Push channel connection failed: {0}")]
    PushConnect(String),

    /// Handshake did not complete in time.
    #[error("Push channel handshake timed out after {timeout_secs}s")]
    PushHandshakeTimeout { timeout_secs: u64 },

    /// Websocket closed by the server.
    #[error("Push channel closed (code {code}): {reason}")]
    PushClosed { code: u16, reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Deserialization {
                message: err.to_string(),
                body: String::new(),
            }
        } else {
            Self::Network(err)
        }
    }
}

impl Error {
    /// Build the error for a non-2xx status and the server-supplied message.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            404 => Self::NotFound { message },
            400 | 422 => Self::Validation {
                message: message.unwrap_or_else(|| "The request was rejected".into()),
            },
            408 | 504 => Self::Timeout,
            _ => Self::Server { status, message },
        }
    }

    /// HTTP status associated with this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::PushConnect(_) => true,
            Self::PushHandshakeTimeout { .. } | Self::PushClosed { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Text suitable for showing next to a form or in a status line.
    ///
    /// Prefers the backend's own `error` message and falls back to a
    /// generic sentence per category.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Unable to reach the server. Check your connection.".into(),
            Self::Timeout => "The server took too long to respond.".into(),
            Self::InvalidUrl(_) | Self::ClientBuild(_) => {
                "The backend address is not configured correctly.".into()
            }
            Self::NotFound { message } => message
                .clone()
                .unwrap_or_else(|| "The requested item no longer exists.".into()),
            Self::Validation { message } => message.clone(),
            Self::Server { message, .. } => message
                .clone()
                .unwrap_or_else(|| "The server encountered an error. Please try again.".into()),
            Self::Deserialization { .. } => "The server sent an unexpected response.".into(),
            Self::PushConnect(_) | Self::PushHandshakeTimeout { .. } | Self::PushClosed { .. } => {
                "Live updates are unavailable.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(Error::from_status(404, None).is_not_found());
        assert!(matches!(
            Error::from_status(422, Some("name required".into())),
            Error::Validation { ref message } if message == "name required"
        ));
        assert!(matches!(Error::from_status(400, None), Error::Validation { .. }));
        assert!(matches!(Error::from_status(504, None), Error::Timeout));
        assert!(matches!(
            Error::from_status(500, None),
            Error::Server { status: 500, message: None }
        ));
    }

    #[test]
    fn user_message_prefers_server_text() {
        let err = Error::from_status(500, Some("Relay 3 is offline".into()));
        assert_eq!(err.user_message(), "Relay 3 is offline");

        let err = Error::from_status(503, None);
        assert_eq!(
            err.user_message(),
            "The server encountered an error. Please try again."
        );
        assert!(err.is_transient());
    }

    #[test]
    fn validation_is_not_transient() {
        let err = Error::from_status(400, Some("bad pin".into()));
        assert!(!err.is_transient());
        assert_eq!(err.status(), None);
    }
}
