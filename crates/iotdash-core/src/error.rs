// ── Core error types ──
//
// What the sync layer reports to its consumers. Transport failures from
// `iotdash_api` are folded into the categories a dashboard can act on:
// network, timeout, not found, validation, server and decode.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Backend reachability ─────────────────────────────────────────
    /// No response arrived (refused, reset, DNS failure).
    #[error("Cannot reach the backend: {reason}")]
    Network { reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Backend answers ──────────────────────────────────────────────
    #[error("Not found{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    NotFound { message: Option<String> },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Backend error (HTTP {status}){}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Server { status: u16, message: Option<String> },

    /// The backend answered 2xx with a body we could not read.
    #[error("Unexpected response: {message}")]
    Decode { message: String },

    // ── Push channel ─────────────────────────────────────────────────
    /// The server reported a failure for a pushed collection.
    #[error("Push update failed: {message}")]
    PushRejected { message: String },

    #[error("Push channel unavailable: {reason}")]
    PushUnavailable { reason: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Sync controller is not running")]
    NotStarted,

    #[error("Sync controller has shut down")]
    ShutDown,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<iotdash_api::Error> for CoreError {
    fn from(err: iotdash_api::Error) -> Self {
        use iotdash_api::Error as Api;

        match err {
            Api::Network(e) => CoreError::Network {
                reason: e.to_string(),
            },
            Api::Timeout => CoreError::Timeout,
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid backend URL: {e}"),
            },
            Api::ClientBuild(message) => CoreError::Config { message },
            Api::NotFound { message } => CoreError::NotFound { message },
            Api::Validation { message } => CoreError::Validation { message },
            Api::Server { status, message } => CoreError::Server { status, message },
            Api::Deserialization { message, .. } => CoreError::Decode { message },
            e @ (Api::PushConnect(_) | Api::PushHandshakeTimeout { .. } | Api::PushClosed { .. }) => {
                CoreError::PushUnavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The backend could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Worth retrying without user intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout | Self::PushUnavailable { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text suitable for a status line or a form error.
    ///
    /// Validation failures carry the backend's message verbatim; every
    /// other category falls back to a generic sentence when the backend
    /// said nothing useful.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => "Unable to reach the server. Check your connection.".into(),
            Self::Timeout => "The server took too long to respond.".into(),
            Self::NotFound { message } => message
                .clone()
                .unwrap_or_else(|| "The requested item no longer exists.".into()),
            Self::Validation { message } | Self::PushRejected { message } => message.clone(),
            Self::Server { message, .. } => message
                .clone()
                .unwrap_or_else(|| "The server encountered an error. Please try again.".into()),
            Self::Decode { .. } => "The server sent an unexpected response.".into(),
            Self::PushUnavailable { .. } => "Live updates are unavailable.".into(),
            Self::NotStarted | Self::ShutDown => "The dashboard is not connected.".into(),
            Self::Config { message } => message.clone(),
            Self::Internal(_) => "Something went wrong.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_their_category() {
        let err = CoreError::from(iotdash_api::Error::from_status(404, None));
        assert!(err.is_not_found());

        let err = CoreError::from(iotdash_api::Error::from_status(
            422,
            Some("GPIO pin already in use".into()),
        ));
        assert_eq!(err.user_message(), "GPIO pin already in use");

        let err = CoreError::from(iotdash_api::Error::Timeout);
        assert!(err.is_connectivity());
        assert!(err.is_transient());
    }

    #[test]
    fn server_error_without_message_uses_fallback() {
        let err = CoreError::Server {
            status: 500,
            message: None,
        };
        assert_eq!(
            err.user_message(),
            "The server encountered an error. Please try again."
        );
        assert!(err.is_transient());
    }

    #[test]
    fn validation_is_not_transient() {
        let err = CoreError::Validation {
            message: "name required".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_connectivity());
    }
}
