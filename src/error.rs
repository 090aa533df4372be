use std::fmt;

use serde::Deserialize;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HranaError {
    /// The transport collaborator failed to connect, send or receive.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Connection-level failure detected by the session itself.
    #[error("connection error: {0}")]
    Connection(String),
    /// The server did not agree on the requested websocket sub-protocol.
    #[error("unsupported server protocol: expected '{expected}', negotiated {negotiated:?}")]
    VersionMismatch {
        expected: &'static str,
        /// Sub-protocol the server answered with, when the transport reports it.
        negotiated: Option<String>,
    },
    /// The server rejected the `hello` message.
    #[error("authentication failed: {}", render_message(message, code.as_deref()))]
    Auth {
        message: String,
        code: Option<String>,
    },
    /// The session was disconnected; no further requests can be issued on it.
    #[error("session is closed")]
    Closed,
    /// The server sent a message this client does not understand, or a message
    /// of the wrong kind for the request that was issued.
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// A frame could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// SQL or stream error reported by the server.
    #[error("server error: {}", render_message(message, code.as_deref()))]
    Server {
        message: String,
        /// Engine-specific error code, when the server sends one.
        code: Option<String>,
    },
    /// The caller passed something that can never be sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl HranaError {
    #[cfg(feature = "websocket")]
    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }

    /// Returns `true` for failures after which the session cannot be used.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Connection(_)
                | Self::VersionMismatch { .. }
                | Self::Auth { .. }
                | Self::Closed
        )
    }
}

/// Error object carried by `hello_error`, `response_error` and batch step errors.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl ServerError {
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Converts the recorded error into a domain failure.
    pub fn into_error(self) -> HranaError {
        HranaError::Server {
            message: self.message,
            code: self.code,
        }
    }

    pub(crate) fn into_auth_error(self) -> HranaError {
        HranaError::Auth {
            message: self.message,
            code: self.code,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_message(&self.message, self.code.as_deref()))
    }
}

fn render_message(message: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("{message} ({code})"),
        None => message.to_owned(),
    }
}
