use std::io;

use thiserror::Error;

/// Advisory recovery hint attached to every failure.
///
/// The library never acts on these itself; they are a contract for callers
/// building recovery loops above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restartability {
    /// Unrecoverable (refused connection, refused credentials).
    Abort,
    /// Drop the connection and establish a new one.
    Reconnect,
    /// Transient per-message anomaly; skip it and try again.
    Retry,
}

/// Transport-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionKind {
    /// The connection is already closed, or became closed mid-operation.
    #[error("connection closed")]
    Closed,
    /// The transport refused the connection at open time.
    #[error("connection refused")]
    Refused,
    /// The server answered the handshake with `ERROR message: access_refused`.
    #[error("access refused by server")]
    AccessRefused,
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Connection(ConnectionKind),
    /// An unexpected frame shape: wrong command after CONNECT or inside a
    /// receipt wait, or a MESSAGE with no message-id at the head of a receive.
    /// Carries a rendering of the offending frame.
    #[error("unexpected frame: {0}")]
    Protocol(String),
    /// Reserved; not produced by the current client.
    #[error("node error: {0}")]
    Node(String),
}

/// Error type for every fallible operation in the crate.
#[derive(Debug, Error)]
#[error("{context}: {kind}")]
pub struct StompError {
    pub restartability: Restartability,
    pub kind: ErrorKind,
    pub context: String,
}

impl StompError {
    pub(crate) fn closed(context: impl Into<String>) -> Self {
        StompError {
            restartability: Restartability::Reconnect,
            kind: ErrorKind::Connection(ConnectionKind::Closed),
            context: context.into(),
        }
    }

    pub(crate) fn access_refused(context: impl Into<String>) -> Self {
        StompError {
            restartability: Restartability::Abort,
            kind: ErrorKind::Connection(ConnectionKind::AccessRefused),
            context: context.into(),
        }
    }

    pub(crate) fn protocol(context: impl Into<String>, frame: impl Into<String>) -> Self {
        StompError {
            restartability: Restartability::Reconnect,
            kind: ErrorKind::Protocol(frame.into()),
            context: context.into(),
        }
    }

    pub(crate) fn protocol_retry(context: impl Into<String>, frame: impl Into<String>) -> Self {
        StompError {
            restartability: Restartability::Retry,
            kind: ErrorKind::Protocol(frame.into()),
            context: context.into(),
        }
    }

    /// True for all transport-level kinds; `disconnect` swallows these.
    pub fn is_connection_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Connection(_))
    }
}

impl From<io::Error> for StompError {
    fn from(e: io::Error) -> Self {
        let kind = if e.kind() == io::ErrorKind::ConnectionRefused {
            ConnectionKind::Refused
        } else {
            ConnectionKind::Closed
        };
        StompError {
            restartability: match kind {
                ConnectionKind::Refused => Restartability::Abort,
                _ => Restartability::Reconnect,
            },
            kind: ErrorKind::Connection(kind),
            context: format!("transport I/O: {e}"),
        }
    }
}
