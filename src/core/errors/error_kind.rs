// Shared error classification.
//
// Every domain keeps its own thiserror enum, but the Discord layer (and the
// tests) only need to know which *kind* of failure happened so it can decide
// how to phrase the reply.

use std::fmt;

/// Coarse classification of a failed core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller passed a value outside the accepted range. No state changed.
    InvalidArgument,
    /// A guild asked for a second simultaneous voice connection. No state changed.
    ChannelConflict,
    /// The lookup target does not exist. No state changed.
    NotFound,
    /// The platform rejected an outbound call (role grant, connect, disconnect).
    ExternalCallFailed,
    /// The backing store failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::ChannelConflict => "channel conflict",
            ErrorKind::NotFound => "not found",
            ErrorKind::ExternalCallFailed => "external call failed",
            ErrorKind::Storage => "storage error",
        };
        f.write_str(label)
    }
}

/// Implemented by every domain error so callers can branch on the kind.
pub trait Classified {
    fn kind(&self) -> ErrorKind;
}
