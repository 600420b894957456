//! Server error types.

use std::fmt;

use cryptoserver_crypto::CryptoError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unreadable settings file, invalid key material,
    /// bad port, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, I/O error, etc.).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Internal error (OS RNG failure, unexpected state, logic bug).
    ///
    /// Should never happen in correct implementation. Indicates a bug or a
    /// broken host.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<CryptoError> for ServerError {
    fn from(err: CryptoError) -> Self {
        Self::Config(err.to_string())
    }
}
