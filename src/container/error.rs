use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a container operation.
///
/// Whether an operation may be retried with another password is decided only
/// by [`ContainerError::is_retryable`]; lower layers never make that call.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The bytes do not form a valid container: unknown magic, truncated
    /// header, inconsistent chunk arithmetic, or a region that overruns or
    /// underruns the file.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// A chunk tag did not verify. A wrong password and corrupted ciphertext
    /// are deliberately indistinguishable.
    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ContainerError {
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// Maps an early end of input to [`ContainerError::Malformed`].
    ///
    /// Used while parsing fixed-size structures, where running out of bytes
    /// means the file is truncated rather than unreadable.
    pub(crate) fn truncated(what: &str) -> impl FnOnce(io::Error) -> Self + '_ {
        move |err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Malformed(format!("truncated {what}")),
            _ => Self::Io(err),
        }
    }
}
