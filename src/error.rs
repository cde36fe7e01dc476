//! Error kinds. Each subsystem boundary converts into one of these variants
//! rather than letting a subsystem-local error type leak; the IPC layer and
//! the command interpreter both need a single enum they can format
//! uniformly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("invalid command: {0}")]
    CommandInvalid(String),

    #[error("command failed: {0}")]
    CommandFailure(String),

    #[error("tree invariant violated: {0}")]
    TreeInvariant(String),

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("ipc protocol error: {0}")]
    IpcProtocol(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raises a `TreeInvariant` violation. In debug builds this panics via
/// `debug_assert!` so the bug surfaces immediately in tests; in release
/// builds the caller receives an `Err` and must abort the mutation that
/// triggered it, leaving the tree unchanged.
#[macro_export]
macro_rules! tree_invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            debug_assert!($cond, $($arg)*);
            return Err($crate::error::Error::TreeInvariant(format!($($arg)*)));
        }
    };
}
