//! Error types for guestsock.

use std::io;
use thiserror::Error;

/// Result type alias using guestsock's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that a proxied socket operation can produce.
///
/// Every variant maps onto a single guest-visible errno via [`Error::errno`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Descriptor table errors
    #[error("no free descriptor slot")]
    NoFreeDescriptor,

    #[error("invalid socket handle: {0}")]
    InvalidHandle(i32),

    // Staging bounds
    #[error("address length {len} exceeds staging capacity {max}")]
    AddressTooLarge { len: usize, max: usize },

    #[error("transfer length {len} exceeds staging capacity {max}")]
    BufferTooLarge { len: usize, max: usize },

    // Host errors
    #[error("non-blocking setup failed at {step}: errno {errno}")]
    ConfigurationFailed { step: &'static str, errno: i32 },

    #[error("host {op} failed: errno {errno}")]
    HostOperationFailed { op: &'static str, errno: i32 },

    // Memory errors
    #[error("invalid guest address: 0x{0:x}")]
    InvalidGuestAddress(u64),

    // Configuration errors
    #[error("invalid proxy configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a host failure from an I/O error returned by a host primitive.
    pub fn from_host(op: &'static str, err: &io::Error) -> Self {
        Error::HostOperationFailed {
            op,
            errno: err.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// The errno the guest observes for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NoFreeDescriptor => libc::ENOTSOCK,
            Error::InvalidHandle(_) => libc::EBADF,
            Error::AddressTooLarge { .. } | Error::BufferTooLarge { .. } => libc::ENOMEM,
            Error::ConfigurationFailed { errno, .. } => *errno,
            Error::HostOperationFailed { errno, .. } => *errno,
            Error::InvalidGuestAddress(_) => libc::EFAULT,
            Error::InvalidConfig(_) => libc::EINVAL,
        }
    }

    /// Whether the host reported that the operation would block.
    ///
    /// The guest sees this as an ordinary failure; it exists for host-side
    /// callers that want to log or poll differently.
    pub fn is_would_block(&self) -> bool {
        match self {
            Error::HostOperationFailed { errno, .. } => {
                *errno == libc::EAGAIN || *errno == libc::EWOULDBLOCK
            }
            _ => false,
        }
    }
}
