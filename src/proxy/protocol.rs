//! Guest-visible return convention.
//!
//! A proxied call reaches the guest as a signed value plus an errno. On
//! success the value is the operation's result and errno is 0. On failure
//! the value is -1 and errno comes from [`Error::errno`].
//!
//! Socket addresses cross the boundary as raw `sockaddr` bytes in host
//! layout; [`sockaddr_in`] and [`parse_sockaddr_in`] build and read the
//! IPv4 form.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{Error, Result};

/// Value returned to the guest on failure.
pub const GUEST_FAILURE: i64 = -1;

/// The `(value, errno)` pair handed back to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestReturn {
    pub value: i64,
    pub errno: i32,
}

impl GuestReturn {
    pub fn success(value: i64) -> Self {
        Self { value, errno: 0 }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            value: GUEST_FAILURE,
            errno: err.errno(),
        }
    }

    /// Translate an operation result.
    pub fn from_result<T: Into<i64>>(result: &Result<T>) -> Self
    where
        T: Copy,
    {
        match result {
            Ok(value) => Self::success((*value).into()),
            Err(err) => Self::failure(err),
        }
    }

    /// Translate a byte-count result from send or recv.
    pub fn from_len(result: &Result<usize>) -> Self {
        match result {
            // Bounded by max_transfer, which always fits.
            Ok(n) => Self::success(*n as i64),
            Err(err) => Self::failure(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.value != GUEST_FAILURE
    }

    /// The value truncated to the 32-bit register width the guest ABI uses.
    pub fn as_i32(&self) -> i32 {
        self.value as i32
    }
}

impl<T: Into<i64> + Copy> From<Result<T>> for GuestReturn {
    fn from(result: Result<T>) -> Self {
        Self::from_result(&result)
    }
}

/// Build a host-layout `sockaddr_in` for `addr`.
pub fn sockaddr_in(addr: SocketAddrV4) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    {
        sa.sin_len = std::mem::size_of::<libc::sockaddr_in>() as u8;
    }
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr.s_addr = u32::from_ne_bytes(addr.ip().octets());
    sa
}

/// The raw bytes of [`sockaddr_in`], as a guest would lay them out.
pub fn sockaddr_in_bytes(addr: SocketAddrV4) -> Vec<u8> {
    let sa = sockaddr_in(addr);
    // SAFETY: reading the bytes of a plain C struct.
    let bytes = unsafe {
        std::slice::from_raw_parts(
            &sa as *const libc::sockaddr_in as *const u8,
            std::mem::size_of::<libc::sockaddr_in>(),
        )
    };
    bytes.to_vec()
}

/// Decode an IPv4 address from raw `sockaddr` bytes.
///
/// Returns `None` if the bytes are too short or not `AF_INET`.
pub fn parse_sockaddr_in(bytes: &[u8]) -> Option<SocketAddrV4> {
    if bytes.len() < std::mem::size_of::<libc::sockaddr_in>() {
        return None;
    }
    // SAFETY: length checked above; read_unaligned tolerates any alignment.
    let sa: libc::sockaddr_in =
        unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const libc::sockaddr_in) };
    if sa.sin_family as i32 != libc::AF_INET {
        return None;
    }
    let ip = Ipv4Addr::from(sa.sin_addr.s_addr.to_ne_bytes());
    Some(SocketAddrV4::new(ip, u16::from_be(sa.sin_port)))
}
