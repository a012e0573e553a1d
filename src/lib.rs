//! # guestsock
//!
//! Host-side socket syscall proxy for microVM guests.
//!
//! Guest code issues socket calls through a hypercall. The dispatcher hands
//! each call to a [`SocketProxy`], which performs the real host socket call,
//! copies addresses and payloads across the guest/host boundary, and
//! returns a [`Result`] that [`GuestReturn`] turns into the guest-visible
//! `(value, errno)` pair.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guestsock::{GuestRam, GuestReturn, LibcSockets, SocketProxy};
//!
//! fn main() -> guestsock::Result<()> {
//!     let mut ram = GuestRam::new(0x4000_0000, 64 * 1024)?;
//!     let mut proxy = SocketProxy::builder().build(LibcSockets)?;
//!
//!     let handle = proxy.open(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
//!     let ret = GuestReturn::from_len(&proxy.recv(&mut ram, handle, 0x4000_0000, 512, 0));
//!     println!("recv -> {} (errno {})", ret.value, ret.errno);
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Support
//!
//! Unix hosts (Linux, macOS), through `libc`.

mod builder;
pub mod debug;
mod error;

pub mod memory;
pub mod proxy;

// Re-exports
pub use builder::{ProxyBuilder, ProxyConfig};
pub use error::{Error, Result};
pub use memory::{GuestMemory, GuestRam, Pod};
pub use proxy::protocol::{parse_sockaddr_in, sockaddr_in_bytes};
pub use proxy::{DescriptorTable, GuestReturn, Handle, HostSockets, LibcSockets, SocketProxy};

/// Default capacities, re-exported for dispatchers that size guest buffers.
pub mod limits {
    pub use crate::builder::{
        DEFAULT_MAX_ADDR_LEN, DEFAULT_MAX_DESCRIPTORS, DEFAULT_MAX_TRANSFER, SOCKADDR_STORAGE_LEN,
    };
}
