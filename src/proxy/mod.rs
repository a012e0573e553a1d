//! Guest socket syscall proxy.
//!
//! The guest issues socket calls through a hypercall; the dispatcher hands
//! them to a [`SocketProxy`], which performs the real host call on the
//! guest's behalf.
//!
//! # Architecture
//!
//! ```text
//! Guest                          Host
//! ┌─────────────────┐           ┌──────────────────────────┐
//! │ Application     │           │ SocketProxy              │
//! │      │          │ hypercall │  ┌─────────────────────┐ │
//! │      ▼          │──────────▶│  │ DescriptorTable     │ │──▶ host sockets
//! │ socket(), ...   │           │  │ handle -> host fd   │ │
//! │                 │◀──────────│  └─────────────────────┘ │
//! └─────────────────┘  copies   │  staging buffers         │
//!                               └──────────────────────────┘
//! ```
//!
//! The guest only ever sees handles, which are slot indices in the table.
//! Addresses and payloads are copied through fixed-capacity staging buffers
//! after their lengths are checked against [`ProxyConfig`].
//!
//! Every host descriptor is switched to non-blocking mode as soon as it
//! enters the table. Nothing is retried: a call that would block fails with
//! the host's `EAGAIN`, and the guest is expected to poll.

pub mod host;
pub mod protocol;
pub mod table;

pub use host::{HostSockets, LibcSockets};
pub use protocol::GuestReturn;
pub use table::{DescriptorTable, Handle};

use std::io;
use std::os::unix::io::RawFd;

use crate::builder::{ProxyBuilder, ProxyConfig};
use crate::debug_io;
use crate::error::{Error, Result};
use crate::memory::GuestMemory;

/// Host-side socket proxy for one guest.
///
/// Owns the descriptor table and the staging buffers. All operations take
/// `&mut self`; a host that dispatches guest calls from several threads must
/// put the proxy behind a `Mutex`.
///
/// Dropping the proxy closes every host descriptor still in the table.
pub struct SocketProxy<H: HostSockets> {
    host: H,
    table: DescriptorTable,
    config: ProxyConfig,
    /// Address staging, `max_addr_len` bytes.
    addr_buf: Vec<u8>,
    /// Data staging, `max_transfer` bytes.
    data_buf: Vec<u8>,
}

impl SocketProxy<LibcSockets> {
    /// Create a proxy over the host's libc with default capacities.
    pub fn new() -> Self {
        Self::with_config(LibcSockets, ProxyConfig::default())
    }

    /// Create a builder for configuring a proxy.
    pub fn builder() -> ProxyBuilder {
        ProxyBuilder::new()
    }
}

impl Default for SocketProxy<LibcSockets> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostSockets> SocketProxy<H> {
    /// `config` must already be validated; [`ProxyBuilder`] does that.
    pub(crate) fn with_config(host: H, config: ProxyConfig) -> Self {
        Self {
            host,
            table: DescriptorTable::new(config.max_descriptors),
            addr_buf: vec![0; config.max_addr_len],
            data_buf: vec![0; config.max_transfer],
            config,
        }
    }

    /// The capacities this proxy enforces.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The descriptor table.
    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    /// The host socket service.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Create a host socket and return its handle.
    ///
    /// `domain`, `ty` and `protocol` go to the host unchanged.
    pub fn open(&mut self, domain: i32, ty: i32, protocol: i32) -> Result<Handle> {
        let index = self.table.find_free_slot()?;
        let fd = self
            .host
            .socket(domain, ty, protocol)
            .map_err(|e| Error::from_host("socket", &e))?;
        let handle = self.adopt(index, fd)?;
        debug_io!("open({}, {}, {}) -> handle {}", domain, ty, protocol, handle);
        Ok(handle)
    }

    /// Accept a pending connection on the listening socket `handle`.
    ///
    /// On success the peer address (the whole address staging buffer) is
    /// written to `guest_addr` and its host-reported length, as a native
    /// `u32`, to `guest_addrlen`. A failed host accept or non-blocking setup
    /// leaves guest memory untouched. No slot stays claimed after a failure.
    pub fn accept<M: GuestMemory>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_addr: u64,
        guest_addrlen: u64,
    ) -> Result<Handle> {
        let listen_fd = self.table.get(handle)?;
        let index = self.table.find_free_slot()?;

        self.addr_buf.fill(0);
        let (fd, addrlen) = self
            .host
            .accept(listen_fd, &mut self.addr_buf)
            .map_err(|e| Error::from_host("accept", &e))?;
        let new_handle = self.adopt(index, fd)?;

        let copied = mem
            .write(guest_addr, &self.addr_buf)
            .and_then(|()| mem.write(guest_addrlen, &addrlen.to_ne_bytes()));
        if let Err(err) = copied {
            self.discard(new_handle);
            return Err(err);
        }

        debug_io!("accept({}) -> handle {} (addrlen {})", handle, new_handle, addrlen);
        Ok(new_handle)
    }

    /// Bind `handle` to the address at `guest_addr`.
    ///
    /// The staged address is copied back to the guest on success.
    pub fn bind<M: GuestMemory>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_addr: u64,
        addrlen: u32,
    ) -> Result<i32> {
        self.with_address(mem, handle, guest_addr, addrlen, "bind", |host, fd, addr| {
            host.bind(fd, addr)
        })
    }

    /// Connect `handle` to the address at `guest_addr`.
    ///
    /// A stream socket that cannot connect immediately fails with the
    /// host's `EINPROGRESS`. The staged address is copied back on success.
    pub fn connect<M: GuestMemory>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_addr: u64,
        addrlen: u32,
    ) -> Result<i32> {
        self.with_address(mem, handle, guest_addr, addrlen, "connect", |host, fd, addr| {
            host.connect(fd, addr)
        })
    }

    /// Mark `handle` as a listening socket.
    pub fn listen(&mut self, handle: Handle, backlog: i32) -> Result<i32> {
        let fd = self.table.get(handle)?;
        self.host
            .listen(fd, backlog)
            .map_err(|e| Error::from_host("listen", &e))?;
        debug_io!("listen({}, {})", handle, backlog);
        Ok(0)
    }

    /// Receive up to `length` bytes into the guest buffer at `guest_buf`.
    ///
    /// A zero-byte result is reported as a failure, the same as a host
    /// error; the guest cannot tell an orderly shutdown from a broken
    /// connection here.
    pub fn recv<M: GuestMemory>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_buf: u64,
        length: usize,
        flags: i32,
    ) -> Result<usize> {
        let fd = self.table.get(handle)?;
        self.check_transfer(length)?;

        let n = self
            .host
            .recv(fd, &mut self.data_buf[..length], flags)
            .map_err(|e| Error::from_host("recv", &e))?;
        if n == 0 {
            debug_io!("recv({}) -> peer closed", handle);
            return Err(Error::HostOperationFailed {
                op: "recv",
                errno: libc::ENOTCONN,
            });
        }

        mem.write(guest_buf, &self.data_buf[..n])?;
        debug_io!("recv({}, {}) -> {} bytes", handle, length, n);
        Ok(n)
    }

    /// Send `length` bytes from the guest buffer at `guest_buf`.
    ///
    /// The full `length` is staged before the host is called. Returns the
    /// byte count the host accepted, which may be zero.
    pub fn send<M: GuestMemory>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_buf: u64,
        length: usize,
        flags: i32,
    ) -> Result<usize> {
        let fd = self.table.get(handle)?;
        self.check_transfer(length)?;

        mem.read(guest_buf, &mut self.data_buf[..length])?;
        let n = self
            .host
            .send(fd, &self.data_buf[..length], flags)
            .map_err(|e| Error::from_host("send", &e))?;
        debug_io!("send({}, {}) -> {} bytes", handle, length, n);
        Ok(n)
    }

    /// Close `handle` and free its slot.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        let fd = self.table.release(handle)?;
        self.host.close(fd);
        debug_io!("close({})", handle);
        Ok(())
    }

    /// Put `fd` into slot `index` and make it non-blocking.
    ///
    /// If the mode switch fails the slot is freed and `fd` closed.
    fn adopt(&mut self, index: usize, fd: RawFd) -> Result<Handle> {
        let handle = self.table.claim(index, fd);
        if let Err(err) = self.enforce_non_blocking(fd) {
            self.discard(handle);
            return Err(err);
        }
        Ok(handle)
    }

    fn discard(&mut self, handle: Handle) {
        if let Ok(fd) = self.table.release(handle) {
            self.host.close(fd);
        }
    }

    fn enforce_non_blocking(&mut self, fd: RawFd) -> Result<()> {
        let flags = self.host.get_flags(fd).map_err(|e| {
            log::warn!("couldn't get socket flags for non-blocking config: {}", e);
            config_error("get flags", &e)
        })?;
        self.host.set_flags(fd, flags | libc::O_NONBLOCK).map_err(|e| {
            log::warn!("couldn't set socket flags for non-blocking config: {}", e);
            config_error("set flags", &e)
        })
    }

    fn check_transfer(&self, length: usize) -> Result<()> {
        if length > self.config.max_transfer {
            return Err(Error::BufferTooLarge {
                len: length,
                max: self.config.max_transfer,
            });
        }
        Ok(())
    }

    /// Stage a guest address, run `op` on it, and copy it back on success.
    fn with_address<M, F>(
        &mut self,
        mem: &mut M,
        handle: Handle,
        guest_addr: u64,
        addrlen: u32,
        name: &'static str,
        op: F,
    ) -> Result<i32>
    where
        M: GuestMemory,
        F: FnOnce(&mut H, RawFd, &[u8]) -> io::Result<()>,
    {
        let fd = self.table.get(handle)?;
        let len = addrlen as usize;
        if len > self.config.max_addr_len {
            return Err(Error::AddressTooLarge {
                len,
                max: self.config.max_addr_len,
            });
        }

        let staged = &mut self.addr_buf[..len];
        staged.fill(0);
        mem.read(guest_addr, staged)?;

        op(&mut self.host, fd, &self.addr_buf[..len]).map_err(|e| Error::from_host(name, &e))?;

        mem.write(guest_addr, &self.addr_buf[..len])?;
        debug_io!("{}({}, addrlen {})", name, handle, len);
        Ok(0)
    }
}

impl<H: HostSockets> Drop for SocketProxy<H> {
    fn drop(&mut self) {
        for fd in self.table.drain() {
            self.host.close(fd);
        }
    }
}

impl<H: HostSockets> std::fmt::Debug for SocketProxy<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketProxy")
            .field("config", &self.config)
            .field("in_use", &self.table.in_use())
            .finish()
    }
}

fn config_error(step: &'static str, err: &io::Error) -> Error {
    Error::ConfigurationFailed {
        step,
        errno: err.raw_os_error().unwrap_or(libc::EIO),
    }
}
