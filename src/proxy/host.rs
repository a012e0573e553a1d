//! Host-side socket primitives.
//!
//! [`HostSockets`] is the seam between the proxy and the operating system.
//! Every method mirrors one host call and reports failure as the raw OS
//! error, so the proxy can forward the errno to the guest verbatim.

use std::io;
use std::os::unix::io::RawFd;

/// The host socket service the proxy drives.
pub trait HostSockets {
    /// Create a socket. Arguments are forwarded verbatim.
    fn socket(&mut self, domain: i32, ty: i32, protocol: i32) -> io::Result<RawFd>;

    /// Accept a connection on `fd`, writing the peer address into `addr`.
    ///
    /// Returns the new descriptor and the address length the host reported.
    fn accept(&mut self, fd: RawFd, addr: &mut [u8]) -> io::Result<(RawFd, u32)>;

    /// Bind `fd` to the raw socket address in `addr`.
    fn bind(&mut self, fd: RawFd, addr: &[u8]) -> io::Result<()>;

    /// Connect `fd` to the raw socket address in `addr`.
    fn connect(&mut self, fd: RawFd, addr: &[u8]) -> io::Result<()>;

    /// Mark `fd` as a passive socket.
    fn listen(&mut self, fd: RawFd, backlog: i32) -> io::Result<()>;

    /// Send `buf` on `fd`.
    fn send(&mut self, fd: RawFd, buf: &[u8], flags: i32) -> io::Result<usize>;

    /// Receive into `buf` from `fd`. `Ok(0)` means the peer shut down.
    fn recv(&mut self, fd: RawFd, buf: &mut [u8], flags: i32) -> io::Result<usize>;

    /// Read the file status flags of `fd`.
    fn get_flags(&mut self, fd: RawFd) -> io::Result<i32>;

    /// Replace the file status flags of `fd`.
    fn set_flags(&mut self, fd: RawFd, flags: i32) -> io::Result<()>;

    /// Close `fd`. Errors are ignored; the descriptor is gone either way.
    fn close(&mut self, fd: RawFd);
}

/// [`HostSockets`] backed by the host's libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSockets;

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn check_len(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

impl HostSockets for LibcSockets {
    fn socket(&mut self, domain: i32, ty: i32, protocol: i32) -> io::Result<RawFd> {
        check(unsafe { libc::socket(domain, ty, protocol) })
    }

    fn accept(&mut self, fd: RawFd, addr: &mut [u8]) -> io::Result<(RawFd, u32)> {
        let mut addrlen = addr.len() as libc::socklen_t;
        let new_fd = check(unsafe {
            libc::accept(
                fd,
                addr.as_mut_ptr() as *mut libc::sockaddr,
                &mut addrlen,
            )
        })?;
        Ok((new_fd, addrlen as u32))
    }

    fn bind(&mut self, fd: RawFd, addr: &[u8]) -> io::Result<()> {
        check(unsafe {
            libc::bind(
                fd,
                addr.as_ptr() as *const libc::sockaddr,
                addr.len() as libc::socklen_t,
            )
        })?;
        Ok(())
    }

    fn connect(&mut self, fd: RawFd, addr: &[u8]) -> io::Result<()> {
        check(unsafe {
            libc::connect(
                fd,
                addr.as_ptr() as *const libc::sockaddr,
                addr.len() as libc::socklen_t,
            )
        })?;
        Ok(())
    }

    fn listen(&mut self, fd: RawFd, backlog: i32) -> io::Result<()> {
        check(unsafe { libc::listen(fd, backlog) })?;
        Ok(())
    }

    fn send(&mut self, fd: RawFd, buf: &[u8], flags: i32) -> io::Result<usize> {
        check_len(unsafe {
            libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), flags)
        })
    }

    fn recv(&mut self, fd: RawFd, buf: &mut [u8], flags: i32) -> io::Result<usize> {
        check_len(unsafe {
            libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), flags)
        })
    }

    fn get_flags(&mut self, fd: RawFd) -> io::Result<i32> {
        check(unsafe { libc::fcntl(fd, libc::F_GETFL) })
    }

    fn set_flags(&mut self, fd: RawFd, flags: i32) -> io::Result<()> {
        check(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) })?;
        Ok(())
    }

    fn close(&mut self, fd: RawFd) {
        unsafe { libc::close(fd) };
    }
}
