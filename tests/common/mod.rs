//! Shared fakes for the property tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use guestsock::{Error, GuestMemory, HostSockets, Result};

/// Host that always succeeds and records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_fd: RawFd,
    pub calls: usize,
    /// Shared so it can be inspected after the proxy is dropped.
    pub closed: Rc<RefCell<Vec<RawFd>>>,
    pub sent: Vec<u8>,
    pub inbox: Vec<u8>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            next_fd: 3,
            ..Default::default()
        }
    }

    /// A host whose every recv returns `inbox`.
    pub fn with_inbox(inbox: Vec<u8>) -> Self {
        Self {
            inbox,
            ..Self::new()
        }
    }
}

impl HostSockets for RecordingHost {
    fn socket(&mut self, _domain: i32, _ty: i32, _protocol: i32) -> io::Result<RawFd> {
        self.calls += 1;
        let fd = self.next_fd;
        self.next_fd += 1;
        Ok(fd)
    }

    fn accept(&mut self, _fd: RawFd, _addr: &mut [u8]) -> io::Result<(RawFd, u32)> {
        self.calls += 1;
        let fd = self.next_fd;
        self.next_fd += 1;
        Ok((fd, 0))
    }

    fn bind(&mut self, _fd: RawFd, _addr: &[u8]) -> io::Result<()> {
        self.calls += 1;
        Ok(())
    }

    fn connect(&mut self, _fd: RawFd, _addr: &[u8]) -> io::Result<()> {
        self.calls += 1;
        Ok(())
    }

    fn listen(&mut self, _fd: RawFd, _backlog: i32) -> io::Result<()> {
        self.calls += 1;
        Ok(())
    }

    fn send(&mut self, _fd: RawFd, buf: &[u8], _flags: i32) -> io::Result<usize> {
        self.calls += 1;
        self.sent = buf.to_vec();
        Ok(buf.len())
    }

    fn recv(&mut self, _fd: RawFd, buf: &mut [u8], _flags: i32) -> io::Result<usize> {
        self.calls += 1;
        let n = self.inbox.len().min(buf.len());
        buf[..n].copy_from_slice(&self.inbox[..n]);
        Ok(n)
    }

    fn get_flags(&mut self, _fd: RawFd) -> io::Result<i32> {
        Ok(0)
    }

    fn set_flags(&mut self, _fd: RawFd, _flags: i32) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self, fd: RawFd) {
        self.closed.borrow_mut().push(fd);
    }
}

/// Guest memory at address 0 that counts every access.
#[derive(Debug)]
pub struct CountingMemory {
    pub bytes: Vec<u8>,
    pub reads: std::cell::Cell<usize>,
    pub writes: usize,
}

impl CountingMemory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            reads: std::cell::Cell::new(0),
            writes: 0,
        }
    }

    pub fn accesses(&self) -> usize {
        self.reads.get() + self.writes
    }
}

impl GuestMemory for CountingMemory {
    fn read(&self, guest_addr: u64, buf: &mut [u8]) -> Result<()> {
        self.reads.set(self.reads.get() + 1);
        let start = guest_addr as usize;
        let src = self
            .bytes
            .get(start..start + buf.len())
            .ok_or(Error::InvalidGuestAddress(guest_addr))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, guest_addr: u64, data: &[u8]) -> Result<()> {
        self.writes += 1;
        let start = guest_addr as usize;
        let dst = self
            .bytes
            .get_mut(start..start + data.len())
            .ok_or(Error::InvalidGuestAddress(guest_addr))?;
        dst.copy_from_slice(data);
        Ok(())
    }
}
