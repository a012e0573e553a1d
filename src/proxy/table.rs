//! Fixed-capacity descriptor table.
//!
//! Slot indices are the handles the guest sees. Raw host descriptors never
//! leave this table.

use std::os::unix::io::RawFd;

use crate::debug_table;
use crate::error::{Error, Result};

/// Guest-visible socket handle.
pub type Handle = i32;

/// Maps guest handles to host descriptors.
#[derive(Debug)]
pub struct DescriptorTable {
    slots: Vec<Option<RawFd>>,
}

impl DescriptorTable {
    /// Create a table with `capacity` free slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of claimed slots.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Lowest free slot index.
    pub fn find_free_slot(&self) -> Result<usize> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::NoFreeDescriptor)
    }

    /// Store `fd` in the free slot `index` and return its handle.
    pub fn claim(&mut self, index: usize, fd: RawFd) -> Handle {
        debug_assert!(self.slots[index].is_none(), "slot {} already claimed", index);
        self.slots[index] = Some(fd);
        debug_table!("claimed slot {} for host fd {}", index, fd);
        index as Handle
    }

    /// Free the slot behind `handle` and return the descriptor it held.
    pub fn release(&mut self, handle: Handle) -> Result<RawFd> {
        let index = self.index(handle)?;
        let fd = self.slots[index]
            .take()
            .ok_or(Error::InvalidHandle(handle))?;
        debug_table!("released slot {} (host fd {})", index, fd);
        Ok(fd)
    }

    /// Host descriptor behind a claimed `handle`.
    pub fn get(&self, handle: Handle) -> Result<RawFd> {
        let index = self.index(handle)?;
        self.slots[index].ok_or(Error::InvalidHandle(handle))
    }

    /// Free every slot, returning the descriptors that were claimed.
    pub fn drain(&mut self) -> Vec<RawFd> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    fn index(&self, handle: Handle) -> Result<usize> {
        usize::try_from(handle)
            .ok()
            .filter(|&i| i < self.slots.len())
            .ok_or(Error::InvalidHandle(handle))
    }
}
