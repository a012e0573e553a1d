//! Host-backed guest RAM region.

use super::GuestMemory;
use crate::error::{Error, Result};

/// A contiguous region of guest physical memory backed by an anonymous
/// host mapping.
///
/// Guest addresses are translated by subtracting `base`. Any access that
/// leaves `[base, base + size)` fails with [`Error::InvalidGuestAddress`].
pub struct GuestRam {
    /// Guest physical address of the first byte
    base: u64,
    /// Pointer to the allocated memory
    ptr: *mut u8,
    /// Size of the allocation in bytes
    size: usize,
}

// Safety: GuestRam owns its allocation and can be sent between threads
unsafe impl Send for GuestRam {}
unsafe impl Sync for GuestRam {}

impl GuestRam {
    /// Map a new zero-initialised region starting at guest address `base`.
    ///
    /// The size is rounded up to the host page size.
    pub fn new(base: u64, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig(
                "guest RAM size must be greater than 0".to_string(),
            ));
        }

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
        let aligned_size = size
            .checked_add(page_size - 1)
            .map(|s| s & !(page_size - 1))
            .ok_or_else(|| {
                Error::InvalidConfig(format!("guest RAM size {} is too large", size))
            })?;

        if base.checked_add(aligned_size as u64).is_none() {
            return Err(Error::InvalidGuestAddress(base));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                aligned_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(Error::InvalidConfig(format!(
                "mmap of {} bytes failed: {}",
                aligned_size,
                std::io::Error::last_os_error()
            )));
        }

        Ok(Self {
            base,
            ptr: ptr as *mut u8,
            size: aligned_size,
        })
    }

    /// Guest physical address of the first byte.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if a guest address falls within this region.
    pub fn contains(&self, guest_addr: u64) -> bool {
        guest_addr >= self.base && guest_addr - self.base < self.size as u64
    }

    /// Get a slice view of the whole region.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Translate `[guest_addr, guest_addr + len)` into a host offset.
    fn offset(&self, guest_addr: u64, len: usize) -> Result<usize> {
        let offset = guest_addr
            .checked_sub(self.base)
            .ok_or(Error::InvalidGuestAddress(guest_addr))?;
        let end = offset
            .checked_add(len as u64)
            .ok_or(Error::InvalidGuestAddress(guest_addr))?;
        if end > self.size as u64 {
            return Err(Error::InvalidGuestAddress(guest_addr));
        }
        Ok(offset as usize)
    }
}

impl GuestMemory for GuestRam {
    fn read(&self, guest_addr: u64, buf: &mut [u8]) -> Result<()> {
        let offset = self.offset(guest_addr, buf.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn write(&mut self, guest_addr: u64, data: &[u8]) -> Result<()> {
        let offset = self.offset(guest_addr, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), data.len());
        }
        Ok(())
    }
}

impl Drop for GuestRam {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

impl std::fmt::Debug for GuestRam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestRam")
            .field("base", &format_args!("0x{:x}", self.base))
            .field("size", &self.size)
            .finish()
    }
}
