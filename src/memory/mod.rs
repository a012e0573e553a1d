//! Guest memory bridge.
//!
//! The proxy never touches guest memory directly. Every address or data
//! buffer crosses the boundary through a [`GuestMemory`] implementation,
//! always with a length the proxy has already bounds-checked.

mod guest;

pub use guest::GuestRam;

use crate::error::Result;

/// Byte-level access to guest-addressable memory.
pub trait GuestMemory {
    /// Copy `buf.len()` bytes starting at `guest_addr` into `buf`.
    fn read(&self, guest_addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Copy `data` into guest memory starting at `guest_addr`.
    fn write(&mut self, guest_addr: u64, data: &[u8]) -> Result<()>;

    /// Read an integer from guest memory in host byte order.
    ///
    /// Only [`Pod`] integers are accepted, so every bit pattern the guest
    /// left behind is a valid value:
    ///
    /// ```compile_fail
    /// use guestsock::{GuestMemory, GuestRam};
    ///
    /// let ram = GuestRam::new(0x1000, 4096).unwrap();
    /// let flag: bool = ram.read_obj(0x1000).unwrap();
    /// ```
    fn read_obj<T: Pod>(&self, guest_addr: u64) -> Result<T>
    where
        Self: Sized,
    {
        let mut value = T::default();
        // SAFETY: T is a primitive integer; any byte pattern is valid.
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                &mut value as *mut T as *mut u8,
                std::mem::size_of::<T>(),
            )
        };
        self.read(guest_addr, bytes)?;
        Ok(value)
    }

    /// Write an integer into guest memory in host byte order.
    fn write_obj<T: Pod>(&mut self, guest_addr: u64, value: T) -> Result<()>
    where
        Self: Sized,
    {
        // SAFETY: T is a primitive integer with no padding.
        let bytes = unsafe {
            std::slice::from_raw_parts(&value as *const T as *const u8, std::mem::size_of::<T>())
        };
        self.write(guest_addr, bytes)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Primitive integers that can be moved across the guest boundary as raw
/// bytes. Sealed: no padding and no invalid bit patterns.
pub trait Pod: sealed::Sealed + Copy + Default {}

macro_rules! impl_pod {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}
            impl Pod for $t {}
        )*
    };
}

impl_pod!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl<M: GuestMemory + ?Sized> GuestMemory for &mut M {
    fn read(&self, guest_addr: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(guest_addr, buf)
    }

    fn write(&mut self, guest_addr: u64, data: &[u8]) -> Result<()> {
        (**self).write(guest_addr, data)
    }
}
