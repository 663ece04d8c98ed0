//! Platform virtual-memory primitives.
//!
//! Goals:
//! - Reserve address space without physical backing, commit lazily
//! - Let the OS reclaim physical pages on reset without unmapping
//! - Keep the platform split at compile time; no runtime dispatch

use std::io;
use std::ptr::NonNull;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
pub use posix::LinuxVm;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use posix::DarwinVm;
#[cfg(windows)]
pub use windows::WindowsVm;

/// The implementation for the current target.
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
pub type NativeVm = posix::LinuxVm;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub type NativeVm = posix::DarwinVm;
#[cfg(windows)]
pub type NativeVm = windows::WindowsVm;

/// Reserve/commit/discard/release over one contiguous range of address
/// space. Every length handed to `commit`, `discard` and `release` is in
/// bytes; callers are responsible for page-granular arithmetic.
pub trait VirtualMemory {
    /// OS page size.
    fn page_size() -> usize;

    /// Granularity reservations are rounded to. Equals the page size on
    /// POSIX; 64 KiB on Windows.
    fn allocation_granularity() -> usize;

    /// Reserve `len` bytes of address space with no physical backing.
    /// The range is inaccessible until committed.
    fn reserve(len: usize) -> io::Result<NonNull<u8>>;

    /// Grant read/write access to `[ptr, ptr + len)`.
    ///
    /// # Safety
    ///
    /// The range must lie inside a reservation returned by [`reserve`]
    /// that has not been released.
    ///
    /// [`reserve`]: VirtualMemory::reserve
    unsafe fn commit(ptr: NonNull<u8>, len: usize) -> io::Result<()>;

    /// Hint that the contents of `[ptr, ptr + len)` are disposable. The
    /// range stays committed and accessible; the OS may drop its physical
    /// backing. Whether later reads observe zeros or stale bytes is
    /// platform-specific.
    ///
    /// # Safety
    ///
    /// The range must be committed, and no live reference may point into
    /// it.
    unsafe fn discard(ptr: NonNull<u8>, len: usize) -> io::Result<()>;

    /// Return the entire reservation to the OS.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe exactly the range returned by
    /// [`reserve`], and nothing may reference it afterwards.
    ///
    /// [`reserve`]: VirtualMemory::reserve
    unsafe fn release(ptr: NonNull<u8>, len: usize) -> io::Result<()>;
}
