//! POSIX implementations backed by `mmap`/`mprotect`/`madvise`.

use std::io;
use std::ptr::{self, NonNull};

use once_cell::sync::Lazy;

use super::VirtualMemory;

static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
    // SAFETY: sysconf with a valid name has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw <= 0 {
        4096
    } else {
        raw as usize
    }
});

fn reserve(len: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: anonymous private mapping over addresses chosen by the
    // kernel; PROT_NONE keeps the range inaccessible until committed.
    let raw = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };
    if raw == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(raw.cast::<u8>())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))
}

unsafe fn commit(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    let rc = libc::mprotect(
        ptr.as_ptr().cast::<libc::c_void>(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
    );
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

unsafe fn madvise(ptr: NonNull<u8>, len: usize, advice: libc::c_int) -> io::Result<()> {
    let rc = libc::madvise(ptr.as_ptr().cast::<libc::c_void>(), len, advice);
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

unsafe fn release(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    let rc = libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len);
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Linux and other non-Darwin POSIX targets. `MADV_DONTNEED` frees the
/// physical pages immediately; later reads observe zero-fill pages.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
#[derive(Debug, Clone, Copy)]
pub struct LinuxVm;

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
impl VirtualMemory for LinuxVm {
    fn page_size() -> usize {
        *PAGE_SIZE
    }

    fn allocation_granularity() -> usize {
        *PAGE_SIZE
    }

    fn reserve(len: usize) -> io::Result<NonNull<u8>> {
        reserve(len)
    }

    unsafe fn commit(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        commit(ptr, len)
    }

    unsafe fn discard(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        madvise(ptr, len, libc::MADV_DONTNEED)
    }

    unsafe fn release(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        release(ptr, len)
    }
}

/// macOS and iOS. `MADV_FREE` marks the pages reusable without an
/// immediate TLB shootdown; kernels that reject it get `MADV_DONTNEED`.
#[cfg(any(target_os = "macos", target_os = "ios"))]
#[derive(Debug, Clone, Copy)]
pub struct DarwinVm;

#[cfg(any(target_os = "macos", target_os = "ios"))]
impl VirtualMemory for DarwinVm {
    fn page_size() -> usize {
        *PAGE_SIZE
    }

    fn allocation_granularity() -> usize {
        *PAGE_SIZE
    }

    fn reserve(len: usize) -> io::Result<NonNull<u8>> {
        reserve(len)
    }

    unsafe fn commit(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        commit(ptr, len)
    }

    unsafe fn discard(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        match madvise(ptr, len, libc::MADV_FREE) {
            Ok(()) => Ok(()),
            Err(_) => madvise(ptr, len, libc::MADV_DONTNEED),
        }
    }

    unsafe fn release(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        release(ptr, len)
    }
}
