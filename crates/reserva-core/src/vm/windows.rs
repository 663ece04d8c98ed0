//! Windows implementation backed by `VirtualAlloc`/`VirtualFree`.

use std::ffi::c_void;
use std::io;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use once_cell::sync::Lazy;
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, MEM_RESET, PAGE_NOACCESS,
    PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

use super::VirtualMemory;

struct SysInfo {
    page_size: usize,
    allocation_granularity: usize,
}

static SYS_INFO: Lazy<SysInfo> = Lazy::new(|| {
    let mut info = MaybeUninit::<SYSTEM_INFO>::uninit();
    // SAFETY: GetSystemInfo fills the struct and cannot fail.
    let info = unsafe {
        GetSystemInfo(info.as_mut_ptr());
        info.assume_init()
    };
    SysInfo {
        page_size: info.dwPageSize as usize,
        allocation_granularity: info.dwAllocationGranularity as usize,
    }
});

#[derive(Debug, Clone, Copy)]
pub struct WindowsVm;

impl VirtualMemory for WindowsVm {
    fn page_size() -> usize {
        SYS_INFO.page_size
    }

    fn allocation_granularity() -> usize {
        SYS_INFO.allocation_granularity
    }

    fn reserve(len: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: reserving fresh address space chosen by the kernel.
        let raw = unsafe { VirtualAlloc(ptr::null(), len, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(raw.cast::<u8>()).ok_or_else(io::Error::last_os_error)
    }

    unsafe fn commit(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        let raw = VirtualAlloc(ptr.as_ptr() as *const c_void, len, MEM_COMMIT, PAGE_READWRITE);
        if raw.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    unsafe fn discard(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        // MEM_RESET leaves the pages committed; the protection argument is
        // ignored but must still be a valid value.
        let raw = VirtualAlloc(ptr.as_ptr() as *const c_void, len, MEM_RESET, PAGE_NOACCESS);
        if raw.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    unsafe fn release(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
        // dwSize must be 0 with MEM_RELEASE; the whole reservation goes.
        let _ = len;
        let ok = VirtualFree(ptr.as_ptr() as *mut c_void, 0, MEM_RELEASE);
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
