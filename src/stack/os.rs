//! Per-platform queries for the calling thread's stack region.

use super::StackExtent;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(super) fn query() -> Option<StackExtent> {
    use core::mem::MaybeUninit;
    use core::ptr;

    // SAFETY: `attr` is initialised by `pthread_getattr_np` before use and
    // destroyed exactly once; the out-pointers are valid locals.
    unsafe {
        let mut attr = MaybeUninit::<libc::pthread_attr_t>::zeroed();
        if libc::pthread_getattr_np(libc::pthread_self(), attr.as_mut_ptr()) != 0 {
            return None;
        }
        let mut addr: *mut libc::c_void = ptr::null_mut();
        let mut size: libc::size_t = 0;
        let rc = libc::pthread_attr_getstack(attr.as_ptr(), &mut addr, &mut size);
        libc::pthread_attr_destroy(attr.as_mut_ptr());
        if rc != 0 || addr.is_null() || size == 0 {
            return None;
        }
        let low = addr as usize;
        Some(StackExtent::from_bounds(low, low + size))
    }
}

#[cfg(target_os = "macos")]
pub(super) fn query() -> Option<StackExtent> {
    // SAFETY: both calls only read the current thread's descriptor.
    unsafe {
        let this = libc::pthread_self();
        let high = libc::pthread_get_stackaddr_np(this) as usize;
        let size = libc::pthread_get_stacksize_np(this);
        if high == 0 || size == 0 {
            return None;
        }
        Some(StackExtent::from_bounds(high - size, high))
    }
}

#[cfg(windows)]
pub(super) fn query() -> Option<StackExtent> {
    use windows_sys::Win32::System::Threading::GetCurrentThreadStackLimits;

    let mut low = 0usize;
    let mut high = 0usize;
    // SAFETY: out-pointers are valid locals.
    unsafe { GetCurrentThreadStackLimits(&mut low, &mut high) };
    if high <= low {
        return None;
    }
    Some(StackExtent::from_bounds(low, high))
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", windows)))]
pub(super) fn query() -> Option<StackExtent> {
    None
}
