//! Blocking primitives shared by every participant of a rendezvous.
//!
//! `TurnMutex` and `TurnCondvar` park threads on a 32-bit word through the
//! platform's address-wait facility (a futex on Linux, `WaitOnAddress` on
//! Windows). Both are poisoning-aware in the same way as `std::sync`, which is
//! how a panicking participant turns into a synchronization failure for the
//! rest of the group.

mod turn_condvar;
mod turn_mutex;


pub use turn_condvar::TurnCondvar;
pub use turn_mutex::{TurnMutex, TurnMutexGuard};

use core::sync::atomic::AtomicU32;
#[cfg(not(any(windows, target_os = "linux")))]
use core::sync::atomic::Ordering;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::{
    WaitOnAddress, WakeByAddressAll, WakeByAddressSingle, INFINITE,
};

#[cfg(target_os = "linux")]
use libc::{SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

#[cfg(target_os = "linux")]
#[inline]
fn futex_wait(addr: &AtomicU32, expected: u32) {
    // EINTR and EAGAIN both surface as an early return; callers re-check.
    unsafe {
        libc::syscall(
            SYS_futex,
            addr.as_ptr(),
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

#[cfg(target_os = "linux")]
#[inline]
fn futex_wake(addr: &AtomicU32, count: i32) {
    unsafe {
        libc::syscall(SYS_futex, addr.as_ptr(), FUTEX_WAKE | FUTEX_PRIVATE_FLAG, count);
    }
}

/// Wakes all threads waiting on the given address.
#[inline]
pub fn wake_all_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    unsafe {
        WakeByAddressAll(addr.as_ptr().cast());
    }
    #[cfg(target_os = "linux")]
    futex_wake(addr, i32::MAX);
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}

/// Wakes one thread waiting on the given address.
#[inline]
pub fn wake_one_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    unsafe {
        WakeByAddressSingle(addr.as_ptr().cast());
    }
    #[cfg(target_os = "linux")]
    futex_wake(addr, 1);
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}

/// Blocks while the value at `addr` equals `expected`.
///
/// May return early without the value having changed. Every caller must
/// treat a return as "something may have happened" and re-check its own
/// condition.
#[inline]
pub fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    #[cfg(windows)]
    unsafe {
        let expected_ptr: *const u32 = &expected;
        WaitOnAddress(
            addr.as_ptr().cast(),
            expected_ptr.cast(),
            core::mem::size_of::<u32>(),
            INFINITE,
        );
    }
    #[cfg(target_os = "linux")]
    futex_wait(addr, expected);
    #[cfg(not(any(windows, target_os = "linux")))]
    while addr.load(Ordering::Acquire) == expected {
        std::thread::yield_now();
    }
}
