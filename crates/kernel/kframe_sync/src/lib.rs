//! Mutual exclusion for the frame allocator.
//!
//! [`Mutex`] is the seam the allocator is generic over. [`SpinLock`] is the
//! kernel's implementation: it disables interrupts on the current CPU while
//! held and refuses reentry.
#![cfg_attr(
    all(not(test), any(not(feature = "std"), target_os = "none")),
    no_std
)]

pub mod interrupt;
pub mod mutex;
pub mod spin_lock;

#[cfg(target_arch = "riscv64")]
pub mod hart;
#[cfg(any(test, all(feature = "std", not(target_os = "none"))))]
pub mod thread;

pub use self::{
    interrupt::{CpuLocal, InterruptState},
    mutex::Mutex,
    spin_lock::{RawSpinLock, SpinLock, SpinLockGuard},
};
