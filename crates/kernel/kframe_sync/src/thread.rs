//! Host threads standing in for CPUs.
//!
//! Every OS thread gets its own CPU id and its own simulated interrupt
//! enable flag, which starts enabled. Used to exercise spin locks and the
//! allocator on a hosted target.

use core::{
    cell::Cell,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::interrupt::{CpuLocal, InterruptState};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

std::thread_local! {
    static ID: usize = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    static INT_ENABLED: Cell<bool> = const { Cell::new(true) };
    static STATE: InterruptState = const { InterruptState::new() };
}

/// A [`CpuLocal`] that treats each host thread as a CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadCpu;

unsafe impl CpuLocal for ThreadCpu {
    fn id() -> usize {
        ID.with(|id| *id)
    }

    fn interrupts_enabled() -> bool {
        INT_ENABLED.get()
    }

    fn enable_interrupts() {
        INT_ENABLED.set(true);
    }

    fn disable_interrupts() {
        INT_ENABLED.set(false);
    }

    fn with_state<T, F>(f: F) -> T
    where
        F: FnOnce(&InterruptState) -> T,
    {
        STATE.with(f)
    }
}
