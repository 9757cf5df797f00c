//! RISC-V harts as CPUs.

use core::arch::asm;

use kframe_params::NCPU;
use riscv::register::sstatus;

use crate::interrupt::{CpuLocal, InterruptState};

static HART_STATE: [InterruptState; NCPU] = [const { InterruptState::new() }; NCPU];

/// A [`CpuLocal`] backed by supervisor-mode RISC-V registers.
///
/// The boot code stores each hart's id in `tp` before any lock is taken.
pub struct Hart;

unsafe impl CpuLocal for Hart {
    fn id() -> usize {
        assert!(!Self::interrupts_enabled());

        let id: usize;
        unsafe { asm!("mv {}, tp", out(reg) id) };
        id
    }

    fn interrupts_enabled() -> bool {
        sstatus::read().sie()
    }

    fn enable_interrupts() {
        unsafe {
            sstatus::set_sie();
        }
    }

    fn disable_interrupts() {
        unsafe {
            sstatus::clear_sie();
        }
    }

    fn with_state<T, F>(f: F) -> T
    where
        F: FnOnce(&InterruptState) -> T,
    {
        f(&HART_STATE[Self::id()])
    }
}
