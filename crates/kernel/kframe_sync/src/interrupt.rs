//! Per-CPU interrupt enable state, saved and restored around spin locks.
//!
//! Acquiring a spin lock disables interrupts so that an interrupt handler on
//! the same CPU can never spin on a lock its own CPU already holds. The
//! disables nest: interrupts come back on only when the outermost lock is
//! released, and only if they were on before it was taken.

use core::{
    marker::PhantomData,
    mem,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Access to the CPU the caller is currently running on.
///
/// # Safety
///
/// `id` must return distinct values for execution contexts that can run
/// concurrently, and `with_state` must always hand out the same
/// [`InterruptState`] for the same CPU.
pub unsafe trait CpuLocal {
    /// Returns the current CPU's ID.
    ///
    /// Must be called with interrupts disabled, so the caller cannot migrate
    /// to another CPU in the middle of a critical section.
    fn id() -> usize;

    /// Returns `true` if interrupts are enabled on this CPU.
    fn interrupts_enabled() -> bool;

    /// Enables interrupts on this CPU.
    fn enable_interrupts();

    /// Disables interrupts on this CPU.
    fn disable_interrupts();

    /// Runs `f` with this CPU's push/pop bookkeeping.
    fn with_state<T, F>(f: F) -> T
    where
        F: FnOnce(&InterruptState) -> T;
}

/// Nesting depth of [`push_disabled`] calls on one CPU.
pub struct InterruptState {
    push_depth: AtomicUsize,
    int_enabled: AtomicBool,
}

impl Default for InterruptState {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            push_depth: AtomicUsize::new(0),
            int_enabled: AtomicBool::new(false),
        }
    }

    /// Returns depth of [`push_disabled`] calls.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.push_depth.load(Ordering::Relaxed)
    }

    fn push(&self, int_enabled: bool) {
        let depth = self.push_depth.fetch_add(1, Ordering::Acquire);
        if depth == 0 {
            self.int_enabled.store(int_enabled, Ordering::Relaxed);
        }
    }

    fn pop(&self) -> Option<bool> {
        assert!(self.depth() > 0, "pop_disabled without push_disabled");
        let int_enabled = self.int_enabled.load(Ordering::Relaxed);
        if self.push_depth.fetch_sub(1, Ordering::Release) == 1 {
            return Some(int_enabled);
        }
        None
    }
}

/// Saves the current interrupt enable state and disables interrupts.
pub fn push_disabled<C>() -> Guard<C>
where
    C: CpuLocal,
{
    let current = C::interrupts_enabled();
    C::disable_interrupts();

    C::with_state(|state| state.push(current));
    Guard {
        cpuid: C::id(),
        _cpu: PhantomData,
    }
}

/// Restores the interrupt enable state saved by [`push_disabled()`].
///
/// # Safety
///
/// Must pair with an earlier [`push_disabled()`] whose guard was forgotten.
pub unsafe fn pop_disabled<C>()
where
    C: CpuLocal,
{
    drop(Guard::<C> {
        cpuid: C::id(),
        _cpu: PhantomData,
    });
}

/// Guard that restores interrupt enable state when dropped.
pub struct Guard<C>
where
    C: CpuLocal,
{
    cpuid: usize,
    _cpu: PhantomData<fn() -> C>,
}

impl<C> Drop for Guard<C>
where
    C: CpuLocal,
{
    fn drop(&mut self) {
        assert_eq!(self.cpuid, C::id());
        assert!(!C::interrupts_enabled());
        if C::with_state(InterruptState::pop) == Some(true) {
            C::enable_interrupts();
        }
    }
}

impl<C> Guard<C>
where
    C: CpuLocal,
{
    /// Keeps interrupts disabled past the end of this guard's scope.
    ///
    /// The matching [`pop_disabled()`] must be called later.
    pub fn forget(self) {
        mem::forget(self);
    }
}
