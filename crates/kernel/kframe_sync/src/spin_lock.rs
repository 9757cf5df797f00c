use core::{
    cell::UnsafeCell,
    fmt,
    hint,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{
    interrupt::{self, CpuLocal},
    mutex::Mutex,
};

const NO_CPU: usize = usize::MAX;

/// A spin lock that is not reentrant.
///
/// Holding it keeps interrupts disabled on the owning CPU.
pub struct RawSpinLock<C>
where
    C: CpuLocal,
{
    name: &'static str,
    locked: AtomicBool,
    cpu: AtomicUsize,
    _cpu: PhantomData<fn() -> C>,
}

impl<C> fmt::Debug for RawSpinLock<C>
where
    C: CpuLocal,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSpinLock")
            .field("name", &self.name)
            .field("locked", &self.locked.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<C> RawSpinLock<C>
where
    C: CpuLocal,
{
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            locked: AtomicBool::new(false),
            cpu: AtomicUsize::new(NO_CPU),
            _cpu: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock.
    ///
    /// Loops (spins) until the lock is acquired.
    ///
    /// # Panics
    ///
    /// Panics if the current CPU already holds the lock.
    pub fn acquire(&self) {
        // disable interrupts to avoid deadlock.
        interrupt::push_disabled::<C>().forget(); // release() re-enables them

        assert!(!self.holding(), "{}: acquire while holding", self.name);

        // `Ordering::Acquire` keeps the critical section's loads and stores
        // after the lock is taken.
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }

        // Record info about lock acquisition for holding() and debugging.
        self.cpu.store(C::id(), Ordering::Relaxed);
    }

    /// Releases the lock.
    ///
    /// # Panics
    ///
    /// Panics if the current CPU does not hold the lock.
    pub fn release(&self) {
        assert!(self.holding(), "{}: release without holding", self.name);

        self.cpu.store(NO_CPU, Ordering::Relaxed);

        // `Ordering::Release` makes every store in the critical section
        // visible to the next CPU that acquires the lock.
        self.locked.store(false, Ordering::Release);

        unsafe {
            interrupt::pop_disabled::<C>();
        }
    }

    /// Checks whether this CPU is holding the lock.
    ///
    /// Interrupts must be off.
    pub fn holding(&self) -> bool {
        assert!(!C::interrupts_enabled());
        self.locked.load(Ordering::Relaxed) && self.cpu.load(Ordering::Relaxed) == C::id()
    }
}

/// Data protected by a [`RawSpinLock`].
pub struct SpinLock<T, C>
where
    C: CpuLocal,
{
    lock: RawSpinLock<C>,
    value: UnsafeCell<T>,
}

unsafe impl<T, C> Sync for SpinLock<T, C>
where
    T: Send,
    C: CpuLocal,
{
}

impl<T, C> fmt::Debug for SpinLock<T, C>
where
    C: CpuLocal,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl<T, C> SpinLock<T, C>
where
    C: CpuLocal,
{
    pub const fn new(value: T) -> Self {
        Self::with_name("spinlock", value)
    }

    /// Creates a lock whose name shows up in lock-discipline panics.
    pub const fn with_name(name: &'static str, value: T) -> Self {
        Self {
            lock: RawSpinLock::new(name),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock.
    ///
    /// Loops (spins) until the lock is acquired.
    pub fn lock(&self) -> SpinLockGuard<'_, T, C> {
        self.lock.acquire();
        SpinLockGuard { lock: self }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T, C> Mutex for SpinLock<T, C>
where
    C: CpuLocal,
{
    type Data = T;
    type Guard<'a>
        = SpinLockGuard<'a, T, C>
    where
        Self: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock()
    }
}

pub struct SpinLockGuard<'a, T, C>
where
    C: CpuLocal,
{
    lock: &'a SpinLock<T, C>,
}

unsafe impl<T, C> Sync for SpinLockGuard<'_, T, C>
where
    T: Sync,
    C: CpuLocal,
{
}

impl<T, C> Drop for SpinLockGuard<'_, T, C>
where
    C: CpuLocal,
{
    fn drop(&mut self) {
        self.lock.lock.release();
    }
}

impl<T, C> Deref for SpinLockGuard<'_, T, C>
where
    C: CpuLocal,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T, C> DerefMut for SpinLockGuard<'_, T, C>
where
    C: CpuLocal,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.value.get() }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::thread::ThreadCpu;

    #[test]
    fn lock_disables_interrupts() {
        thread::spawn(|| {
            let lock = SpinLock::<u32, ThreadCpu>::with_name("test", 0);
            {
                let mut guard = lock.lock();
                *guard += 1;
                assert!(!ThreadCpu::interrupts_enabled());
                assert!(lock.lock.holding());
            }
            assert!(ThreadCpu::interrupts_enabled());
            assert_eq!(lock.into_inner(), 1);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn nested_locks_restore_interrupts_once() {
        thread::spawn(|| {
            let a = SpinLock::<(), ThreadCpu>::with_name("a", ());
            let b = SpinLock::<(), ThreadCpu>::with_name("b", ());
            let ga = a.lock();
            let gb = b.lock();
            drop(ga);
            assert!(!ThreadCpu::interrupts_enabled());
            drop(gb);
            assert!(ThreadCpu::interrupts_enabled());
        })
        .join()
        .unwrap();
    }

    #[test]
    #[should_panic(expected = "reentrant: acquire while holding")]
    fn reentrant_lock_panics() {
        let lock = SpinLock::<(), ThreadCpu>::with_name("reentrant", ());
        let _guard = lock.lock();
        let _again = lock.lock();
    }

    #[test]
    fn excludes_other_threads() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 1000;

        let lock = Arc::new(SpinLock::<(usize, bool), ThreadCpu>::new((0, false)));
        let handles = (0..THREADS)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        lock.with_lock(|(count, inside)| {
                            assert!(!*inside, "two threads inside the critical section");
                            *inside = true;
                            *count += 1;
                            *inside = false;
                        });
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(lock.lock().0, THREADS * ROUNDS);
    }
}
