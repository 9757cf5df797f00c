use core::ops::DerefMut;

/// A mutual-exclusion guard around a piece of shared state.
///
/// Implementations must not be reentrant: locking a mutex the caller already
/// holds either deadlocks or panics, it never succeeds.
pub trait Mutex {
    /// The type of the data that the mutex protects.
    type Data;

    /// The type of the guard that the `lock` method returns.
    type Guard<'a>: DerefMut<Target = Self::Data>
    where
        Self: 'a;

    /// Creates a new mutex.
    fn new(data: Self::Data) -> Self;

    /// Locks the mutex.
    fn lock(&self) -> Self::Guard<'_>;

    /// Runs `f` with the mutex held, releasing it before returning.
    ///
    /// Keeps the critical section to exactly the body of `f`.
    fn with_lock<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut Self::Data) -> T,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

#[cfg(all(feature = "std", not(target_os = "none")))]
impl<T> Mutex for std::sync::Mutex<T> {
    type Data = T;
    type Guard<'a>
        = std::sync::MutexGuard<'a, T>
    where
        T: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock().unwrap()
    }
}
