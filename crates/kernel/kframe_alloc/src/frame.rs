use core::{fmt, num::NonZero, ptr::NonNull};

/// An owned reference to one allocated physical frame.
///
/// A `Frame` is obtained from the allocator and handed back to it to be
/// released. It is neither `Clone` nor `Copy`: giving it back consumes it,
/// so one handle cannot be released twice. A second handle to the same
/// frame only exists when the frame is explicitly shared.
///
/// Dropping a `Frame` without releasing it leaks the frame.
#[must_use]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame<const FRAME_SIZE: usize> {
    ptr: NonNull<u8>,
}

unsafe impl<const FRAME_SIZE: usize> Send for Frame<FRAME_SIZE> {}
unsafe impl<const FRAME_SIZE: usize> Sync for Frame<FRAME_SIZE> {}

impl<const FRAME_SIZE: usize> fmt::Debug for Frame<FRAME_SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#p})", self.ptr)
    }
}

impl<const FRAME_SIZE: usize> Frame<FRAME_SIZE> {
    pub(crate) fn new(ptr: NonNull<u8>) -> Self {
        debug_assert_eq!(ptr.addr().get() % FRAME_SIZE, 0);
        Self { ptr }
    }

    /// Rebuilds a handle from the address of a frame.
    ///
    /// This is how the page-table layer gets a frame back from a physical
    /// address it stored in a page table entry.
    ///
    /// # Safety
    ///
    /// `ptr` must be the address of an allocated frame, and the caller must
    /// own one of its references, previously given up with
    /// [`Frame::into_ptr`].
    pub unsafe fn from_ptr(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Gives up the handle, returning the frame address.
    ///
    /// The frame stays allocated until a handle rebuilt with
    /// [`Frame::from_ptr`] is released.
    #[must_use]
    pub fn into_ptr(self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the starting physical address of the frame.
    #[must_use]
    pub fn addr(&self) -> NonZero<usize> {
        self.ptr.addr()
    }

    #[must_use]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the frame contents.
    ///
    /// # Safety
    ///
    /// No other handle to this frame may be writing to it.
    #[must_use]
    pub unsafe fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        unsafe { self.ptr.cast().as_ref() }
    }

    /// Returns the frame contents mutably.
    ///
    /// # Safety
    ///
    /// No other handle to this frame may be accessing it.
    pub unsafe fn as_bytes_mut(&mut self) -> &mut [u8; FRAME_SIZE] {
        unsafe { self.ptr.cast().as_mut() }
    }

    /// Overwrites the whole frame with `byte`.
    ///
    /// # Safety
    ///
    /// No other handle to this frame may be accessing it.
    pub(crate) unsafe fn fill(&mut self, byte: u8) {
        unsafe {
            self.ptr.write_bytes(byte, FRAME_SIZE);
        }
    }
}
