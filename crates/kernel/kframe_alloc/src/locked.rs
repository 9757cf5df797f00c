use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use kframe_params::{FRAME_SIZE, FREE_POISON, MAX_FRAMES};
use kframe_sync::{CpuLocal, Mutex, SpinLock};

use crate::{BootLayout, FrameAllocError, FrameAllocator, LayoutError, MemoryInfo, frame::Frame};

/// The kernel's allocator: 4096-byte frames behind a [`SpinLock`].
pub type KernelFrameAllocator<'a, C> =
    LockedFrameAllocator<SpinLock<FrameAllocator<'a, FRAME_SIZE>, C>>;

/// Reference counts for every frame of RAM, up to
/// [`PHYS_TOP`](kframe_params::PHYS_TOP).
pub type KernelRefTable = [u8; MAX_FRAMES];

/// A [`FrameAllocator`] shared between CPUs.
///
/// Each operation takes the lock for only a handful of pointer updates.
/// Filling frames (poison on release, zeroes on request) happens outside
/// the lock, while the caller owns the frame exclusively.
#[derive(Debug)]
pub struct LockedFrameAllocator<M> {
    allocator: M,
}

impl<'a, M, const N: usize> LockedFrameAllocator<M>
where
    M: Mutex<Data = FrameAllocator<'a, N>>,
{
    #[must_use]
    pub fn new(allocator: FrameAllocator<'a, N>) -> Self {
        Self::from_mutex(M::new(allocator))
    }

    #[must_use]
    pub fn from_mutex(allocator: M) -> Self {
        Self { allocator }
    }

    /// Allocates one frame.
    ///
    /// The frame's contents are unspecified. Returns
    /// [`FrameAllocError::OutOfMemory`] if every frame is in use; the
    /// caller decides whether to fail or retry later.
    pub fn acquire(&self) -> Result<Frame<N>, FrameAllocError> {
        self.allocator.with_lock(FrameAllocator::alloc).ok_or_else(|| {
            log::warn!("frame allocator exhausted");
            FrameAllocError::OutOfMemory
        })
    }

    /// Allocates one frame filled with zeroes.
    pub fn acquire_zeroed(&self) -> Result<Frame<N>, FrameAllocError> {
        let mut frame = self.acquire()?;
        unsafe {
            frame.fill(0);
        }
        Ok(frame)
    }

    /// Releases one reference to `frame`.
    ///
    /// When this was the last reference the frame is filled with poison and
    /// becomes the next frame [`Self::acquire`] hands out.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not managed by this allocator, or if it is
    /// already free.
    pub fn release(&self, mut frame: Frame<N>) {
        if !self.allocator.with_lock(|a| a.unref(&frame)) {
            return;
        }

        // Fill with junk to catch dangling refs.
        unsafe {
            frame.fill(FREE_POISON);
        }
        self.allocator.with_lock(|a| unsafe { a.link(frame) });
    }

    /// Returns another handle to `frame`, for mapping it copy-on-write
    /// into a second address space.
    pub fn share(&self, frame: &Frame<N>) -> Frame<N> {
        self.allocator.with_lock(|a| a.share(frame))
    }

    /// Returns `true` if `frame` is the only handle to its frame, so a
    /// copy-on-write fault may write to it in place.
    #[must_use]
    pub fn is_exclusive(&self, frame: &Frame<N>) -> bool {
        self.allocator.with_lock(|a| a.is_exclusive(frame))
    }

    #[must_use]
    pub fn ref_count(&self, frame: &Frame<N>) -> u8 {
        self.allocator.with_lock(|a| a.ref_count(frame))
    }

    #[must_use]
    pub fn manages(&self, ptr: NonNull<u8>) -> bool {
        self.allocator.with_lock(|a| a.manages(ptr))
    }

    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.allocator.with_lock(|a| a.free_frames())
    }

    /// Retrieves memory information, including the number of free and
    /// total frames.
    #[must_use]
    pub fn info(&self) -> MemoryInfo {
        self.allocator.with_lock(|a| a.info())
    }
}

impl<'a, C> KernelFrameAllocator<'a, C>
where
    C: CpuLocal,
{
    /// Builds the kernel's allocator from the boot memory layout.
    ///
    /// The boot hart calls this once, before any other CPU is started.
    ///
    /// # Safety
    ///
    /// The memory in `layout.frames()` must be unused and must not be
    /// managed by any other allocator.
    pub unsafe fn boot(layout: &BootLayout<FRAME_SIZE>, refs: &'a mut [u8]) -> Self {
        let allocator = unsafe { FrameAllocator::new(layout.frames(), refs) };
        Self::from_mutex(SpinLock::with_name("kmem", allocator))
    }

    /// Builds the kernel's allocator over all RAM from `kernel_end` up to
    /// [`PHYS_TOP`](kframe_params::PHYS_TOP).
    ///
    /// # Safety
    ///
    /// Same as [`Self::boot`]: RAM above `kernel_end` must be unused.
    pub unsafe fn boot_up_to_phys_top(
        kernel_end: NonNull<u8>,
        refs: &'a mut KernelRefTable,
    ) -> Result<Self, LayoutError> {
        let layout = BootLayout::up_to_phys_top(kernel_end)?;
        Ok(unsafe { Self::boot(&layout, refs) })
    }
}

fn fits_in_frame<const N: usize>(layout: Layout) -> bool {
    layout.size() <= N && layout.align() <= N
}

/// Serves heap requests with whole frames.
///
/// Any layout no larger than a frame and no more aligned than a frame gets a
/// frame of its own; anything bigger gets a null pointer.
unsafe impl<'a, M, const N: usize> GlobalAlloc for LockedFrameAllocator<M>
where
    M: Mutex<Data = FrameAllocator<'a, N>>,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !fits_in_frame::<N>(layout) {
            return ptr::null_mut();
        }
        self.acquire()
            .map_or(ptr::null_mut(), |frame| frame.into_ptr().as_ptr())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if !fits_in_frame::<N>(layout) {
            return ptr::null_mut();
        }
        self.acquire_zeroed()
            .map_or(ptr::null_mut(), |frame| frame.into_ptr().as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        assert!(fits_in_frame::<N>(layout), "{layout:?} does not fit in a frame");
        let Some(ptr) = NonNull::new(ptr) else {
            panic!("dealloc of null pointer");
        };
        self.release(unsafe { Frame::from_ptr(ptr) });
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // the frame already holds up to N bytes
        if fits_in_frame::<N>(layout) && new_size <= N {
            return ptr;
        }
        ptr::null_mut()
    }
}
