use core::{fmt, ops::Range, ptr::NonNull};

use kframe_params::FREE_POISON;

use crate::{MemoryInfo, frame::Frame, free_list::FreeList};

/// A frame allocator over a fixed range of physical memory.
///
/// This allocator manages a range of physical memory and provides methods
/// for allocating and freeing frames. Free frames are kept on an intrusive
/// LIFO list, so the most recently freed frame is handed out next.
///
/// Every frame has a reference count in a caller-provided table: 0 while
/// it is free, 1 while exclusively allocated, more while shared. The
/// table is what makes a double free detectable.
///
/// The allocator is not synchronized; see
/// [`LockedFrameAllocator`](crate::LockedFrameAllocator).
pub struct FrameAllocator<'a, const FRAME_SIZE: usize> {
    /// The range of physical memory managed by the allocator.
    frames: Range<NonNull<u8>>,
    free_list: FreeList,
    /// Reference count of each frame, indexed by frame number.
    refs: &'a mut [u8],
    /// The total number of frames managed by the allocator.
    total_frames: usize,
}

impl<const FRAME_SIZE: usize> fmt::Debug for FrameAllocator<'_, FRAME_SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAllocator")
            .field("frames", &self.frames)
            .field("free_list", &self.free_list)
            .field("total_frames", &self.total_frames)
            .finish_non_exhaustive()
    }
}

unsafe impl<const FRAME_SIZE: usize> Send for FrameAllocator<'_, FRAME_SIZE> {}

impl<'a, const FRAME_SIZE: usize> FrameAllocator<'a, FRAME_SIZE> {
    /// Creates an allocator that manages the given range of physical memory
    /// and releases every frame in it, lowest address first.
    ///
    /// The range must be frame-aligned; use
    /// [`BootLayout`](crate::BootLayout) to trim a raw memory range.
    ///
    /// # Safety
    ///
    /// The range must be valid for reads and writes, must not overlap any
    /// other memory region in use, and must not be managed by any other
    /// allocator. Everything stored in it is overwritten.
    ///
    /// # Panics
    ///
    /// Panics if the range is not frame-aligned, or if `refs` has fewer
    /// entries than there are frames in the range.
    pub unsafe fn new(frames: Range<NonNull<u8>>, refs: &'a mut [u8]) -> Self {
        const {
            assert!(FRAME_SIZE.is_power_of_two());
            assert!(size_of::<Option<NonNull<u8>>>() <= FRAME_SIZE);
        }

        assert_eq!(frames.start.addr().get() % FRAME_SIZE, 0);
        assert_eq!(frames.end.addr().get() % FRAME_SIZE, 0);
        assert!(frames.start <= frames.end);

        let total_frames = (frames.end.addr().get() - frames.start.addr().get()) / FRAME_SIZE;
        assert!(
            refs.len() >= total_frames,
            "reference table holds {} entries, {total_frames} frames to manage",
            refs.len(),
        );

        let mut this = Self {
            frames,
            free_list: FreeList::new(),
            refs,
            total_frames,
        };

        let mut p = this.frames.start;
        while p < this.frames.end {
            let index = this.index_of(p);
            this.refs[index] = 1;
            this.free(Frame::new(p));
            p = unsafe { p.byte_add(FRAME_SIZE) };
        }

        log::info!(
            "frame allocator: {} frames of {FRAME_SIZE} bytes in [{:#p}, {:#p})",
            this.total_frames,
            this.frames.start,
            this.frames.end,
        );

        this
    }

    /// Returns the range of physical memory managed by the allocator.
    #[must_use]
    pub fn frames(&self) -> Range<NonNull<u8>> {
        self.frames.clone()
    }

    /// Returns the total number of frames managed by the allocator.
    ///
    /// This includes both allocated and free frames.
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Returns the number of frames currently available for allocation.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.free_list.len()
    }

    #[must_use]
    pub fn info(&self) -> MemoryInfo {
        MemoryInfo {
            free_frames: self.free_frames(),
            total_frames: self.total_frames,
            frame_size: FRAME_SIZE,
        }
    }

    /// Checks if the given pointer is the start of a frame managed by the
    /// allocator.
    #[must_use]
    pub fn manages(&self, ptr: NonNull<u8>) -> bool {
        ptr.addr().get() % FRAME_SIZE == 0 && self.frames.contains(&ptr)
    }

    /// Allocates a frame.
    ///
    /// The contents of the frame are left as they were on the free list.
    /// Returns `None` if no frames are available.
    pub fn alloc(&mut self) -> Option<Frame<FRAME_SIZE>> {
        let page = self.free_list.pop()?;
        let index = self.index_of(page);
        assert_eq!(self.refs[index], 0, "free frame {page:#p} is referenced");
        self.refs[index] = 1;
        Some(Frame::new(page))
    }

    /// Allocates a frame and zeroes it.
    ///
    /// Returns `None` if no frames are available.
    pub fn alloc_zeroed(&mut self) -> Option<Frame<FRAME_SIZE>> {
        let mut frame = self.alloc()?;
        unsafe {
            frame.fill(0);
        }
        Some(frame)
    }

    /// Drops one reference to `frame`, freeing it if it was the last one.
    ///
    /// A freed frame is filled with [`FREE_POISON`] to catch dangling
    /// references, then pushed onto the free list.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not managed by this allocator, or if it is
    /// already free.
    pub fn free(&mut self, mut frame: Frame<FRAME_SIZE>) {
        if self.unref(&frame) {
            // Fill with junk to catch dangling refs.
            unsafe {
                frame.fill(FREE_POISON);
            }
            unsafe { self.link(frame) }
        }
    }

    /// Returns another handle to `frame`, incrementing its reference count.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not managed by this allocator, is free, or
    /// already has the maximum number of references.
    pub fn share(&mut self, frame: &Frame<FRAME_SIZE>) -> Frame<FRAME_SIZE> {
        let index = self.checked_index(frame);
        let count = &mut self.refs[index];
        assert_ne!(*count, 0, "share of free frame {frame:?}");
        *count = count
            .checked_add(1)
            .unwrap_or_else(|| panic!("too many references to {frame:?}"));
        log::trace!("share {frame:?}: {} references", *count);
        Frame::new(frame.as_ptr())
    }

    /// Returns the number of live handles to `frame`.
    #[must_use]
    pub fn ref_count(&self, frame: &Frame<FRAME_SIZE>) -> u8 {
        self.refs[self.checked_index(frame)]
    }

    /// Returns `true` if `frame` is the only handle to its frame.
    #[must_use]
    pub fn is_exclusive(&self, frame: &Frame<FRAME_SIZE>) -> bool {
        self.ref_count(frame) == 1
    }

    /// Drops one reference to `frame`.
    ///
    /// Returns `true` if that was the last reference. The frame then
    /// belongs to the caller alone and must be passed to [`Self::link`].
    pub(crate) fn unref(&mut self, frame: &Frame<FRAME_SIZE>) -> bool {
        let index = self.checked_index(frame);
        let count = &mut self.refs[index];
        assert_ne!(*count, 0, "double free of {frame:?}");
        *count -= 1;
        *count == 0
    }

    /// Pushes a frame whose last reference was dropped onto the free list.
    ///
    /// # Safety
    ///
    /// [`Self::unref`] must have returned `true` for `frame`, and no one may
    /// access the frame afterwards.
    pub(crate) unsafe fn link(&mut self, frame: Frame<FRAME_SIZE>) {
        debug_assert_eq!(self.refs[self.index_of(frame.as_ptr())], 0);
        unsafe { self.free_list.push(frame.into_ptr()) }
    }

    fn checked_index(&self, frame: &Frame<FRAME_SIZE>) -> usize {
        let ptr = frame.as_ptr();
        assert_eq!(ptr.addr().get() % FRAME_SIZE, 0, "{ptr:#p} is not frame-aligned");
        assert!(
            self.frames.contains(&ptr),
            "{ptr:#p} is outside [{:#p}, {:#p})",
            self.frames.start,
            self.frames.end,
        );
        self.index_of(ptr)
    }

    fn index_of(&self, ptr: NonNull<u8>) -> usize {
        (ptr.addr().get() - self.frames.start.addr().get()) / FRAME_SIZE
    }
}
