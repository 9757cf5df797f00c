use dataview::Pod;

/// Snapshot of allocator occupancy for `sysinfo`-style reporting.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub struct MemoryInfo {
    /// Frames currently on the free list.
    pub free_frames: usize,
    /// Frames managed by the allocator, free or not.
    pub total_frames: usize,
    /// Bytes per frame.
    pub frame_size: usize,
}

impl MemoryInfo {
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.free_frames * self.frame_size
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_frames * self.frame_size
    }

    #[must_use]
    pub fn used_frames(&self) -> usize {
        self.total_frames - self.free_frames
    }
}
