//! Physical frame allocator for user processes, kernel stacks, page-table
//! pages and pipe buffers.
//!
//! Hands out whole fixed-size frames. Free frames are kept on an intrusive
//! list threaded through the frames themselves, so the allocator needs no
//! memory of its own beyond one reference-count byte per frame.
#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod frame;
pub mod frame_allocator;
mod free_list;
pub mod info;
pub mod layout;
pub mod locked;

pub use self::{
    error::{FrameAllocError, LayoutError},
    frame::Frame,
    frame_allocator::FrameAllocator,
    info::MemoryInfo,
    layout::BootLayout,
    locked::{KernelFrameAllocator, KernelRefTable, LockedFrameAllocator},
};
