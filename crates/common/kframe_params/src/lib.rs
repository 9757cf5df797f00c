#![no_std]

/// Bytes per physical frame.
pub const FRAME_SIZE: usize = 4096;

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

/// Physical address where RAM begins and the kernel is loaded.
pub const KERNEL_BASE: usize = 0x8000_0000;

/// Amount of RAM the allocator is configured to manage.
const PHYS_MEMORY_SIZE: usize = 128 * 1024 * 1024;

/// Physical memory ceiling: the first address the allocator never claims.
pub const PHYS_TOP: usize = KERNEL_BASE + PHYS_MEMORY_SIZE;

/// Number of frames between [`KERNEL_BASE`] and [`PHYS_TOP`].
///
/// Sizes the kernel's per-frame reference table.
pub const MAX_FRAMES: usize = PHYS_MEMORY_SIZE / FRAME_SIZE;

/// Byte written over every frame when it is released.
pub const FREE_POISON: u8 = 0x01;

const _: () = assert!(FRAME_SIZE.is_power_of_two());
const _: () = assert!(KERNEL_BASE % FRAME_SIZE == 0);
const _: () = assert!(PHYS_TOP % FRAME_SIZE == 0);
