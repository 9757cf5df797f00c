//! The physical memory range handed to the allocator at boot.
//!
//! Memory between the end of the kernel image and the physical ceiling is
//! managed by the frame allocator, except that another boot-time component
//! may reserve a prefix of it for its own use. The reservation is expressed
//! by a single address, the claim start: the allocator owns every full
//! frame from there up to the ceiling, and nothing below it.

use core::{num::NonZero, ops::Range, ptr::NonNull};

use kframe_params::{KERNEL_BASE, MAX_FRAMES, PHYS_TOP};

use crate::error::LayoutError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootLayout<const FRAME_SIZE: usize> {
    kernel_end: NonNull<u8>,
    claim_start: NonNull<u8>,
    phys_top: NonNull<u8>,
    frames: Range<NonNull<u8>>,
}

impl<const FRAME_SIZE: usize> BootLayout<FRAME_SIZE> {
    /// Lets the allocator claim everything from `kernel_end` up to
    /// `phys_top`.
    pub fn new(kernel_end: NonNull<u8>, phys_top: NonNull<u8>) -> Result<Self, LayoutError> {
        Self::with_claim_start(kernel_end, kernel_end, phys_top)
    }

    /// Lets the allocator claim everything from `claim_start` up to
    /// `phys_top`; `[kernel_end, claim_start)` belongs to someone else.
    ///
    /// Partial frames at either end are left out.
    pub fn with_claim_start(
        kernel_end: NonNull<u8>,
        claim_start: NonNull<u8>,
        phys_top: NonNull<u8>,
    ) -> Result<Self, LayoutError> {
        const {
            assert!(FRAME_SIZE.is_power_of_two());
        }

        if claim_start < kernel_end {
            return Err(LayoutError::ClaimBelowKernelEnd {
                kernel_end: kernel_end.addr().get(),
                claim_start: claim_start.addr().get(),
            });
        }
        if phys_top < claim_start {
            return Err(LayoutError::CeilingBelowClaimStart {
                claim_start: claim_start.addr().get(),
                phys_top: phys_top.addr().get(),
            });
        }

        let first = claim_start
            .addr()
            .get()
            .checked_next_multiple_of(FRAME_SIZE)
            .and_then(NonZero::new)
            .ok_or(LayoutError::AddressOverflow {
                addr: claim_start.addr().get(),
            })?;
        let last = phys_top.addr().get() & !(FRAME_SIZE - 1);
        // a range shorter than one frame leaves nothing to manage
        let end = NonZero::new(last).filter(|&end| end > first).unwrap_or(first);

        Ok(Self {
            kernel_end,
            claim_start,
            phys_top,
            frames: claim_start.with_addr(first)..phys_top.with_addr(end),
        })
    }

    #[must_use]
    pub fn kernel_end(&self) -> NonNull<u8> {
        self.kernel_end
    }

    /// Returns the first address the allocator may claim.
    #[must_use]
    pub fn claim_start(&self) -> NonNull<u8> {
        self.claim_start
    }

    #[must_use]
    pub fn phys_top(&self) -> NonNull<u8> {
        self.phys_top
    }

    /// Returns the frame-aligned range the allocator manages.
    #[must_use]
    pub fn frames(&self) -> Range<NonNull<u8>> {
        self.frames.clone()
    }

    /// Returns the number of full frames in [`Self::frames`].
    #[must_use]
    pub fn frame_count(&self) -> usize {
        (self.frames.end.addr().get() - self.frames.start.addr().get()) / FRAME_SIZE
    }
}

impl BootLayout<{ kframe_params::FRAME_SIZE }> {
    /// Lets the allocator claim everything from `kernel_end` up to
    /// [`PHYS_TOP`].
    ///
    /// The result never holds more than [`MAX_FRAMES`] frames, so a
    /// [`KernelRefTable`](crate::locked::KernelRefTable) always covers it.
    pub fn up_to_phys_top(kernel_end: NonNull<u8>) -> Result<Self, LayoutError> {
        if kernel_end.addr().get() < KERNEL_BASE {
            return Err(LayoutError::KernelEndBelowRam {
                kernel_end: kernel_end.addr().get(),
                ram_start: KERNEL_BASE,
            });
        }
        let phys_top = kernel_end.with_addr(const { NonZero::new(PHYS_TOP).unwrap() });
        let layout = Self::new(kernel_end, phys_top)?;
        debug_assert!(layout.frame_count() <= MAX_FRAMES);
        Ok(layout)
    }
}
