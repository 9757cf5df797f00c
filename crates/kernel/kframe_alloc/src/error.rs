#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("no free frame available")]
    OutOfMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("claim start {claim_start:#x} is below kernel end {kernel_end:#x}")]
    ClaimBelowKernelEnd {
        kernel_end: usize,
        claim_start: usize,
    },
    #[error("memory ceiling {phys_top:#x} is below claim start {claim_start:#x}")]
    CeilingBelowClaimStart { claim_start: usize, phys_top: usize },
    #[error("address {addr:#x} cannot be rounded up to a frame boundary")]
    AddressOverflow { addr: usize },
    #[error("kernel end {kernel_end:#x} is below the start of RAM {ram_start:#x}")]
    KernelEndBelowRam { kernel_end: usize, ram_start: usize },
}
