//! Intrusive LIFO list of free frames.
//!
//! While a frame is free, its first bytes hold a [`Link`] to the next free
//! frame. The rest of the frame is left as the caller poisoned it.

use core::ptr::NonNull;

/// Represents a single free frame in the list.
struct Link {
    /// Pointer to the next free frame, or `None` at the end of the chain.
    next: Option<NonNull<Link>>,
}

#[derive(Debug)]
pub(crate) struct FreeList {
    head: Option<NonNull<Link>>,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Returns the number of frames on the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Pushes `frame` onto the head of the list.
    ///
    /// # Safety
    ///
    /// `frame` must be valid for writes of a [`Link`], suitably aligned, not
    /// already on the list, and not accessed by anyone else until popped.
    pub(crate) unsafe fn push(&mut self, frame: NonNull<u8>) {
        let link = frame.cast::<Link>();
        unsafe {
            link.write(Link { next: self.head });
        }
        self.head = Some(link);
        self.len += 1;
    }

    /// Pops the most recently pushed frame.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let link = self.head?;
        self.head = unsafe { link.as_ref().next };
        self.len -= 1;
        Some(link.cast())
    }

    /// Walks the list from head to tail.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = NonNull<u8>> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let link = cursor?;
            cursor = unsafe { link.as_ref().next };
            Some(link.cast())
        })
    }
}
