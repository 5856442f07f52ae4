//! Executable memory for generated images.

use parking_lot::Mutex;
use tracing::trace;

/// Image alignment in bytes.
pub const IMAGE_ALIGN: u32 = 16;

/// Source of executable memory.
///
/// Shared between concurrent compilations, so both operations take `&self`.
pub trait ImageAllocator: Send + Sync {
    /// Reserve `bytes` bytes and return the base address, or `None` when
    /// out of space.
    fn allocate(&self, bytes: u32) -> Option<u32>;

    /// Make `[addr, addr + len)` visible to instruction fetch.
    fn flush_icache(&self, addr: u32, len: u32);
}

struct BumpState {
    next: u32,
    flushes: Vec<(u32, u32)>,
}

/// Hands out consecutive aligned regions of a fixed address range and
/// records every flush request.
pub struct BumpAllocator {
    base: u32,
    end: u32,
    state: Mutex<BumpState>,
}

impl BumpAllocator {
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            base,
            end: base.saturating_add(size),
            state: Mutex::new(BumpState {
                next: base,
                flushes: Vec::new(),
            }),
        }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Bytes handed out so far, including alignment padding.
    pub fn used(&self) -> u32 {
        self.state.lock().next - self.base
    }

    /// Flushed ranges in request order.
    pub fn flushes(&self) -> Vec<(u32, u32)> {
        self.state.lock().flushes.clone()
    }
}

impl ImageAllocator for BumpAllocator {
    fn allocate(&self, bytes: u32) -> Option<u32> {
        let mut state = self.state.lock();
        let addr = state.next.checked_next_multiple_of(IMAGE_ALIGN)?;
        let end = addr.checked_add(bytes)?;
        if end > self.end {
            return None;
        }
        state.next = end;
        trace!(addr, bytes, "allocated image");
        Some(addr)
    }

    fn flush_icache(&self, addr: u32, len: u32) {
        self.state.lock().flushes.push((addr, len));
    }
}

impl<T: ImageAllocator + ?Sized> ImageAllocator for &T {
    fn allocate(&self, bytes: u32) -> Option<u32> {
        (**self).allocate(bytes)
    }

    fn flush_icache(&self, addr: u32, len: u32) {
        (**self).flush_icache(addr, len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_alignment() {
        let alloc = BumpAllocator::new(0x1_0000, 0x100);
        assert_eq!(alloc.allocate(12), Some(0x1_0000));
        assert_eq!(alloc.allocate(4), Some(0x1_0010));
        assert_eq!(alloc.used(), 0x14);
    }

    #[test]
    fn test_bump_exhaustion() {
        let alloc = BumpAllocator::new(0x1_0000, 0x40);
        assert_eq!(alloc.allocate(0x40), Some(0x1_0000));
        assert_eq!(alloc.allocate(4), None);
        // A failed request leaves the cursor alone.
        assert_eq!(alloc.used(), 0x40);
    }

    #[test]
    fn test_flushes_recorded() {
        let alloc = BumpAllocator::new(0x1_0000, 0x100);
        alloc.flush_icache(0x1_0000, 32);
        alloc.flush_icache(0x1_0020, 8);
        assert_eq!(alloc.flushes(), vec![(0x1_0000, 32), (0x1_0020, 8)]);
    }
}
