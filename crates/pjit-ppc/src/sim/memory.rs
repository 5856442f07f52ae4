//! Sparse big-endian guest memory.

use rustc_hash::FxHashMap;

use super::SimError;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Page-granular memory. Only mapped pages are readable or writable;
/// everything else faults.
#[derive(Default)]
pub struct Memory {
    pages: FxHashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map zero-filled pages covering `[addr, addr + len)`. Already mapped
    /// pages keep their contents.
    pub fn map(&mut self, addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let first = addr >> PAGE_SHIFT;
        let last = addr.saturating_add(len - 1) >> PAGE_SHIFT;
        for page in first..=last {
            self.pages
                .entry(page)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        }
    }

    /// Whether every byte of `[addr, addr + len)` is mapped.
    pub fn is_mapped(&self, addr: u32, len: u32) -> bool {
        if len == 0 {
            return true;
        }
        let Some(end) = addr.checked_add(len - 1) else {
            return false;
        };
        ((addr >> PAGE_SHIFT)..=(end >> PAGE_SHIFT)).all(|page| self.pages.contains_key(&page))
    }

    #[inline]
    fn byte(&self, addr: u32) -> Result<u8, SimError> {
        self.pages
            .get(&(addr >> PAGE_SHIFT))
            .map(|page| page[(addr as usize) & (PAGE_SIZE - 1)])
            .ok_or(SimError::Fault { addr })
    }

    #[inline]
    fn byte_mut(&mut self, addr: u32) -> Result<&mut u8, SimError> {
        self.pages
            .get_mut(&(addr >> PAGE_SHIFT))
            .map(|page| &mut page[(addr as usize) & (PAGE_SIZE - 1)])
            .ok_or(SimError::Fault { addr })
    }

    pub fn read_bytes(&self, addr: u32, out: &mut [u8]) -> Result<(), SimError> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.byte(addr.wrapping_add(i as u32))?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<(), SimError> {
        // Check the whole range first so a faulting write leaves memory intact.
        if !self.is_mapped(addr, data.len() as u32) {
            let addr = (0..data.len() as u32)
                .map(|i| addr.wrapping_add(i))
                .find(|&a| self.byte(a).is_err())
                .unwrap_or(addr);
            return Err(SimError::Fault { addr });
        }
        for (i, &value) in data.iter().enumerate() {
            *self.byte_mut(addr.wrapping_add(i as u32))? = value;
        }
        Ok(())
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, SimError> {
        self.byte(addr)
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, SimError> {
        let mut buf = [0; 2];
        self.read_bytes(addr, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, SimError> {
        let mut buf = [0; 4];
        self.read_bytes(addr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_u64(&self, addr: u32) -> Result<u64, SimError> {
        let mut buf = [0; 8];
        self.read_bytes(addr, &mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), SimError> {
        self.write_bytes(addr, &[value])
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), SimError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), SimError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    pub fn write_u64(&mut self, addr: u32, value: u64) -> Result<(), SimError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    /// Write consecutive instruction words.
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), SimError> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.write_bytes(addr, &bytes)
    }
}
