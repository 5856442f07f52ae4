//! Instruction index to code offset mapping.

/// Byte offset of each VM instruction's code, plus one trailing entry for
/// the epilogue.
///
/// The body pass writes entry `i` before translating instruction `i`.
/// Forward branches read entries written by the previous pass, which is
/// why the body is generated more than once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressTable {
    offsets: Vec<u32>,
}

impl AddressTable {
    /// Table for a program of `len` instructions.
    pub fn new(len: usize) -> Self {
        Self {
            offsets: vec![0; len + 1],
        }
    }

    /// Number of VM instructions covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn set(&mut self, index: usize, offset: u32) {
        self.offsets[index] = offset;
    }

    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        self.offsets[index]
    }

    /// Offset of the epilogue.
    #[inline]
    pub fn exit(&self) -> u32 {
        self.offsets[self.len()]
    }

    /// Offset a branch at `index` with relative offset `off` lands on, or
    /// `None` if the target is outside the program. Landing on the
    /// trailing entry means falling into the epilogue.
    pub fn target(&self, index: usize, off: i16) -> Option<u32> {
        let target = index as i64 + 1 + i64::from(off);
        usize::try_from(target)
            .ok()
            .and_then(|t| self.offsets.get(t))
            .copied()
    }
}
