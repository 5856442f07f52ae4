//! Generated code images.

use pjit_ppc::encode::TRAP;

/// Words in the function descriptor header: entry address, environment.
pub const DESCRIPTOR_WORDS: usize = 2;

/// Native code for one program, placed at a fixed address.
///
/// With function descriptors the code is preceded by a two-word header
/// holding the entry address and a zero environment pointer; callers go
/// through the header, chained tail calls read the entry word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    base: u32,
    header: bool,
    words: Vec<u32>,
}

impl GeneratedImage {
    /// Trap-filled image with room for `code_words` instructions.
    pub fn new(base: u32, code_words: usize, header: bool) -> Self {
        let header_words = if header { DESCRIPTOR_WORDS } else { 0 };
        let mut image = Self {
            base,
            header,
            words: vec![TRAP; header_words + code_words],
        };
        if header {
            image.words[0] = image.entry();
            image.words[1] = 0;
        }
        image
    }

    /// Address of the first word, the descriptor when there is one.
    #[inline]
    pub const fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub const fn has_descriptor(&self) -> bool {
        self.header
    }

    #[inline]
    const fn header_words(&self) -> usize {
        if self.header { DESCRIPTOR_WORDS } else { 0 }
    }

    /// Address of the first instruction.
    #[inline]
    pub const fn entry(&self) -> u32 {
        self.base + (self.header_words() as u32) * 4
    }

    /// What a caller holds as the program's function pointer.
    #[inline]
    pub const fn func_addr(&self) -> u32 {
        self.base
    }

    /// Environment pointer stored in the descriptor.
    pub fn env(&self) -> Option<u32> {
        self.header.then(|| self.words[1])
    }

    /// Total size in bytes, header included.
    #[inline]
    pub const fn len_bytes(&self) -> u32 {
        (self.words.len() * 4) as u32
    }

    /// Every word, header included.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Instruction words only.
    #[inline]
    pub fn code(&self) -> &[u32] {
        &self.words[self.header_words()..]
    }

    #[inline]
    pub fn code_mut(&mut self) -> &mut [u32] {
        let start = self.header_words();
        &mut self.words[start..]
    }

    /// Big-endian bytes as they sit in memory.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_image() {
        let image = GeneratedImage::new(0x1000, 3, false);
        assert_eq!(image.entry(), 0x1000);
        assert_eq!(image.func_addr(), 0x1000);
        assert_eq!(image.len_bytes(), 12);
        assert_eq!(image.env(), None);
        assert!(image.code().iter().all(|&w| w == TRAP));
    }

    #[test]
    fn test_descriptor_header() {
        let mut image = GeneratedImage::new(0x2000, 2, true);
        assert_eq!(image.entry(), 0x2008);
        assert_eq!(image.words()[0], 0x2008);
        assert_eq!(image.env(), Some(0));
        assert_eq!(image.len_bytes(), 16);
        image.code_mut()[0] = 0x6000_0000;
        assert_eq!(image.words()[2], 0x6000_0000);
        assert_eq!(&image.to_bytes()[8..12], &[0x60, 0, 0, 0]);
    }
}
