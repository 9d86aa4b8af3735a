// Weak rolling checksum (rsync "checksum1").
//
//   a = sum(x_i + CHAR_OFFSET)              mod 2^16
//   b = sum((len - i) * (x_i + CHAR_OFFSET)) mod 2^16
//   digest = (b << 16) | a
//
// Sliding the window by one byte is O(1).

/// Offset added to every byte so runs of zeros still move the sums.
const CHAR_OFFSET: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rolling {
    a: u32,
    b: u32,
    len: u32,
}

impl Rolling {
    /// Checksum of a full window.
    pub fn new(window: &[u8]) -> Self {
        let len = window.len() as u32;
        let mut a: u32 = 0;
        let mut b: u32 = 0;
        for (i, &byte) in window.iter().enumerate() {
            let x = u32::from(byte) + CHAR_OFFSET;
            a = a.wrapping_add(x);
            b = b.wrapping_add((len - i as u32).wrapping_mul(x));
        }
        Self {
            a: a & 0xFFFF,
            b: b & 0xFFFF,
            len,
        }
    }

    /// Slide the window one byte: drop `out` from the front, append `inb`.
    #[inline(always)]
    pub fn roll(&mut self, out: u8, inb: u8) {
        let out = u32::from(out) + CHAR_OFFSET;
        let inb = u32::from(inb) + CHAR_OFFSET;
        self.a = self.a.wrapping_sub(out).wrapping_add(inb) & 0xFFFF;
        self.b = self
            .b
            .wrapping_sub(self.len.wrapping_mul(out))
            .wrapping_add(self.a)
            & 0xFFFF;
    }

    #[inline(always)]
    pub fn digest(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// Convenience: weak checksum of `data`.
#[inline]
pub fn weak_checksum(data: &[u8]) -> u32 {
    Rolling::new(data).digest()
}
