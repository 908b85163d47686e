//! Bit-level cursor over a fixed byte range.
//!
//! Segment bodies pack fields at arbitrary bit widths, so the decoder reads
//! them through a cursor that supports unaligned multi-bit reads,
//! non-consuming peeks, arbitrary skips and byte re-alignment. Reads past
//! the end of the range return zero bits and latch an overrun flag instead
//! of faulting; callers that trust decoded counts must bound-check them
//! against the remaining buffer themselves.

/// Bit reader over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    /// Index of the byte holding the next unread bit.
    byte: usize,
    /// Unconsumed bits in `data[byte]` (1..=8 while in range).
    bits_left: u8,
    /// Latched once any read or skip ran past the end of the range.
    overrun: bool,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor over the whole of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bits_left: 8,
            overrun: false,
        }
    }

    /// Current position in bits from the start of the range.
    pub fn bit_pos(&self) -> usize {
        self.byte * 8 + (8 - self.bits_left as usize)
    }

    /// Bits left between the cursor and the end of the range.
    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos()
    }

    /// True once the cursor has reached or passed the end of the range.
    pub fn at_end(&self) -> bool {
        self.overrun || self.bit_pos() >= self.data.len() * 8
    }

    /// True if any read or skip went past the end of the range.
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// Read the next `n` bits (n <= 32) as a big-endian-ordered unsigned
    /// integer, consuming them. Bits past the end of the range read as 0.
    pub fn read(&mut self, mut n: u32) -> u32 {
        debug_assert!(n <= 32);
        let mut out: u32 = 0;
        while n > 0 {
            if self.byte >= self.data.len() {
                self.overrun = true;
                // Missing bits read as zero.
                out = if n >= 32 { 0 } else { out << n };
                return out;
            }
            let take = n.min(self.bits_left as u32);
            let shift = self.bits_left as u32 - take;
            let bits = (self.data[self.byte] as u32 >> shift) & ((1u32 << take) - 1);
            out = (out << take) | bits;
            self.bits_left -= take as u8;
            if self.bits_left == 0 {
                self.byte += 1;
                self.bits_left = 8;
            }
            n -= take;
        }
        out
    }

    /// Return the next `n` bits without consuming them.
    pub fn peek(&self, n: u32) -> u32 {
        let mut probe = *self;
        probe.read(n)
    }

    /// Advance the cursor by `n` bits without producing a value.
    ///
    /// Computed from the bit offset directly rather than by looping over
    /// reads, so large skips are O(1).
    pub fn skip(&mut self, n: usize) {
        let total = self.data.len() * 8;
        let pos = self.bit_pos().saturating_add(n);
        if pos >= total {
            if pos > total {
                self.overrun = true;
            }
            self.byte = self.data.len();
            self.bits_left = 8;
        } else {
            self.byte = pos / 8;
            self.bits_left = 8 - (pos % 8) as u8;
        }
    }

    /// Discard the remainder of the current byte, if any.
    pub fn align(&mut self) {
        let rem = self.bit_pos() % 8;
        if rem != 0 {
            self.skip(8 - rem);
        }
    }

    /// The unread bytes from the next byte boundary to the end of the range.
    pub fn remaining_bytes(&self) -> &'a [u8] {
        let start = (self.bit_pos() + 7) / 8;
        &self.data[start.min(self.data.len())..]
    }
}
