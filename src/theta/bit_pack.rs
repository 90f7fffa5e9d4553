// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Fixed-width bit packing for the compressed compact image.
//!
//! Values are packed LSB-first within each byte and LSB-first across the
//! byte stream, so a block of 8 values at width `bits` occupies exactly
//! `bits` bytes. The bit order is a wire-format contract.

/// Number of values per packed block.
pub(crate) const BLOCK_WIDTH: usize = 8;

#[inline]
fn low_bit_mask(bits: u8) -> u8 {
    if bits >= 8 { u8::MAX } else { (1u8 << bits) - 1 }
}

/// Packs values of arbitrary widths into a byte buffer.
///
/// The buffer must be zeroed; packed bits are OR-ed in.
///
/// # Panics
///
/// Panics if packing a value would run past the end of the buffer.
pub(crate) struct BitPacker<'a> {
    bytes: &'a mut [u8],
    byte_index: usize,
    bit_offset: u8,
}

impl<'a> BitPacker<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bytes,
            byte_index: 0,
            bit_offset: 0,
        }
    }

    /// Number of bytes touched so far, counting a partially filled byte.
    pub fn bytes_used(&self) -> usize {
        if self.bit_offset == 0 {
            self.byte_index
        } else {
            self.byte_index + 1
        }
    }

    /// Append the low `bits` bits of `value` to the stream.
    pub fn pack_value(&mut self, mut value: u64, mut bits: u8) {
        debug_assert!((1..=63).contains(&bits), "bit width must be in [1, 63]");
        while bits > 0 {
            let avail = 8 - self.bit_offset;
            let take = avail.min(bits);
            let chunk = (value as u8) & low_bit_mask(take);
            self.bytes[self.byte_index] |= chunk << self.bit_offset;
            value >>= take;
            bits -= take;
            self.bit_offset += take;
            if self.bit_offset == 8 {
                self.bit_offset = 0;
                self.byte_index += 1;
            }
        }
    }
}

/// Unpacks values of arbitrary widths from a byte buffer.
///
/// # Panics
///
/// Panics if unpacking a value would run past the end of the buffer.
pub(crate) struct BitUnpacker<'a> {
    bytes: &'a [u8],
    byte_index: usize,
    bit_offset: u8,
}

impl<'a> BitUnpacker<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_index: 0,
            bit_offset: 0,
        }
    }

    /// Read the next `bits` bits from the stream.
    pub fn unpack_value(&mut self, bits: u8) -> u64 {
        debug_assert!((1..=63).contains(&bits), "bit width must be in [1, 63]");
        let mut value = 0u64;
        let mut got = 0u8;
        while got < bits {
            let avail = 8 - self.bit_offset;
            let take = avail.min(bits - got);
            let chunk = (self.bytes[self.byte_index] >> self.bit_offset) & low_bit_mask(take);
            value |= (chunk as u64) << got;
            got += take;
            self.bit_offset += take;
            if self.bit_offset == 8 {
                self.bit_offset = 0;
                self.byte_index += 1;
            }
        }
        value
    }
}

/// Pack a block of [`BLOCK_WIDTH`] values at width `bits`, consuming exactly
/// `bits` bytes of output.
///
/// # Panics
///
/// * Panics if `values.len()` is not [`BLOCK_WIDTH`].
/// * Panics if `bits` is not in `1..=63`.
/// * Panics if `bytes` is shorter than `bits` bytes.
pub(crate) fn pack_bits_block(values: &[u64], bytes: &mut [u8], bits: u8) {
    assert_eq!(values.len(), BLOCK_WIDTH, "block must hold 8 values");
    assert!(
        (1..=63).contains(&bits),
        "wrong number of bits in pack_bits_block8: {bits}"
    );
    assert!(bytes.len() >= bits as usize, "output buffer too small");

    let mut packer = BitPacker::new(&mut bytes[..bits as usize]);
    for &value in values {
        packer.pack_value(value, bits);
    }
}

/// Unpack a block of [`BLOCK_WIDTH`] values at width `bits`, consuming
/// exactly `bits` bytes of input.
///
/// # Panics
///
/// * Panics if `values.len()` is not [`BLOCK_WIDTH`].
/// * Panics if `bits` is not in `1..=63`.
/// * Panics if `bytes` is shorter than `bits` bytes.
pub(crate) fn unpack_bits_block(values: &mut [u64], bytes: &[u8], bits: u8) {
    assert_eq!(values.len(), BLOCK_WIDTH, "block must hold 8 values");
    assert!(
        (1..=63).contains(&bits),
        "wrong number of bits in unpack_bits_block8: {bits}"
    );
    assert!(bytes.len() >= bits as usize, "input buffer too small");

    let mut unpacker = BitUnpacker::new(&bytes[..bits as usize]);
    for value in values.iter_mut() {
        *value = unpacker.unpack_value(bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Deterministic pseudo-random values, masked to the given width.
    fn test_values(bits: u8, count: usize) -> Vec<u64> {
        let mask = if bits == 63 {
            (1u64 << 63) - 1
        } else {
            (1u64 << bits) - 1
        };
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        (0..count)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state & mask
            })
            .collect()
    }

    #[test]
    fn test_block_round_trip_all_widths() {
        for bits in 1..=63u8 {
            let values = test_values(bits, BLOCK_WIDTH);
            let mut bytes = vec![0u8; bits as usize];
            pack_bits_block(&values, &mut bytes, bits);

            let mut unpacked = [0u64; BLOCK_WIDTH];
            unpack_bits_block(&mut unpacked, &bytes, bits);
            assert_eq!(unpacked.as_slice(), values.as_slice(), "width {bits}");
        }
    }

    #[test]
    fn test_stream_round_trip_mixed_widths() {
        // One value of every width, packed back to back.
        let mut bytes = vec![0u8; 260];
        let mut packer = BitPacker::new(&mut bytes);
        for bits in 1..=63u8 {
            packer.pack_value(test_values(bits, 1)[0], bits);
        }
        let used = packer.bytes_used();
        assert_eq!(used, (1..=63u32).sum::<u32>().div_ceil(8) as usize);

        let mut unpacker = BitUnpacker::new(&bytes);
        for bits in 1..=63u8 {
            assert_eq!(unpacker.unpack_value(bits), test_values(bits, 1)[0]);
        }
    }

    #[test]
    fn test_stream_matches_block_layout() {
        // A streamed block and a packed block must produce identical bytes.
        let bits = 11u8;
        let values = test_values(bits, BLOCK_WIDTH);

        let mut block_bytes = vec![0u8; bits as usize];
        pack_bits_block(&values, &mut block_bytes, bits);

        let mut stream_bytes = vec![0u8; bits as usize];
        let mut packer = BitPacker::new(&mut stream_bytes);
        for &v in &values {
            packer.pack_value(v, bits);
        }
        assert_eq!(block_bytes, stream_bytes);
    }

    #[test]
    fn test_bytes_used_counts_partial_byte() {
        let mut bytes = [0u8; 4];
        let mut packer = BitPacker::new(&mut bytes);
        packer.pack_value(0x3, 3);
        assert_eq!(packer.bytes_used(), 1);
        packer.pack_value(0x1F, 5);
        assert_eq!(packer.bytes_used(), 1);
        packer.pack_value(1, 1);
        assert_eq!(packer.bytes_used(), 2);
    }

    #[test]
    #[should_panic(expected = "wrong number of bits in pack_bits_block8")]
    fn test_pack_block_rejects_zero_bits() {
        let values = [0u64; BLOCK_WIDTH];
        let mut bytes = [0u8; 1];
        pack_bits_block(&values, &mut bytes, 0);
    }

    #[test]
    #[should_panic(expected = "wrong number of bits in unpack_bits_block8")]
    fn test_unpack_block_rejects_64_bits() {
        let mut values = [0u64; BLOCK_WIDTH];
        let bytes = [0u8; 64];
        unpack_bits_block(&mut values, &bytes, 64);
    }

    #[test]
    #[should_panic]
    fn test_packer_panics_on_overflow() {
        let mut bytes = [0u8; 4];
        let mut packer = BitPacker::new(&mut bytes);
        for i in 0..5 {
            packer.pack_value(i, 8);
        }
    }
}
