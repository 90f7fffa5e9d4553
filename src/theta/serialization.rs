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

//! Binary image layout for Theta sketches and set operations.
//!
//! Every image starts with an 8-byte preamble:
//!
//! ```text
//! byte 0   preamble longs (low 6 bits) | lg resize factor (high 2 bits)
//! byte 1   serial version (3 = standard, 4 = compressed compact)
//! byte 2   family id
//! byte 3   lg nominal entries (0 for compact)
//! byte 4   lg table size (0 for compact)
//! byte 5   flags
//! byte 6-7 seed hash, little-endian
//! ```
//!
//! Depending on the preamble length, the next longs carry the retained count
//! and sampling probability (2nd long), theta (3rd long), and for unions the
//! union theta (4th long). Everything is little-endian.

use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hash::compute_seed_hash;

/// Family id of the QuickSelect update sketch.
pub(crate) const FAMILY_QUICKSELECT: u8 = 2;
/// Family id of compact sketches.
pub(crate) const FAMILY_COMPACT: u8 = 3;
/// Family id of the union operator state.
pub(crate) const FAMILY_UNION: u8 = 4;
/// Family id of the intersection operator state.
pub(crate) const FAMILY_INTERSECTION: u8 = 5;

/// Standard serial version.
pub(crate) const SERIAL_VERSION: u8 = 3;
/// Serial version of the compressed (delta bit-packed) compact image.
pub(crate) const SERIAL_VERSION_COMPRESSED: u8 = 4;

/// Preamble size for empty and single-item compact images (1 long).
pub(crate) const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble size for exact-mode compact images (2 longs).
pub(crate) const PREAMBLE_LONGS_EXACT: u8 = 2;
/// Preamble size for estimation-mode compact images and table images (3 longs).
pub(crate) const PREAMBLE_LONGS_ESTIMATION: u8 = 3;
/// Preamble size for union images (3 longs plus the union theta).
pub(crate) const PREAMBLE_LONGS_UNION: u8 = 4;

// Flags (byte 5) - bit masks
/// Flag: data is in big-endian format (never set; readers reject it)
pub(crate) const FLAG_BIG_ENDIAN: u8 = 1 << 0;
/// Flag: sketch is read-only (compact sketches are read-only)
pub(crate) const FLAG_READ_ONLY: u8 = 1 << 1;
/// Flag: sketch is empty
pub(crate) const FLAG_EMPTY: u8 = 1 << 2;
/// Flag: sketch is in compact format
pub(crate) const FLAG_COMPACT: u8 = 1 << 3;
/// Flag: hash values are ordered (sorted)
pub(crate) const FLAG_ORDERED: u8 = 1 << 4;
/// Flag: sketch contains a single item (special 16-byte image)
pub(crate) const FLAG_SINGLE_ITEM: u8 = 1 << 5;

/// Size of a single hash entry in bytes (u64)
pub(crate) const HASH_SIZE_BYTES: usize = 8;

/// Bit pattern of p = 1.0, written in images that carry no sampling.
pub(crate) const DEFAULT_P_FLOAT_BITS: u32 = 0x3F80_0000;

/// The canonical 8-byte image of an empty compact sketch.
pub(crate) const EMPTY_COMPACT_IMAGE: [u8; 8] = [
    PREAMBLE_LONGS_EMPTY,
    SERIAL_VERSION,
    FAMILY_COMPACT,
    0,
    0,
    FLAG_READ_ONLY | FLAG_EMPTY | FLAG_COMPACT | FLAG_ORDERED,
    0,
    0,
];

/// Parsed first 8 bytes of an image.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Preamble {
    pub pre_longs: u8,
    pub lg_resize_factor: u8,
    pub ser_ver: u8,
    pub family: u8,
    pub lg_nom: u8,
    pub lg_arr: u8,
    pub flags: u8,
    pub seed_hash: u16,
}

impl Preamble {
    /// Read and structurally validate the 8-byte preamble.
    pub fn read(cursor: &mut SketchSlice<'_>) -> Result<Self, Error> {
        let byte0 = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let ser_ver = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let family = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let lg_nom = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let lg_arr = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let flags = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble"))?;
        let seed_hash = cursor
            .read_u16_le()
            .map_err(|_| Error::insufficient_data("preamble"))?;

        let preamble = Self {
            pre_longs: byte0 & 0x3F,
            lg_resize_factor: byte0 >> 6,
            ser_ver,
            family,
            lg_nom,
            lg_arr,
            flags,
            seed_hash,
        };

        if preamble.flags & FLAG_BIG_ENDIAN != 0 {
            return Err(Error::deserial("big-endian images are not supported"));
        }
        Ok(preamble)
    }

    pub fn expect_family(&self, family: u8, name: &'static str) -> Result<(), Error> {
        if self.family != family {
            return Err(Error::invalid_family(family, self.family, name));
        }
        Ok(())
    }

    /// Verify the stored seed hash against the expected seed and return the
    /// effective seed hash.
    ///
    /// An `expected_seed` of 0 skips the check. A stored seed hash of 0 is
    /// only legal for empty images.
    pub fn check_seed(&self, expected_seed: u64) -> Result<u16, Error> {
        if self.seed_hash == 0 {
            if !self.is_empty() {
                return Err(Error::deserial("seed hash 0 on a non-empty image"));
            }
            return Ok(if expected_seed == 0 {
                0
            } else {
                compute_seed_hash(expected_seed)
            });
        }
        if expected_seed == 0 {
            return Ok(self.seed_hash);
        }
        let expected = compute_seed_hash(expected_seed);
        if self.seed_hash != expected {
            return Err(Error::seed_hash_mismatch(expected, self.seed_hash));
        }
        Ok(self.seed_hash)
    }

    pub fn is_empty(&self) -> bool {
        self.flags & FLAG_EMPTY != 0
    }

    pub fn is_compact(&self) -> bool {
        self.flags & FLAG_COMPACT != 0
    }

    pub fn is_ordered(&self) -> bool {
        self.flags & FLAG_ORDERED != 0
    }

    pub fn is_single_item(&self) -> bool {
        self.flags & FLAG_SINGLE_ITEM != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_masks_are_distinct_bits() {
        assert_eq!(FLAG_BIG_ENDIAN, 1);
        assert_eq!(FLAG_READ_ONLY, 2);
        assert_eq!(FLAG_EMPTY, 4);
        assert_eq!(FLAG_COMPACT, 8);
        assert_eq!(FLAG_ORDERED, 16);
        assert_eq!(FLAG_SINGLE_ITEM, 32);
    }

    #[test]
    fn test_empty_compact_image_bytes() {
        assert_eq!(EMPTY_COMPACT_IMAGE, [1, 3, 3, 0, 0, 0x1E, 0, 0]);
    }

    #[test]
    fn test_preamble_read_splits_byte0() {
        // pre_longs = 3, lg_resize_factor = 2
        let bytes = [3 | (2 << 6), 3, 2, 12, 13, 0, 0xAB, 0xCD];
        let mut cursor = SketchSlice::new(&bytes);
        let preamble = Preamble::read(&mut cursor).unwrap();
        assert_eq!(preamble.pre_longs, 3);
        assert_eq!(preamble.lg_resize_factor, 2);
        assert_eq!(preamble.family, 2);
        assert_eq!(preamble.lg_nom, 12);
        assert_eq!(preamble.lg_arr, 13);
        assert_eq!(preamble.seed_hash, 0xCDAB);
    }

    #[test]
    fn test_preamble_rejects_big_endian_flag() {
        let bytes = [1, 3, 3, 0, 0, FLAG_BIG_ENDIAN, 0, 0];
        let mut cursor = SketchSlice::new(&bytes);
        assert!(Preamble::read(&mut cursor).is_err());
    }

    #[test]
    fn test_seed_hash_zero_rejected_when_not_empty() {
        let bytes = [2, 3, 3, 0, 0, FLAG_COMPACT, 0, 0];
        let mut cursor = SketchSlice::new(&bytes);
        let preamble = Preamble::read(&mut cursor).unwrap();
        assert!(preamble.check_seed(9001).is_err());
    }
}
