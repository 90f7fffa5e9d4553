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

//! Compact theta sketch: the immutable result form.
//!
//! A compact sketch carries only theta, the retained hashes, and the seed
//! hash; there is no hash table. It is what update sketches compact into,
//! what set operations return, and what travels over the wire. Two image
//! encodings exist:
//!
//! - serial version 3: plain little-endian hashes, with dedicated 8-byte
//!   empty and 16-byte single-item forms;
//! - serial version 4: ordered hashes stored as bit-packed deltas.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::common::binomial_bounds;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::ThetaSketchView;
use crate::theta::bit_pack::BLOCK_WIDTH;
use crate::theta::bit_pack::BitPacker;
use crate::theta::bit_pack::BitUnpacker;
use crate::theta::bit_pack::pack_bits_block;
use crate::theta::bit_pack::unpack_bits_block;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::serialization::DEFAULT_P_FLOAT_BITS;
use crate::theta::serialization::EMPTY_COMPACT_IMAGE;
use crate::theta::serialization::FAMILY_COMPACT;
use crate::theta::serialization::FLAG_COMPACT;
use crate::theta::serialization::FLAG_ORDERED;
use crate::theta::serialization::FLAG_READ_ONLY;
use crate::theta::serialization::FLAG_SINGLE_ITEM;
use crate::theta::serialization::HASH_SIZE_BYTES;
use crate::theta::serialization::PREAMBLE_LONGS_EMPTY;
use crate::theta::serialization::PREAMBLE_LONGS_ESTIMATION;
use crate::theta::serialization::PREAMBLE_LONGS_EXACT;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;
use crate::theta::serialization::SERIAL_VERSION_COMPRESSED;

/// A compact, immutable theta sketch.
///
/// # Example
///
/// ```
/// use theta_sketches::theta::CompactThetaSketch;
/// use theta_sketches::theta::ThetaSketch;
///
/// let mut sketch = ThetaSketch::builder().build();
/// sketch.update("apple");
/// sketch.update("banana");
///
/// let compact = sketch.compact(true);
/// let bytes = compact.serialize();
///
/// let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
/// assert_eq!(compact.estimate(), restored.estimate());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CompactThetaSketch {
    entries: Vec<u64>,
    theta: u64,
    seed_hash: u16,
    ordered: bool,
    is_empty: bool,
}

impl CompactThetaSketch {
    pub(crate) fn from_parts(
        entries: Vec<u64>,
        theta: u64,
        seed_hash: u16,
        ordered: bool,
        is_empty: bool,
    ) -> Self {
        debug_assert!(!is_empty || (entries.is_empty() && theta == MAX_THETA));
        Self {
            entries,
            theta,
            seed_hash,
            ordered,
            is_empty,
        }
    }

    /// Check if the sketch represents an empty source set.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Get the cardinality estimate.
    pub fn estimate(&self) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        let num_retained = self.entries.len() as f64;
        num_retained / self.theta()
    }

    /// Return theta as a fraction (0.0 to 1.0)
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// Return theta as u64
    pub fn theta64(&self) -> u64 {
        self.theta
    }

    /// Check if sketch is in estimation mode
    pub fn is_estimation_mode(&self) -> bool {
        self.theta < MAX_THETA
    }

    /// Whether the retained hashes are sorted ascending.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Return number of retained entries
    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    /// Return iterator over hash values
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }

    /// Get the seed hash
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// Returns the approximate lower error bound given the specified number
    /// of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_dev)
    }

    /// Returns the approximate upper error bound given the specified number
    /// of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::upper_bound(self.num_retained() as u64, self.theta(), num_std_dev)
    }

    fn is_single_item(&self) -> bool {
        self.entries.len() == 1 && !self.is_estimation_mode()
    }

    /// Number of bytes [`serialize`](Self::serialize) will produce.
    pub fn serialized_size_bytes(&self) -> usize {
        if self.is_empty {
            return 8;
        }
        if self.is_single_item() {
            return 16;
        }
        let pre_longs = if self.is_estimation_mode() {
            PREAMBLE_LONGS_ESTIMATION
        } else {
            PREAMBLE_LONGS_EXACT
        };
        pre_longs as usize * 8 + self.entries.len() * HASH_SIZE_BYTES
    }

    /// Serialize to the standard (serial version 3) image.
    ///
    /// An empty sketch produces the canonical 8-byte empty image; a
    /// single-item exact sketch produces the 16-byte single-item image.
    pub fn serialize(&self) -> Vec<u8> {
        if self.is_empty {
            return EMPTY_COMPACT_IMAGE.to_vec();
        }

        let mut bytes = SketchBytes::with_capacity(self.serialized_size_bytes());

        if self.is_single_item() {
            bytes.write_u8(PREAMBLE_LONGS_EMPTY);
            bytes.write_u8(SERIAL_VERSION);
            bytes.write_u8(FAMILY_COMPACT);
            bytes.write_u8(0);
            bytes.write_u8(0);
            bytes.write_u8(FLAG_READ_ONLY | FLAG_COMPACT | FLAG_ORDERED | FLAG_SINGLE_ITEM);
            bytes.write_u16_le(self.seed_hash);
            bytes.write_u64_le(self.entries[0]);
            return bytes.into_bytes();
        }

        let pre_longs = if self.is_estimation_mode() {
            PREAMBLE_LONGS_ESTIMATION
        } else {
            PREAMBLE_LONGS_EXACT
        };
        let mut flags = FLAG_READ_ONLY | FLAG_COMPACT;
        if self.ordered {
            flags |= FLAG_ORDERED;
        }

        bytes.write_u8(pre_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_COMPACT);
        bytes.write_u8(0);
        bytes.write_u8(0);
        bytes.write_u8(flags);
        bytes.write_u16_le(self.seed_hash);

        bytes.write_u32_le(self.entries.len() as u32);
        bytes.write_u32_le(DEFAULT_P_FLOAT_BITS);

        if pre_longs >= PREAMBLE_LONGS_ESTIMATION {
            bytes.write_u64_le(self.theta);
        }

        for &hash in &self.entries {
            bytes.write_u64_le(hash);
        }

        bytes.into_bytes()
    }

    /// Serialize into a caller-provided buffer, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an `InsufficientSpace` error when the buffer is smaller than
    /// [`serialized_size_bytes`](Self::serialized_size_bytes).
    pub fn serialize_into(&self, dst: &mut [u8]) -> Result<usize, Error> {
        let required = self.serialized_size_bytes();
        if dst.len() < required {
            return Err(Error::insufficient_space(required, dst.len()));
        }
        let bytes = self.serialize();
        dst[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Serialize to the compressed (serial version 4) image: consecutive
    /// deltas of the ordered hashes, bit-packed at the width of the largest
    /// delta.
    ///
    /// Only ordered sketches with at least two entries (or in estimation
    /// mode) have a compressed form; anything else falls back to
    /// [`serialize`](Self::serialize).
    pub fn serialize_compressed(&self) -> Vec<u8> {
        if !self.ordered || self.is_empty || self.entries.is_empty() || self.is_single_item() {
            return self.serialize();
        }

        let count = self.entries.len();
        debug_assert!(count >= 1);

        // Width of the largest delta decides the packing width.
        let mut max_delta = 0u64;
        let mut previous = 0u64;
        for &hash in &self.entries {
            max_delta = max_delta.max(hash - previous);
            previous = hash;
        }
        let entry_bits = (64 - max_delta.leading_zeros()) as u8;
        let num_entries_bytes = (32 - (count as u32).leading_zeros()).div_ceil(8).max(1) as u8;

        let pre_longs = if self.is_estimation_mode() {
            PREAMBLE_LONGS_EXACT
        } else {
            PREAMBLE_LONGS_EMPTY
        };
        let payload_bytes = (count * entry_bits as usize).div_ceil(8);
        let total = pre_longs as usize * 8 + num_entries_bytes as usize + payload_bytes;

        let mut bytes = SketchBytes::with_capacity(total);
        bytes.write_u8(pre_longs);
        bytes.write_u8(SERIAL_VERSION_COMPRESSED);
        bytes.write_u8(FAMILY_COMPACT);
        bytes.write_u8(entry_bits);
        bytes.write_u8(num_entries_bytes);
        bytes.write_u8(FLAG_READ_ONLY | FLAG_COMPACT | FLAG_ORDERED);
        bytes.write_u16_le(self.seed_hash);

        if pre_longs >= PREAMBLE_LONGS_EXACT {
            bytes.write_u64_le(self.theta);
        }

        for i in 0..num_entries_bytes {
            bytes.write_u8((count >> (8 * i as usize)) as u8);
        }

        let mut payload = vec![0u8; payload_bytes];
        let mut deltas = [0u64; BLOCK_WIDTH];
        let mut previous = 0u64;
        let mut offset = 0usize;
        let whole_blocks = count / BLOCK_WIDTH;
        for block in 0..whole_blocks {
            for (i, delta) in deltas.iter_mut().enumerate() {
                let hash = self.entries[block * BLOCK_WIDTH + i];
                *delta = hash - previous;
                previous = hash;
            }
            pack_bits_block(&deltas, &mut payload[offset..], entry_bits);
            offset += entry_bits as usize;
        }
        let mut tail_packer = BitPacker::new(&mut payload[offset..]);
        for &hash in &self.entries[whole_blocks * BLOCK_WIDTH..] {
            tail_packer.pack_value(hash - previous, entry_bits);
            previous = hash;
        }

        bytes.write(&payload);
        bytes.into_bytes()
    }

    /// Deserialize a compact image (either serial version) with the default
    /// seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or corrupted.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a compact image (either serial version) with a specific
    /// seed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The data is too short or structurally inconsistent
    /// - The family ID doesn't match or the serial version is unsupported
    /// - The seed hash doesn't match (`seed` 0 skips the check)
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        if bytes.len() < 2 {
            return Err(Error::insufficient_data("preamble"));
        }
        match bytes[1] {
            SERIAL_VERSION => Self::deserialize_v3(bytes, seed),
            SERIAL_VERSION_COMPRESSED => Self::deserialize_v4(bytes, seed),
            other => Err(Error::unsupported_serial_version(other)),
        }
    }

    fn deserialize_v3(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.expect_family(FAMILY_COMPACT, "Compact")?;
        if !preamble.is_compact() {
            return Err(Error::deserial("compact family without the compact flag"));
        }
        let seed_hash = preamble.check_seed(seed)?;

        if preamble.is_empty() {
            return Ok(Self::from_parts(Vec::new(), MAX_THETA, seed_hash, true, true));
        }

        if preamble.pre_longs == PREAMBLE_LONGS_EMPTY {
            if !preamble.is_single_item() {
                return Err(Error::deserial(
                    "one preamble long on a non-empty, non-single-item image",
                ));
            }
            let hash = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("single item hash"))?;
            if hash == 0 || hash >= MAX_THETA {
                return Err(Error::deserial("single item hash out of domain"));
            }
            return Ok(Self::from_parts(vec![hash], MAX_THETA, seed_hash, true, false));
        }

        let num_entries = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("num_entries"))? as usize;
        let _p = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("p"))?;

        let theta = if preamble.pre_longs >= PREAMBLE_LONGS_ESTIMATION {
            cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("theta"))?
        } else {
            MAX_THETA
        };
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta {theta} out of range")));
        }

        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let hash = cursor.read_u64_le().map_err(|_| {
                Error::insufficient_data(format!("expected {num_entries} entries, failed at index {i}"))
            })?;
            if hash == 0 || hash >= theta {
                return Err(Error::deserial("retained hash out of domain"));
            }
            entries.push(hash);
        }

        Ok(Self::from_parts(
            entries,
            theta,
            seed_hash,
            preamble.is_ordered(),
            false,
        ))
    }

    fn deserialize_v4(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        // The compressed header reuses bytes 3 and 4 for the packing widths.
        let mut cursor = SketchSlice::new(bytes);
        if bytes.len() < 8 {
            return Err(Error::insufficient_data("preamble"));
        }
        let pre_longs = cursor.read_u8().expect("length checked") & 0x3F;
        let _ser_ver = cursor.read_u8().expect("length checked");
        let family = cursor.read_u8().expect("length checked");
        let entry_bits = cursor.read_u8().expect("length checked");
        let num_entries_bytes = cursor.read_u8().expect("length checked");
        let flags = cursor.read_u8().expect("length checked");
        let seed_hash = cursor.read_u16_le().expect("length checked");

        if family != FAMILY_COMPACT {
            return Err(Error::invalid_family(FAMILY_COMPACT, family, "Compact"));
        }
        if flags & FLAG_COMPACT == 0 || flags & FLAG_ORDERED == 0 {
            return Err(Error::deserial(
                "compressed image without the compact+ordered flags",
            ));
        }
        if seed_hash == 0 {
            return Err(Error::deserial("seed hash 0 on a non-empty image"));
        }
        if seed != 0 {
            let expected = compute_seed_hash(seed);
            if seed_hash != expected {
                return Err(Error::seed_hash_mismatch(expected, seed_hash));
            }
        }
        if !(1..=63).contains(&entry_bits) {
            return Err(Error::deserial(format!("entry bits {entry_bits} out of range")));
        }
        if !(1..=4).contains(&num_entries_bytes) {
            return Err(Error::deserial(format!(
                "count width {num_entries_bytes} out of range"
            )));
        }

        let theta = if pre_longs >= PREAMBLE_LONGS_EXACT {
            cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("theta"))?
        } else {
            MAX_THETA
        };
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta {theta} out of range")));
        }

        let mut count = 0usize;
        for i in 0..num_entries_bytes {
            let byte = cursor
                .read_u8()
                .map_err(|_| Error::insufficient_data("num_entries"))?;
            count |= (byte as usize) << (8 * i as usize);
        }
        if count == 0 {
            return Err(Error::deserial("compressed image with zero entries"));
        }

        let payload_bytes = (count * entry_bits as usize).div_ceil(8);
        let payload_start = cursor.position();
        if bytes.len() < payload_start + payload_bytes {
            return Err(Error::insufficient_data("delta payload"));
        }
        let payload = &bytes[payload_start..payload_start + payload_bytes];

        let mut entries = Vec::with_capacity(count);
        let mut deltas = [0u64; BLOCK_WIDTH];
        let mut previous = 0u64;
        let mut offset = 0usize;
        let whole_blocks = count / BLOCK_WIDTH;
        for _ in 0..whole_blocks {
            unpack_bits_block(&mut deltas, &payload[offset..], entry_bits);
            offset += entry_bits as usize;
            for &delta in &deltas {
                previous = previous
                    .checked_add(delta)
                    .ok_or_else(|| Error::deserial("delta overflow"))?;
                entries.push(previous);
            }
        }
        let mut tail_unpacker = BitUnpacker::new(&payload[offset..]);
        for _ in whole_blocks * BLOCK_WIDTH..count {
            let delta = tail_unpacker.unpack_value(entry_bits);
            previous = previous
                .checked_add(delta)
                .ok_or_else(|| Error::deserial("delta overflow"))?;
            entries.push(previous);
        }

        for window in entries.windows(2) {
            if window[0] >= window[1] {
                return Err(Error::deserial("deltas do not strictly increase"));
            }
        }
        if entries[0] == 0 || *entries.last().expect("count > 0") >= theta {
            return Err(Error::deserial("retained hash out of domain"));
        }

        Ok(Self::from_parts(entries, theta, seed_hash, true, false))
    }

    /// Wrap an uncompressed compact image as a zero-copy read-only view,
    /// using the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed images and for compressed images
    /// (those must be decoded via [`deserialize`](Self::deserialize)).
    pub fn wrap(bytes: &[u8]) -> Result<WrappedThetaSketch<'_>, Error> {
        Self::wrap_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Wrap an uncompressed compact image as a zero-copy read-only view.
    pub fn wrap_with_seed(bytes: &[u8], seed: u64) -> Result<WrappedThetaSketch<'_>, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.expect_family(FAMILY_COMPACT, "Compact")?;
        if preamble.ser_ver == SERIAL_VERSION_COMPRESSED {
            return Err(Error::deserial(
                "compressed images cannot be wrapped, deserialize them instead",
            ));
        }
        if preamble.ser_ver != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(preamble.ser_ver));
        }
        if !preamble.is_compact() {
            return Err(Error::deserial("compact family without the compact flag"));
        }
        let seed_hash = preamble.check_seed(seed)?;

        if preamble.is_empty() {
            return Ok(WrappedThetaSketch {
                entry_bytes: &[],
                num_entries: 0,
                theta: MAX_THETA,
                seed_hash,
                ordered: true,
                is_empty: true,
            });
        }

        if preamble.pre_longs == PREAMBLE_LONGS_EMPTY {
            if !preamble.is_single_item() {
                return Err(Error::deserial(
                    "one preamble long on a non-empty, non-single-item image",
                ));
            }
            if bytes.len() < 16 {
                return Err(Error::insufficient_data("single item hash"));
            }
            return Ok(WrappedThetaSketch {
                entry_bytes: &bytes[8..16],
                num_entries: 1,
                theta: MAX_THETA,
                seed_hash,
                ordered: true,
                is_empty: false,
            });
        }

        let num_entries = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("num_entries"))? as usize;
        let _p = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("p"))?;
        let theta = if preamble.pre_longs >= PREAMBLE_LONGS_ESTIMATION {
            cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("theta"))?
        } else {
            MAX_THETA
        };
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta {theta} out of range")));
        }

        let start = cursor.position();
        let end = start + num_entries * HASH_SIZE_BYTES;
        if bytes.len() < end {
            return Err(Error::insufficient_data(format!(
                "{num_entries} entries declared, image too short"
            )));
        }

        Ok(WrappedThetaSketch {
            entry_bytes: &bytes[start..end],
            num_entries,
            theta,
            seed_hash,
            ordered: preamble.is_ordered(),
            is_empty: false,
        })
    }
}

impl ThetaSketchView for CompactThetaSketch {
    fn theta64(&self) -> u64 {
        self.theta
    }

    fn num_retained(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.ordered
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn iter_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter()
    }
}

/// Zero-copy read-only view over an uncompressed compact image.
///
/// The view borrows the image and decodes hashes lazily; it offers only
/// non-mutating operations. Use [`to_compact`](Self::to_compact) to detach
/// from the buffer.
#[derive(Debug, Clone, Copy)]
pub struct WrappedThetaSketch<'a> {
    entry_bytes: &'a [u8],
    num_entries: usize,
    theta: u64,
    seed_hash: u16,
    ordered: bool,
    is_empty: bool,
}

impl WrappedThetaSketch<'_> {
    /// Check if the sketch represents an empty source set.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Get the cardinality estimate.
    pub fn estimate(&self) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        self.num_entries as f64 / self.theta()
    }

    /// Return theta as a fraction (0.0 to 1.0)
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// Return theta as u64
    pub fn theta64(&self) -> u64 {
        self.theta
    }

    /// Check if sketch is in estimation mode
    pub fn is_estimation_mode(&self) -> bool {
        self.theta < MAX_THETA
    }

    /// Whether the retained hashes are sorted ascending.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Return number of retained entries
    pub fn num_retained(&self) -> usize {
        self.num_entries
    }

    /// Get the seed hash
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// Return iterator over hash values, decoded lazily from the image.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entry_bytes
            .chunks_exact(HASH_SIZE_BYTES)
            .map(|chunk| u64::from_le_bytes(chunk.try_into().expect("8-byte chunk")))
    }

    /// Returns the approximate lower error bound given the specified number
    /// of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::lower_bound(self.num_entries as u64, self.theta(), num_std_dev)
    }

    /// Returns the approximate upper error bound given the specified number
    /// of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        binomial_bounds::upper_bound(self.num_entries as u64, self.theta(), num_std_dev)
    }

    /// Copy the view into an owned compact sketch.
    pub fn to_compact(&self) -> CompactThetaSketch {
        CompactThetaSketch::from_parts(
            self.iter().collect(),
            self.theta,
            self.seed_hash,
            self.ordered,
            self.is_empty,
        )
    }
}

impl ThetaSketchView for WrappedThetaSketch<'_> {
    fn theta64(&self) -> u64 {
        self.theta
    }

    fn num_retained(&self) -> usize {
        self.num_entries
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.ordered
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn iter_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter()
    }
}
