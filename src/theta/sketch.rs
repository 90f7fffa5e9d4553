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

//! Mutable theta sketch built with the QuickSelect table.

use std::hash::Hash;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::common::ResizeFactor;
use crate::common::binomial_bounds;
use crate::common::canonical_double;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::InsertOutcome;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaHashTable;
use crate::theta::hash_table::starting_theta_from_sampling_probability;
use crate::theta::serialization::FAMILY_QUICKSELECT;
use crate::theta::serialization::FLAG_EMPTY;
use crate::theta::serialization::HASH_SIZE_BYTES;
use crate::theta::serialization::PREAMBLE_LONGS_ESTIMATION;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;

/// What an update did to the sketch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateResult {
    /// The input was empty (empty string or slice); nothing changed.
    RejectedEmpty,
    /// The hash fell at or above theta and was discarded.
    RejectedOverTheta,
    /// The hash is already retained.
    RejectedDuplicate,
    /// The hash was retained.
    Inserted,
    /// The hash was retained and the table grew.
    InsertedResized,
    /// The hash was retained and the table was rebuilt, lowering theta.
    InsertedRebuilt,
}

impl UpdateResult {
    /// Whether the update added a new retained hash.
    pub fn is_inserted(self) -> bool {
        matches!(
            self,
            UpdateResult::Inserted | UpdateResult::InsertedResized | UpdateResult::InsertedRebuilt
        )
    }

    fn from_outcome(outcome: InsertOutcome) -> Self {
        match outcome {
            InsertOutcome::OverTheta => UpdateResult::RejectedOverTheta,
            InsertOutcome::Duplicate => UpdateResult::RejectedDuplicate,
            InsertOutcome::Inserted => UpdateResult::Inserted,
            InsertOutcome::InsertedResized => UpdateResult::InsertedResized,
            InsertOutcome::InsertedRebuilt => UpdateResult::InsertedRebuilt,
        }
    }
}

/// Mutable theta sketch for building from input data
#[derive(Debug, Clone)]
pub struct ThetaSketch {
    table: ThetaHashTable,
}

impl ThetaSketch {
    /// Create a new builder for ThetaSketch
    ///
    /// # Examples
    ///
    /// ```
    /// # use theta_sketches::theta::ThetaSketch;
    /// let sketch = ThetaSketch::builder().lg_k(12).build();
    /// assert_eq!(sketch.lg_k(), 12);
    /// ```
    pub fn builder() -> ThetaSketchBuilder {
        ThetaSketchBuilder::default()
    }

    /// Update the sketch with a hashable value.
    ///
    /// This is the convenience path: the value is fed to the keyed hash
    /// through its [`Hash`] impl. For byte-stable hashing across platforms
    /// and languages use the typed methods (`update_str`, `update_bytes`,
    /// `update_i64`, ...). For `f32`/`f64` use `update_f32`/`update_f64`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use theta_sketches::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// assert!(sketch.estimate() >= 1.0);
    /// ```
    pub fn update<T: Hash>(&mut self, value: T) -> UpdateResult {
        let hash = self.table.hash(value);
        UpdateResult::from_outcome(self.table.try_insert_hash(hash))
    }

    /// Update the sketch with a string. Empty strings are rejected with
    /// [`UpdateResult::RejectedEmpty`] and leave the sketch unchanged.
    pub fn update_str(&mut self, value: &str) -> UpdateResult {
        if value.is_empty() {
            return UpdateResult::RejectedEmpty;
        }
        self.update_hashed_bytes(value.as_bytes())
    }

    /// Update the sketch with a byte slice. Empty slices are rejected.
    pub fn update_bytes(&mut self, value: &[u8]) -> UpdateResult {
        if value.is_empty() {
            return UpdateResult::RejectedEmpty;
        }
        self.update_hashed_bytes(value)
    }

    /// Update the sketch with a slice of characters, hashed as their UTF-16
    /// code units. Empty slices are rejected.
    pub fn update_chars(&mut self, value: &[char]) -> UpdateResult {
        if value.is_empty() {
            return UpdateResult::RejectedEmpty;
        }
        let mut bytes = Vec::with_capacity(value.len() * 2);
        let mut units = [0u16; 2];
        for &c in value {
            for unit in c.encode_utf16(&mut units) {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
        }
        self.update_hashed_bytes(&bytes)
    }

    /// Update the sketch with a slice of 32-bit integers. Empty slices are
    /// rejected.
    pub fn update_i32s(&mut self, value: &[i32]) -> UpdateResult {
        if value.is_empty() {
            return UpdateResult::RejectedEmpty;
        }
        let mut bytes = Vec::with_capacity(value.len() * 4);
        for &v in value {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.update_hashed_bytes(&bytes)
    }

    /// Update the sketch with a slice of 64-bit integers. Empty slices are
    /// rejected.
    pub fn update_i64s(&mut self, value: &[i64]) -> UpdateResult {
        if value.is_empty() {
            return UpdateResult::RejectedEmpty;
        }
        let mut bytes = Vec::with_capacity(value.len() * 8);
        for &v in value {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.update_hashed_bytes(&bytes)
    }

    /// Update the sketch with a signed 64-bit integer.
    pub fn update_i64(&mut self, value: i64) -> UpdateResult {
        self.update_hashed_bytes(&value.to_le_bytes())
    }

    /// Update the sketch with an unsigned 64-bit integer.
    pub fn update_u64(&mut self, value: u64) -> UpdateResult {
        self.update_hashed_bytes(&value.to_le_bytes())
    }

    /// Update the sketch with a f64 value.
    ///
    /// The value is canonicalized first: -0.0 and +0.0 hash identically, and
    /// every NaN collapses to one representative.
    pub fn update_f64(&mut self, value: f64) -> UpdateResult {
        self.update_i64(canonical_double(value))
    }

    /// Update the sketch with a f32 value, widened to f64 first.
    pub fn update_f32(&mut self, value: f32) -> UpdateResult {
        self.update_f64(value as f64)
    }

    fn update_hashed_bytes(&mut self, bytes: &[u8]) -> UpdateResult {
        let hash = self.table.hash_bytes(bytes);
        UpdateResult::from_outcome(self.table.try_insert_hash(hash))
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let num_retained = self.table.num_retained() as f64;
        let theta = self.table.theta() as f64 / MAX_THETA as f64;
        num_retained / theta
    }

    /// Return theta as a fraction (0.0 to 1.0)
    pub fn theta(&self) -> f64 {
        self.table.theta() as f64 / MAX_THETA as f64
    }

    /// Return theta as u64
    pub fn theta64(&self) -> u64 {
        self.table.theta()
    }

    /// Check if sketch is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check if sketch is in estimation mode
    pub fn is_estimation_mode(&self) -> bool {
        self.table.theta() < MAX_THETA
    }

    /// Return number of retained entries
    pub fn num_retained(&self) -> usize {
        self.table.num_retained()
    }

    /// Return lg_k
    pub fn lg_k(&self) -> u8 {
        self.table.lg_nom_size()
    }

    /// Return the 16-bit hash of the update seed.
    pub fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }

    /// Force the retained count down to at most k, lowering theta if needed.
    pub fn trim(&mut self) {
        self.table.trim();
    }

    /// Reset the sketch to its virgin state, keeping the configuration.
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Return iterator over retained hash values (slot order, unordered).
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter()
    }

    /// Returns the approximate lower error bound given the specified number
    /// of standard deviations.
    ///
    /// # Examples
    ///
    /// ```
    /// use theta_sketches::common::NumStdDev;
    /// use theta_sketches::theta::ThetaSketch;
    ///
    /// let mut sketch = ThetaSketch::builder().lg_k(12).build();
    /// for i in 0..10000 {
    ///     sketch.update(i);
    /// }
    ///
    /// let estimate = sketch.estimate();
    /// assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
    /// assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
    /// ```
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_dev)
    }

    /// Returns the approximate upper error bound given the specified number
    /// of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        binomial_bounds::upper_bound(self.num_retained() as u64, self.theta(), num_std_dev)
    }

    /// Produce the immutable compact form of this sketch.
    ///
    /// With `ordered` the retained hashes are sorted ascending, which makes
    /// later set operations cheaper and enables the compressed image.
    pub fn compact(&self, ordered: bool) -> CompactThetaSketch {
        let mut entries: Vec<u64> = self.iter().collect();
        if ordered {
            entries.sort_unstable();
        }
        // An empty source forces exact-mode theta, even under sampling.
        let theta = if self.is_empty() {
            MAX_THETA
        } else {
            self.theta64()
        };
        CompactThetaSketch::from_parts(entries, theta, self.seed_hash(), ordered, self.is_empty())
    }

    /// Number of bytes [`serialize`](Self::serialize) will produce.
    pub fn serialized_size_bytes(&self) -> usize {
        (PREAMBLE_LONGS_ESTIMATION as usize) * 8
            + self.table.raw_entries().len() * HASH_SIZE_BYTES
    }

    /// Largest table image for a sketch configured with `lg_k`.
    pub fn max_serialized_size_bytes(lg_k: u8) -> usize {
        (PREAMBLE_LONGS_ESTIMATION as usize) * 8 + (1usize << (lg_k + 1)) * HASH_SIZE_BYTES
    }

    /// Serialize the sketch as a table image.
    ///
    /// The table image carries the full slot array, so another process can
    /// read it back without rehashing. For a compact wire form use
    /// [`compact`](Self::compact) and serialize the result.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(self.serialized_size_bytes());

        let byte0 =
            PREAMBLE_LONGS_ESTIMATION | (self.table.resize_factor().lg_value() << 6);
        bytes.write_u8(byte0);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_QUICKSELECT);
        bytes.write_u8(self.table.lg_nom_size());
        bytes.write_u8(self.table.lg_cur_size());
        bytes.write_u8(if self.is_empty() { FLAG_EMPTY } else { 0 });
        bytes.write_u16_le(self.seed_hash());

        bytes.write_u32_le(self.num_retained() as u32);
        bytes.write_f32_le(self.table.sampling_probability());
        bytes.write_u64_le(self.theta64());

        for &entry in self.table.raw_entries() {
            bytes.write_u64_le(entry);
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

    /// Deserialize a table image with the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or corrupted.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a table image with a specific seed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The bytes are too short or the header is inconsistent
    /// - The family or serial version does not match
    /// - The seed hash doesn't match (`seed` 0 skips the check)
    /// - The table contents contradict the header
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.expect_family(FAMILY_QUICKSELECT, "QuickSelect")?;
        if preamble.ser_ver != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(preamble.ser_ver));
        }
        if preamble.pre_longs != PREAMBLE_LONGS_ESTIMATION {
            return Err(Error::deserial(format!(
                "table image requires {PREAMBLE_LONGS_ESTIMATION} preamble longs, got {}",
                preamble.pre_longs
            )));
        }
        if !(MIN_LG_K..=MAX_LG_K).contains(&preamble.lg_nom) {
            return Err(Error::deserial(format!(
                "lg_k {} is out of range [{MIN_LG_K}, {MAX_LG_K}]",
                preamble.lg_nom
            )));
        }
        if preamble.lg_arr > preamble.lg_nom + 1 {
            return Err(Error::deserial(format!(
                "table size 2^{} exceeds the maximum 2^{}",
                preamble.lg_arr,
                preamble.lg_nom + 1
            )));
        }
        let Some(resize_factor) = ResizeFactor::from_lg(preamble.lg_resize_factor) else {
            return Err(Error::deserial("invalid resize factor bits"));
        };
        preamble.check_seed(seed)?;

        let num_retained = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("num_retained"))? as usize;
        let p = cursor
            .read_f32_le()
            .map_err(|_| Error::insufficient_data("p"))?;
        let theta = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("theta"))?;

        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::deserial(format!("sampling probability {p} out of (0, 1]")));
        }
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta {theta} out of range")));
        }
        // Theta below the sampling threshold is only reachable through a
        // rebuild, and rebuilds only happen at maximum table size.
        if preamble.lg_arr <= preamble.lg_nom
            && theta < starting_theta_from_sampling_probability(p)
        {
            return Err(Error::deserial(
                "theta below sampling threshold while the table is still growing",
            ));
        }
        if preamble.is_empty() && num_retained != 0 {
            return Err(Error::deserial("empty flag set with retained entries"));
        }

        let table_len = 1usize << preamble.lg_arr;
        let mut entries = vec![0u64; table_len];
        let mut live = 0usize;
        for slot in entries.iter_mut() {
            let entry = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("table entry"))?;
            if entry != 0 {
                if entry >= theta {
                    return Err(Error::deserial("table entry at or above theta"));
                }
                live += 1;
            }
            *slot = entry;
        }
        if live != num_retained {
            return Err(Error::deserial(format!(
                "retained count {num_retained} does not match {live} live entries"
            )));
        }

        let table = ThetaHashTable::from_table_image(
            preamble.lg_arr,
            preamble.lg_nom,
            resize_factor,
            p,
            theta,
            seed,
            preamble.is_empty(),
            entries,
            num_retained,
        );
        Ok(ThetaSketch { table })
    }
}

impl ThetaSketchView for ThetaSketch {
    fn theta64(&self) -> u64 {
        self.theta64()
    }

    fn num_retained(&self) -> usize {
        self.num_retained()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash()
    }

    fn iter_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter()
    }
}

/// Builder for ThetaSketch
#[derive(Debug)]
pub struct ThetaSketchBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for ThetaSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaSketchBuilder {
    /// Set lg_k (log2 of nominal size k).
    ///
    /// # Panics
    ///
    /// If lg_k is not in range [4, 26]
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_k),
            "lg_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_k}"
        );
        self.lg_k = lg_k;
        self
    }

    /// Set nominal entries k, rounded up to the next power of two.
    ///
    /// # Panics
    ///
    /// If the rounded k is not in range [2^4, 2^26]
    pub fn nominal_entries(self, k: u32) -> Self {
        let lg_k = (k.max(1) as u64).next_power_of_two().ilog2() as u8;
        self.lg_k(lg_k)
    }

    /// Set resize factor.
    pub fn resize_factor(mut self, factor: ResizeFactor) -> Self {
        self.resize_factor = factor;
        self
    }

    /// Set the up-front sampling probability p; the sketch starts with
    /// theta = p instead of 1.0.
    ///
    /// # Panics
    ///
    /// Panics if p is not in range (0.0, 1.0]
    pub fn sampling_probability(mut self, probability: f32) -> Self {
        assert!(
            probability > 0.0 && probability <= 1.0,
            "sampling_probability must be in (0.0, 1.0], got {probability}"
        );
        self.sampling_probability = probability;
        self
    }

    /// Set hash seed.
    ///
    /// # Panics
    ///
    /// Panics on the rare seeds whose 16-bit seed hash is 0 (reserved).
    pub fn seed(mut self, seed: u64) -> Self {
        assert!(
            compute_seed_hash(seed) != 0,
            "seed {seed} hashes to the reserved seed hash 0"
        );
        self.seed = seed;
        self
    }

    /// Build the ThetaSketch.
    pub fn build(self) -> ThetaSketch {
        let table = ThetaHashTable::new(
            self.lg_k,
            self.resize_factor,
            self.sampling_probability,
            self.seed,
        );
        ThetaSketch { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_result_states() {
        let mut sketch = ThetaSketch::builder()
            .lg_k(6)
            .resize_factor(ResizeFactor::X2)
            .build();

        assert_eq!(sketch.update("a"), UpdateResult::Inserted);
        assert_eq!(sketch.update("a"), UpdateResult::RejectedDuplicate);
        assert_eq!(sketch.update_str(""), UpdateResult::RejectedEmpty);
        assert_eq!(sketch.update_bytes(&[]), UpdateResult::RejectedEmpty);
        assert_eq!(sketch.update_chars(&[]), UpdateResult::RejectedEmpty);
        assert_eq!(sketch.update_i32s(&[]), UpdateResult::RejectedEmpty);
        assert_eq!(sketch.update_i64s(&[]), UpdateResult::RejectedEmpty);

        // Drive the small sketch into estimation mode; a resize and a
        // rebuild must each be observed along the way.
        let mut saw_resized = false;
        let mut saw_rebuilt = false;
        for i in 0..10_000i64 {
            match sketch.update_i64(i) {
                UpdateResult::InsertedResized => saw_resized = true,
                UpdateResult::InsertedRebuilt => saw_rebuilt = true,
                _ => {}
            }
        }
        assert!(saw_resized);
        assert!(saw_rebuilt);
        assert!(sketch.is_estimation_mode());

        // Over-theta rejections become routine once theta is small.
        let over_theta = (10_000..20_000i64)
            .filter(|&i| sketch.update_i64(i) == UpdateResult::RejectedOverTheta)
            .count();
        assert!(over_theta > 0);
    }

    #[test]
    fn test_empty_rejection_leaves_state_unchanged() {
        let mut sketch = ThetaSketch::builder().build();
        assert_eq!(sketch.update_str(""), UpdateResult::RejectedEmpty);
        assert!(sketch.is_empty());
        assert_eq!(sketch.num_retained(), 0);
    }

    #[test]
    fn test_typed_updates_are_distinct() {
        let mut sketch = ThetaSketch::builder().build();
        sketch.update_str("abc");
        sketch.update_bytes(b"abc");
        // Same bytes through either path: one retained hash.
        assert_eq!(sketch.num_retained(), 1);

        sketch.update_i64(1);
        sketch.update_u64(1);
        // Same 8-byte image: still one hash for them.
        assert_eq!(sketch.num_retained(), 2);
    }

    #[test]
    fn test_f64_canonicalization() {
        let mut sketch = ThetaSketch::builder().build();
        sketch.update_f64(0.0);
        sketch.update_f64(-0.0);
        sketch.update_f64(f64::NAN);
        sketch.update_f64(f64::from_bits(0x7ff8_0000_0000_0001));
        assert_eq!(sketch.num_retained(), 2);
    }

    #[test]
    fn test_compact_ordered() {
        let mut sketch = ThetaSketch::builder().lg_k(12).build();
        for i in 0..100 {
            sketch.update(i);
        }
        let compact = sketch.compact(true);
        assert_eq!(compact.num_retained(), 100);
        assert!(compact.is_ordered());
        let hashes: Vec<u64> = compact.iter().collect();
        assert!(hashes.is_sorted());
        assert_eq!(compact.estimate(), sketch.estimate());
    }

    #[test]
    fn test_compact_of_sampled_empty_is_exact() {
        let sketch = ThetaSketch::builder().sampling_probability(0.5).build();
        assert!(sketch.is_estimation_mode());
        let compact = sketch.compact(true);
        assert!(compact.is_empty());
        assert!(!compact.is_estimation_mode());
        assert_eq!(compact.theta64(), MAX_THETA);
    }

    #[test]
    fn test_table_image_round_trip() {
        let mut sketch = ThetaSketch::builder().lg_k(5).build();
        for i in 0..1000 {
            sketch.update(i);
        }
        assert!(sketch.is_estimation_mode());

        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), sketch.serialized_size_bytes());
        assert!(bytes.len() <= ThetaSketch::max_serialized_size_bytes(5));

        let restored = ThetaSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored.num_retained(), sketch.num_retained());
        assert_eq!(restored.theta64(), sketch.theta64());
        assert_eq!(restored.estimate(), sketch.estimate());
        assert_eq!(restored.lg_k(), 5);

        let mut a: Vec<u64> = sketch.iter().collect();
        let mut b: Vec<u64> = restored.iter().collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_restored_sketch_keeps_updating() {
        let mut sketch = ThetaSketch::builder().lg_k(5).build();
        for i in 0..100 {
            sketch.update(i);
        }
        let mut restored = ThetaSketch::deserialize(&sketch.serialize()).unwrap();
        for i in 100..200 {
            sketch.update(i);
            restored.update(i);
        }
        assert_eq!(restored.estimate(), sketch.estimate());
    }

    #[test]
    fn test_deserialize_rejects_corrupt_images() {
        let mut sketch = ThetaSketch::builder().lg_k(5).build();
        for i in 0..1000 {
            sketch.update(i);
        }
        let good = sketch.serialize();

        // Family mismatch.
        let mut bad = good.clone();
        bad[2] = 9;
        assert!(ThetaSketch::deserialize(&bad).is_err());

        // Unknown serial version.
        let mut bad = good.clone();
        bad[1] = 99;
        assert!(ThetaSketch::deserialize(&bad).is_err());

        // Wrong seed.
        assert!(ThetaSketch::deserialize_with_seed(&good, 1234).is_err());

        // A live entry pushed to theta: count still matches, value is
        // out of domain.
        let mut bad = good.clone();
        let theta = sketch.theta64();
        for chunk in bad[24..].chunks_exact_mut(8) {
            if u64::from_le_bytes(chunk.try_into().unwrap()) != 0 {
                chunk.copy_from_slice(&theta.to_le_bytes());
                break;
            }
        }
        assert!(ThetaSketch::deserialize(&bad).is_err());

        // Truncated payload.
        assert!(ThetaSketch::deserialize(&good[..good.len() - 1]).is_err());
    }

    #[test]
    fn test_serialize_into_insufficient_space() {
        let sketch = ThetaSketch::builder().lg_k(5).build();
        let mut small = vec![0u8; 8];
        let err = sketch.serialize_into(&mut small).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InsufficientSpace);

        let mut fit = vec![0u8; sketch.serialized_size_bytes()];
        let written = sketch.serialize_into(&mut fit).unwrap();
        assert_eq!(written, fit.len());
        assert_eq!(fit, sketch.serialize());
    }

    #[test]
    fn test_nominal_entries_rounds_up() {
        let sketch = ThetaSketch::builder().nominal_entries(1000).build();
        assert_eq!(sketch.lg_k(), 10);
        let sketch = ThetaSketch::builder().nominal_entries(1024).build();
        assert_eq!(sketch.lg_k(), 10);
        let sketch = ThetaSketch::builder().nominal_entries(16).build();
        assert_eq!(sketch.lg_k(), 4);
    }
}
