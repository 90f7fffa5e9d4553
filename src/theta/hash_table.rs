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

use std::hash::Hash;
use std::hash::Hasher;

use crate::common::ResizeFactor;
use crate::hash::MurmurHash3X64128;
use crate::hash::compute_seed_hash;

/// Maximum theta value (signed max for image compatibility). A sketch at
/// MAX_THETA is in exact mode; the value itself is never a retained hash.
pub const MAX_THETA: u64 = i64::MAX as u64;

/// Minimum log2 of nominal entries K
pub const MIN_LG_K: u8 = 4;

/// Maximum log2 of nominal entries K
pub const MAX_LG_K: u8 = 26;

/// Default log2 of nominal entries K
pub const DEFAULT_LG_K: u8 = 12;

/// Minimum log2 of the hash table array
pub(crate) const MIN_LG_ARR_LONGS: u8 = 5;

// The two fill fractions must stay equal; the image reader sizes tables
// assuming one threshold.
/// Fill fraction that triggers a resize while the table is still growing
const RESIZE_THRESHOLD: f64 = 15.0 / 16.0;

/// Fill fraction that triggers a rebuild once the table is at maximum size
pub(crate) const REBUILD_THRESHOLD: f64 = 15.0 / 16.0;

/// Stride hash bits (7 bits for stride calculation)
const STRIDE_HASH_BITS: u8 = 7;

/// Stride mask
const STRIDE_MASK: u64 = (1 << STRIDE_HASH_BITS) - 1;

/// Outcome of inserting one hash into the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    /// The hash is at or above theta and was discarded.
    OverTheta,
    /// The hash is already in the table.
    Duplicate,
    /// The hash was inserted.
    Inserted,
    /// The hash was inserted and the table grew.
    InsertedResized,
    /// The hash was inserted and the table was rebuilt, lowering theta.
    InsertedRebuilt,
}

/// Open-addressing hash table for theta sketches.
///
/// The table grows by the resize factor up to `2^(lg_nom_size + 1)` slots.
/// Once at maximum size, crossing the fill threshold triggers a rebuild: the
/// `k`-th smallest retained hash becomes the new theta and only strictly
/// smaller hashes survive, capping the retained count at `k = 2^lg_nom_size`.
#[derive(Debug, Clone)]
pub(crate) struct ThetaHashTable {
    lg_cur_size: u8,
    lg_nom_size: u8,
    lg_max_size: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    hash_seed: u64,

    // Logical emptiness of the source set. This can be false even when
    // `num_retained` is 0 (e.g. all updates screened by theta).
    is_empty: bool,

    theta: u64,

    entries: Vec<u64>,

    // Number of retained non-zero hashes currently stored in `entries`.
    num_retained: usize,
}

impl ThetaHashTable {
    /// Create a new hash table
    pub fn new(
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        hash_seed: u64,
    ) -> Self {
        let lg_max_size = lg_nom_size + 1;
        let lg_cur_size =
            starting_sub_multiple(lg_max_size, MIN_LG_ARR_LONGS, resize_factor.lg_value());
        Self::from_raw_parts(
            lg_cur_size,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            starting_theta_from_sampling_probability(sampling_probability),
            hash_seed,
            true,
        )
    }

    /// Create a table with explicit state.
    ///
    /// A `lg_cur_size` of 0 creates a table with no slots, usable only as a
    /// carrier of theta/empty state.
    ///
    /// # Panics
    ///
    /// Panics if `lg_cur_size > lg_nom_size + 1`.
    pub fn from_raw_parts(
        lg_cur_size: u8,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        theta: u64,
        hash_seed: u64,
        is_empty: bool,
    ) -> Self {
        let lg_max_size = lg_nom_size + 1;
        assert!(
            lg_cur_size <= lg_max_size,
            "lg_cur_size must be <= lg_nom_size + 1, got lg_cur_size={lg_cur_size}, lg_nom_size={lg_nom_size}"
        );
        let size = if lg_cur_size > 0 { 1 << lg_cur_size } else { 0 };
        Self {
            lg_cur_size,
            lg_nom_size,
            lg_max_size,
            resize_factor,
            sampling_probability,
            hash_seed,
            is_empty,
            theta,
            entries: vec![0u64; size],
            num_retained: 0,
        }
    }

    /// Reconstruct a table verbatim from a serialized table image.
    ///
    /// `entries` is the raw slot array including zeros; slot positions are
    /// trusted (the stride function is part of the image format).
    pub fn from_table_image(
        lg_cur_size: u8,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        theta: u64,
        hash_seed: u64,
        is_empty: bool,
        entries: Vec<u64>,
        num_retained: usize,
    ) -> Self {
        debug_assert_eq!(entries.len(), 1usize << lg_cur_size);
        Self {
            lg_cur_size,
            lg_nom_size,
            lg_max_size: lg_nom_size + 1,
            resize_factor,
            sampling_probability,
            hash_seed,
            is_empty,
            theta,
            entries,
            num_retained,
        }
    }

    /// Hash a value with the table seed, mapped into the 63-bit hash domain.
    pub fn hash<T: Hash>(&self, value: T) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.hash_seed);
        value.hash(&mut hasher);
        let (h1, _) = hasher.finish128();
        h1 >> 1
    }

    /// Hash raw bytes with the table seed, mapped into the 63-bit hash domain.
    ///
    /// Typed update paths use this so the byte stream fed to the hash is
    /// exactly the item's wire representation.
    pub fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.hash_seed);
        hasher.write(bytes);
        let (h1, _) = hasher.finish128();
        h1 >> 1
    }

    /// Find an index for `key` in a slot array.
    ///
    /// Returns the index of the slot holding `key`, or of the empty slot
    /// where it belongs; `None` if the probe wrapped without finding either.
    fn find_in_entries(entries: &[u64], key: u64, lg_size: u8) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }

        let size = entries.len();
        let mask = size - 1;
        let stride = Self::stride(key, lg_size);
        let mut index = (key as usize) & mask;
        let loop_index = index;

        loop {
            let probe = entries[index];
            if probe == 0 || probe == key {
                return Some(index);
            }
            index = (index + stride) & mask;
            if index == loop_index {
                return None;
            }
        }
    }

    /// Insert a hash that is already in the 63-bit domain.
    ///
    /// # Panics
    ///
    /// Panics on a zero hash: zero marks empty slots, so a zero here means
    /// hash corruption upstream. Image readers validate before calling.
    pub fn try_insert_hash(&mut self, hash: u64) -> InsertOutcome {
        assert!(hash != 0, "hash corruption: zero is the empty-slot marker");
        self.is_empty = false;

        if hash >= self.theta {
            return InsertOutcome::OverTheta;
        }

        let Some(index) = Self::find_in_entries(&self.entries, hash, self.lg_cur_size) else {
            unreachable!("resize/rebuild keeps the table below its fill threshold");
        };

        if self.entries[index] == hash {
            return InsertOutcome::Duplicate;
        }

        debug_assert_eq!(self.entries[index], 0, "slot should be empty");
        self.entries[index] = hash;
        self.num_retained += 1;

        if self.num_retained > self.capacity() {
            if self.lg_cur_size < self.lg_max_size {
                self.resize();
                InsertOutcome::InsertedResized
            } else {
                self.rebuild();
                InsertOutcome::InsertedRebuilt
            }
        } else {
            InsertOutcome::Inserted
        }
    }

    /// Whether the table currently holds `hash`.
    pub fn contains_hash(&self, hash: u64) -> bool {
        match Self::find_in_entries(&self.entries, hash, self.lg_cur_size) {
            Some(index) => self.entries[index] == hash,
            None => false,
        }
    }

    /// Fill threshold of the current array.
    fn capacity(&self) -> usize {
        let fraction = if self.lg_cur_size < self.lg_max_size {
            RESIZE_THRESHOLD
        } else {
            REBUILD_THRESHOLD
        };
        (fraction * self.entries.len() as f64) as usize
    }

    /// Grow the array by the resize factor and rehash every live entry.
    /// Theta and the retained count are unchanged.
    fn resize(&mut self) {
        let new_lg_size = std::cmp::min(
            self.lg_cur_size + self.resize_factor.lg_value(),
            self.lg_max_size,
        );
        let new_size = 1usize << new_lg_size;

        let mut new_entries = vec![0u64; new_size];
        for &entry in &self.entries {
            if entry != 0 {
                match Self::find_in_entries(&new_entries, entry, new_lg_size) {
                    Some(idx) => new_entries[idx] = entry,
                    None => unreachable!("a larger table always has a free slot"),
                }
            }
        }

        self.entries = new_entries;
        self.lg_cur_size = new_lg_size;
    }

    /// Cut the table back to the nominal size k: the k-th smallest retained
    /// hash becomes the new theta and only strictly smaller hashes survive.
    fn rebuild(&mut self) {
        self.entries.retain(|&e| e != 0);
        let k = 1usize << self.lg_nom_size;
        let (lesser, kth, _) = self.entries.select_nth_unstable(k);
        self.theta = *kth;

        let size = 1usize << self.lg_cur_size;
        let mut new_entries = vec![0u64; size];
        let mut num_inserted = 0;
        for entry in lesser {
            match Self::find_in_entries(&new_entries, *entry, self.lg_cur_size) {
                Some(idx) => {
                    new_entries[idx] = *entry;
                    num_inserted += 1;
                }
                None => unreachable!("k entries always fit a table of 2k slots"),
            }
        }

        debug_assert_eq!(num_inserted, k, "exactly k entries lie below the pivot");
        self.num_retained = num_inserted;
        self.entries = new_entries;
    }

    /// Force the retained count down to at most k.
    pub fn trim(&mut self) {
        if self.num_retained > (1 << self.lg_nom_size) {
            self.rebuild();
        }
    }

    /// Reset the table to its virgin state.
    pub fn reset(&mut self) {
        let init_theta = starting_theta_from_sampling_probability(self.sampling_probability);
        let init_lg_cur = starting_sub_multiple(
            self.lg_max_size,
            MIN_LG_ARR_LONGS,
            self.resize_factor.lg_value(),
        );

        if self.entries.len() != 1 << init_lg_cur {
            self.entries.resize(1 << init_lg_cur, 0);
        }
        self.entries.fill(0);
        self.num_retained = 0;
        self.theta = init_theta;
        self.is_empty = true;
        self.lg_cur_size = init_lg_cur;
    }

    /// Smallest lg table size that keeps `count` entries at or below the
    /// fill threshold.
    pub fn lg_size_from_count(count: usize, threshold: f64) -> u8 {
        let mut lg = MIN_LG_ARR_LONGS;
        while (count as f64) > threshold * (1u64 << lg) as f64 {
            lg += 1;
        }
        lg
    }

    pub fn num_retained(&self) -> usize {
        self.num_retained
    }

    pub fn theta(&self) -> u64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: u64) {
        self.theta = theta;
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn set_empty(&mut self, is_empty: bool) {
        self.is_empty = is_empty;
    }

    /// Iterator over retained hashes, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied().filter(|&e| e != 0)
    }

    /// Raw slot array, zeros included. Serialized verbatim in table images.
    pub fn raw_entries(&self) -> &[u64] {
        &self.entries
    }

    pub fn lg_cur_size(&self) -> u8 {
        self.lg_cur_size
    }

    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    pub fn resize_factor(&self) -> ResizeFactor {
        self.resize_factor
    }

    pub fn sampling_probability(&self) -> f32 {
        self.sampling_probability
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    /// Get the hash of the seed that was used to hash the input.
    pub fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.hash_seed)
    }

    /// Probe stride for `key` in a table of `2^lg_size` slots. Always odd, so
    /// the probe sequence visits every slot. Part of the table image format.
    fn stride(key: u64, lg_size: u8) -> usize {
        (2 * ((key >> lg_size) & STRIDE_MASK) + 1) as usize
    }
}

/// Compute initial lg_size for the hash table such that
/// `lg_target = lg_init + n * lg_resize_factor` for an integer `n` with
/// `lg_init >= lg_min`.
fn starting_sub_multiple(lg_target: u8, lg_min: u8, lg_resize_factor: u8) -> u8 {
    if lg_target <= lg_min {
        lg_min
    } else if lg_resize_factor == 0 {
        lg_target
    } else {
        ((lg_target - lg_min) % lg_resize_factor) + lg_min
    }
}

/// Compute initial theta from the up-front sampling probability.
pub(crate) fn starting_theta_from_sampling_probability(sampling_probability: f32) -> u64 {
    if sampling_probability < 1.0 {
        (MAX_THETA as f64 * sampling_probability as f64) as u64
    } else {
        MAX_THETA
    }
}
