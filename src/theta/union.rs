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

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaHashTable;
use crate::theta::hash_table::starting_theta_from_sampling_probability;
use crate::theta::serialization::FAMILY_COMPACT;
use crate::theta::serialization::FAMILY_QUICKSELECT;
use crate::theta::serialization::FAMILY_UNION;
use crate::theta::serialization::FLAG_EMPTY;
use crate::theta::serialization::PREAMBLE_LONGS_UNION;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;

/// Stateful union operator for theta sketches.
///
/// The union accumulates input sketches into an internal QuickSelect table
/// (the gadget) together with a running union theta. The gadget may hold up
/// to `2k` hashes between rebuilds; [`result`](Self::result) cuts the
/// snapshot back to `k`, so taking a result never disturbs the operator and
/// further updates may follow.
///
/// # Example
///
/// ```
/// use theta_sketches::theta::ThetaSketch;
/// use theta_sketches::theta::ThetaUnion;
///
/// let mut a = ThetaSketch::builder().build();
/// let mut b = ThetaSketch::builder().build();
/// a.update("x");
/// b.update("y");
///
/// let mut union = ThetaUnion::builder().build();
/// union.update(&a).unwrap();
/// union.update(&b.compact(true)).unwrap();
/// assert_eq!(union.result(true).estimate(), 2.0);
/// ```
#[derive(Debug)]
pub struct ThetaUnion {
    gadget: ThetaHashTable,
    union_theta: u64,
    union_empty: bool,
}

impl ThetaUnion {
    /// Create a new builder for ThetaUnion
    pub fn builder() -> ThetaUnionBuilder {
        ThetaUnionBuilder::default()
    }

    /// Merge a sketch into the union.
    ///
    /// Empty sketches are no-ops. For ordered inputs the scan stops at the
    /// first hash at or above the union theta.
    ///
    /// # Errors
    ///
    /// Returns an error if the sketch's seed hash does not match, or if a
    /// retained hash is outside the valid domain (a corrupted input).
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if sketch.is_empty() {
            return Ok(());
        }
        if sketch.seed_hash() != self.gadget.seed_hash() {
            return Err(Error::seed_hash_mismatch(
                self.gadget.seed_hash(),
                sketch.seed_hash(),
            ));
        }

        self.union_empty = false;
        self.union_theta = self
            .union_theta
            .min(sketch.theta64())
            .min(self.gadget.theta());

        for hash in sketch.iter_hashes() {
            if hash == 0 || hash >= MAX_THETA {
                return Err(Error::invalid_argument(
                    "hash out of domain, possibly corrupted input sketch",
                ));
            }
            if hash >= self.union_theta {
                if sketch.is_ordered() {
                    break;
                }
                continue;
            }
            let _ = self.gadget.try_insert_hash(hash);
        }

        // Gadget rebuilds during the loop may have lowered its theta.
        self.union_theta = self.union_theta.min(self.gadget.theta());
        Ok(())
    }

    /// Merge a serialized sketch image without fully heapifying it first.
    ///
    /// Compact images (including single-item and empty) are wrapped and
    /// streamed; compressed and table images are decoded.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed images, family/version mismatches, and
    /// seed mismatches.
    pub fn update_image(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() < 8 {
            return Err(Error::insufficient_data("preamble"));
        }
        let seed = self.gadget.hash_seed();
        match bytes[2] {
            FAMILY_COMPACT => {
                if bytes[1] == SERIAL_VERSION {
                    let wrapped = CompactThetaSketch::wrap_with_seed(bytes, seed)?;
                    self.update(&wrapped)
                } else {
                    let sketch = CompactThetaSketch::deserialize_with_seed(bytes, seed)?;
                    self.update(&sketch)
                }
            }
            FAMILY_QUICKSELECT => {
                let sketch = ThetaSketch::deserialize_with_seed(bytes, seed)?;
                self.update(&sketch)
            }
            other => Err(Error::deserial(format!(
                "family {other} cannot be merged into a union"
            ))),
        }
    }

    /// Return the union result as a compact sketch.
    ///
    /// Non-destructive: the gadget keeps all retained hashes, only the
    /// snapshot is cut back to the nominal k.
    pub fn result(&self, ordered: bool) -> CompactThetaSketch {
        let k = 1usize << self.gadget.lg_nom_size();
        let mut entries: Vec<u64> = self.gadget.iter().collect();
        let mut final_theta = self.union_theta.min(self.gadget.theta());

        if entries.len() > k {
            let (_, kth, _) = entries.select_nth_unstable(k);
            final_theta = final_theta.min(*kth);
        }
        entries.retain(|&hash| hash < final_theta);
        if ordered {
            entries.sort_unstable();
        }

        let is_empty = self.gadget.is_empty() && self.union_empty;
        let theta = if is_empty { MAX_THETA } else { final_theta };
        CompactThetaSketch::from_parts(entries, theta, self.gadget.seed_hash(), ordered, is_empty)
    }

    /// Reset the union to its virgin state, keeping the configuration.
    pub fn reset(&mut self) {
        self.gadget.reset();
        self.union_theta = self.gadget.theta();
        self.union_empty = true;
    }

    /// Whether no non-empty sketch has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.gadget.is_empty() && self.union_empty
    }

    /// Return lg_k of the union gadget.
    pub fn lg_k(&self) -> u8 {
        self.gadget.lg_nom_size()
    }

    /// Number of bytes [`serialize`](Self::serialize) will produce.
    pub fn serialized_size_bytes(&self) -> usize {
        (PREAMBLE_LONGS_UNION as usize) * 8 + self.gadget.raw_entries().len() * 8
    }

    /// Serialize the union state so merging can resume in another process.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(self.serialized_size_bytes());

        let byte0 = PREAMBLE_LONGS_UNION | (self.gadget.resize_factor().lg_value() << 6);
        bytes.write_u8(byte0);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_UNION);
        bytes.write_u8(self.gadget.lg_nom_size());
        bytes.write_u8(self.gadget.lg_cur_size());
        bytes.write_u8(if self.is_empty() { FLAG_EMPTY } else { 0 });
        bytes.write_u16_le(self.gadget.seed_hash());

        bytes.write_u32_le(self.gadget.num_retained() as u32);
        bytes.write_f32_le(self.gadget.sampling_probability());
        bytes.write_u64_le(self.gadget.theta());
        bytes.write_u64_le(self.union_theta);

        for &entry in self.gadget.raw_entries() {
            bytes.write_u64_le(entry);
        }

        bytes.into_bytes()
    }

    /// Deserialize a union state image with the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or corrupted.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a union state image with a specific seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is inconsistent, the family or serial
    /// version does not match, or the seed hash doesn't match.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.expect_family(FAMILY_UNION, "Union")?;
        if preamble.ser_ver != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(preamble.ser_ver));
        }
        if preamble.pre_longs != PREAMBLE_LONGS_UNION {
            return Err(Error::deserial(format!(
                "union image requires {PREAMBLE_LONGS_UNION} preamble longs, got {}",
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
        let union_theta = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("union theta"))?;

        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::deserial(format!("sampling probability {p} out of (0, 1]")));
        }
        if theta == 0 || theta > MAX_THETA || union_theta == 0 || union_theta > MAX_THETA {
            return Err(Error::deserial("theta out of range"));
        }
        if preamble.lg_arr <= preamble.lg_nom
            && theta < starting_theta_from_sampling_probability(p)
        {
            return Err(Error::deserial(
                "theta below sampling threshold while the table is still growing",
            ));
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

        let is_empty = preamble.is_empty();
        if is_empty && num_retained != 0 {
            return Err(Error::deserial("empty flag set with retained entries"));
        }

        let gadget = ThetaHashTable::from_table_image(
            preamble.lg_arr,
            preamble.lg_nom,
            resize_factor,
            p,
            theta,
            seed,
            is_empty,
            entries,
            num_retained,
        );
        Ok(ThetaUnion {
            gadget,
            union_theta,
            union_empty: is_empty,
        })
    }
}

/// Builder for ThetaUnion
#[derive(Debug)]
pub struct ThetaUnionBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for ThetaUnionBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaUnionBuilder {
    /// Set lg_k (log2 of nominal size k) of the result.
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

    /// Set resize factor of the union gadget.
    pub fn resize_factor(mut self, factor: ResizeFactor) -> Self {
        self.resize_factor = factor;
        self
    }

    /// Set the up-front sampling probability p.
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

    /// Build the ThetaUnion.
    pub fn build(self) -> ThetaUnion {
        let gadget = ThetaHashTable::new(
            self.lg_k,
            self.resize_factor,
            self.sampling_probability,
            self.seed,
        );
        let union_theta = gadget.theta();
        ThetaUnion {
            gadget,
            union_theta,
            union_empty: true,
        }
    }
}
