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
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::InsertOutcome;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;
use crate::theta::hash_table::ThetaHashTable;
use crate::theta::serialization::FAMILY_INTERSECTION;
use crate::theta::serialization::FLAG_EMPTY;
use crate::theta::serialization::PREAMBLE_LONGS_ESTIMATION;
use crate::theta::serialization::Preamble;
use crate::theta::serialization::SERIAL_VERSION;

/// Stateful intersection operator for theta sketches.
///
/// A virgin intersection represents the universal set: the first update
/// replaces it wholesale, and every further update narrows it to the
/// overlap. Before the first update the result is undefined; use
/// [`has_result`](Self::has_result) to check.
#[derive(Debug)]
pub struct ThetaIntersection {
    is_valid: bool,
    table: ThetaHashTable,
}

impl ThetaIntersection {
    /// Creates a new intersection operator for the given `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            is_valid: false,
            table: ThetaHashTable::from_raw_parts(
                0,
                0,
                ResizeFactor::X1,
                1.0,
                MAX_THETA,
                seed,
                false,
            ),
        }
    }

    /// Creates a new intersection operator with the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Narrow the intersection by a sketch.
    ///
    /// # Errors
    ///
    /// Returns an error if the sketch's seed hash does not match, or if its
    /// contents are inconsistent (a corrupted input).
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        let new_default_table = |table: &ThetaHashTable| {
            ThetaHashTable::from_raw_parts(
                0,
                0,
                ResizeFactor::X1,
                1.0,
                table.theta(),
                table.hash_seed(),
                table.is_empty(),
            )
        };

        // Hard empty is absorbing.
        if self.table.is_empty() {
            return Ok(());
        }

        if !sketch.is_empty() && sketch.seed_hash() != self.table.seed_hash() {
            return Err(Error::seed_hash_mismatch(
                self.table.seed_hash(),
                sketch.seed_hash(),
            ));
        }

        self.table.set_empty(sketch.is_empty());
        let theta = if self.table.is_empty() {
            MAX_THETA
        } else {
            self.table.theta().min(sketch.theta64())
        };
        self.table.set_theta(theta);

        // Zero stays zero, regardless of the incoming sketch.
        if self.is_valid && self.table.num_retained() == 0 {
            return Ok(());
        }

        if sketch.num_retained() == 0 {
            self.is_valid = true;
            self.table = new_default_table(&self.table);
            return Ok(());
        }

        if !self.is_valid {
            // First update: clone the incoming sketch into a fresh table.
            self.is_valid = true;
            let lg_size =
                ThetaHashTable::lg_size_from_count(sketch.num_retained(), REBUILD_THRESHOLD);
            self.table = ThetaHashTable::from_raw_parts(
                lg_size,
                lg_size - 1,
                ResizeFactor::X1,
                1.0,
                self.table.theta(),
                self.table.hash_seed(),
                self.table.is_empty(),
            );
            for hash in sketch.iter_hashes() {
                if hash == 0 {
                    return Err(Error::invalid_argument(
                        "zero hash, possibly corrupted input sketch",
                    ));
                }
                if self.table.try_insert_hash(hash) != InsertOutcome::Inserted {
                    return Err(Error::invalid_argument(
                        "insert entries from sketch fail, possibly corrupted input sketch",
                    ));
                }
            }
            if self.table.num_retained() != sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "num entries mismatch, possibly corrupted input sketch",
                ));
            }
        } else {
            // Keep only the hashes present on both sides.
            let max_matches = self.table.num_retained().min(sketch.num_retained());
            let mut matched_entries = Vec::with_capacity(max_matches);
            let mut count = 0;
            for hash in sketch.iter_hashes() {
                if hash < self.table.theta() {
                    if self.table.contains_hash(hash) {
                        if matched_entries.len() == max_matches {
                            return Err(Error::invalid_argument(
                                "max matches exceeded, possibly corrupted input sketch",
                            ));
                        }
                        matched_entries.push(hash);
                    }
                } else if sketch.is_ordered() {
                    break; // early stop for ordered sketches
                }
                count += 1;
            }
            if count > sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "more keys than expected, possibly corrupted input sketch",
                ));
            } else if !sketch.is_ordered() && count < sketch.num_retained() {
                return Err(Error::invalid_argument(
                    "fewer keys than expected, possibly corrupted input sketch",
                ));
            }
            if matched_entries.is_empty() {
                self.table = new_default_table(&self.table);
                if self.table.theta() == MAX_THETA {
                    self.table.set_empty(true);
                }
            } else {
                let lg_size =
                    ThetaHashTable::lg_size_from_count(matched_entries.len(), REBUILD_THRESHOLD);
                self.table = ThetaHashTable::from_raw_parts(
                    lg_size,
                    lg_size - 1,
                    ResizeFactor::X1,
                    1.0,
                    self.table.theta(),
                    self.table.hash_seed(),
                    self.table.is_empty(),
                );
                for hash in matched_entries {
                    if self.table.try_insert_hash(hash) != InsertOutcome::Inserted {
                        return Err(Error::invalid_argument(
                            "duplicate key, possibly corrupted input sketch",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns whether this operator has received at least one update.
    pub fn has_result(&self) -> bool {
        self.is_valid
    }

    /// Returns the intersection result as a compact sketch.
    ///
    /// Non-destructive: the state stays intact and further updates may
    /// follow.
    ///
    /// # Errors
    ///
    /// Returns an `UndefinedResult` error before the first update: the
    /// virgin state is the universal set, whose cardinality is unknown.
    pub fn result(&self, ordered: bool) -> Result<CompactThetaSketch, Error> {
        if !self.is_valid {
            return Err(Error::undefined_result(
                "intersection over no sketches is the universal set",
            ));
        }
        let mut hashes: Vec<u64> = self.table.iter().collect();
        if ordered {
            hashes.sort_unstable();
        }
        Ok(CompactThetaSketch::from_parts(
            hashes,
            self.table.theta(),
            self.table.seed_hash(),
            ordered,
            self.table.is_empty(),
        ))
    }

    /// Reset the operator to the universal set, keeping the seed.
    pub fn reset(&mut self) {
        let seed = self.table.hash_seed();
        *self = Self::new(seed);
    }

    /// Number of bytes [`serialize`](Self::serialize) will produce.
    pub fn serialized_size_bytes(&self) -> usize {
        (PREAMBLE_LONGS_ESTIMATION as usize) * 8 + self.table.raw_entries().len() * 8
    }

    /// Serialize the intersection state so narrowing can resume in another
    /// process. The universal state is encoded as a retained count of -1.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(self.serialized_size_bytes());

        bytes.write_u8(PREAMBLE_LONGS_ESTIMATION);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_INTERSECTION);
        bytes.write_u8(0);
        bytes.write_u8(self.table.lg_cur_size());
        bytes.write_u8(if self.table.is_empty() { FLAG_EMPTY } else { 0 });
        bytes.write_u16_le(self.table.seed_hash());

        let count = if self.is_valid {
            self.table.num_retained() as i32
        } else {
            -1
        };
        bytes.write_i32_le(count);
        bytes.write_f32_le(1.0);
        bytes.write_u64_le(self.table.theta());

        for &entry in self.table.raw_entries() {
            bytes.write_u64_le(entry);
        }

        bytes.into_bytes()
    }

    /// Deserialize an intersection state image with the default seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or corrupted.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize an intersection state image with a specific seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is inconsistent, the family or serial
    /// version does not match, or the seed hash doesn't match.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble = Preamble::read(&mut cursor)?;
        preamble.expect_family(FAMILY_INTERSECTION, "Intersection")?;
        if preamble.ser_ver != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(preamble.ser_ver));
        }
        if preamble.pre_longs != PREAMBLE_LONGS_ESTIMATION {
            return Err(Error::deserial(format!(
                "intersection image requires {PREAMBLE_LONGS_ESTIMATION} preamble longs, got {}",
                preamble.pre_longs
            )));
        }
        preamble.check_seed(seed)?;

        let count = cursor
            .read_i32_le()
            .map_err(|_| Error::insufficient_data("num_retained"))?;
        let _p = cursor
            .read_f32_le()
            .map_err(|_| Error::insufficient_data("p"))?;
        let theta = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("theta"))?;
        if theta == 0 || theta > MAX_THETA {
            return Err(Error::deserial(format!("theta {theta} out of range")));
        }

        if count < 0 {
            // Universal state carries no table.
            let mut virgin = Self::new(seed);
            virgin.table.set_theta(theta);
            return Ok(virgin);
        }
        let count = count as usize;

        let lg_arr = preamble.lg_arr;
        if lg_arr == 0 {
            if count != 0 {
                return Err(Error::deserial("retained entries without a table"));
            }
            let mut state = Self::new(seed);
            state.is_valid = true;
            state.table.set_theta(theta);
            state.table.set_empty(preamble.is_empty());
            return Ok(state);
        }

        let table_len = 1usize << lg_arr;
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
        if live != count {
            return Err(Error::deserial(format!(
                "retained count {count} does not match {live} live entries"
            )));
        }

        let table = ThetaHashTable::from_table_image(
            lg_arr,
            lg_arr - 1,
            ResizeFactor::X1,
            1.0,
            theta,
            seed,
            preamble.is_empty(),
            entries,
            count,
        );
        Ok(Self {
            is_valid: true,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::theta::ThetaSketch;

    fn sketch_with_range(start: u64, count: u64) -> ThetaSketch {
        let mut sketch = ThetaSketch::builder().build();
        for i in 0..count {
            sketch.update(start + i);
        }
        sketch
    }

    #[test]
    fn test_result_before_update_is_undefined() {
        let intersection = ThetaIntersection::new_with_default_seed();
        assert!(!intersection.has_result());
        let err = intersection.result(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedResult);
    }

    #[test]
    fn test_state_machine_becomes_valid() {
        let mut a = ThetaSketch::builder().build();
        a.update("x");

        let mut intersection = ThetaIntersection::new_with_default_seed();
        intersection.update(&a).unwrap();
        assert!(intersection.has_result());
        assert_eq!(intersection.result(true).unwrap().estimate(), 1.0);
    }

    #[test]
    fn test_universal_state_round_trip() {
        let intersection = ThetaIntersection::new_with_default_seed();
        let restored = ThetaIntersection::deserialize(&intersection.serialize()).unwrap();
        assert!(!restored.has_result());
        assert!(restored.result(true).is_err());
    }

    #[test]
    fn test_state_round_trip_with_entries() {
        let s1 = sketch_with_range(0, 1000);
        let s2 = sketch_with_range(500, 1000);

        let mut intersection = ThetaIntersection::new_with_default_seed();
        intersection.update(&s1).unwrap();

        let mut restored = ThetaIntersection::deserialize(&intersection.serialize()).unwrap();
        intersection.update(&s2).unwrap();
        restored.update(&s2).unwrap();

        assert_eq!(
            restored.result(true).unwrap(),
            intersection.result(true).unwrap()
        );
        assert_eq!(restored.result(true).unwrap().estimate(), 500.0);
    }

    #[test]
    fn test_hard_empty_round_trip() {
        let empty = ThetaSketch::builder().build();
        let mut intersection = ThetaIntersection::new_with_default_seed();
        intersection.update(&empty).unwrap();

        let restored = ThetaIntersection::deserialize(&intersection.serialize()).unwrap();
        assert!(restored.has_result());
        assert!(restored.result(true).unwrap().is_empty());
    }

    #[test]
    fn test_reset_returns_to_universal() {
        let mut intersection = ThetaIntersection::new_with_default_seed();
        intersection.update(&sketch_with_range(0, 10)).unwrap();
        assert!(intersection.has_result());

        intersection.reset();
        assert!(!intersection.has_result());
    }
}
