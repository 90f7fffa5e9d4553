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

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::REBUILD_THRESHOLD;
use crate::theta::hash_table::ThetaHashTable;

/// Set-difference operator for theta sketches.
///
/// Unlike [`ThetaUnion`](crate::theta::ThetaUnion) and
/// [`ThetaIntersection`](crate::theta::ThetaIntersection) the difference is
/// not associative, so the operator is stateless: each
/// [`compute`](Self::compute) works on one pair of sketches.
#[derive(Debug)]
pub struct ThetaANotB {
    seed_hash: u16,
}

impl ThetaANotB {
    /// Creates a difference operator for the given `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed_hash: compute_seed_hash(seed),
        }
    }

    /// Creates a difference operator with the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Return a compact sketch of the hashes in `a` that are not in `b`.
    ///
    /// Both sketches are screened at `min(a.theta, b.theta)` first, so the
    /// result estimates `|A \ B|` over the commonly sampled region.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty input's seed hash does not match, or
    /// if a retained hash is outside the valid domain (a corrupted input).
    pub fn compute<A, B>(&self, a: &A, b: &B, ordered: bool) -> Result<CompactThetaSketch, Error>
    where
        A: ThetaSketchView,
        B: ThetaSketchView,
    {
        if !a.is_empty() && a.seed_hash() != self.seed_hash {
            return Err(Error::seed_hash_mismatch(self.seed_hash, a.seed_hash()));
        }
        if !b.is_empty() && b.seed_hash() != self.seed_hash {
            return Err(Error::seed_hash_mismatch(self.seed_hash, b.seed_hash()));
        }

        if a.is_empty() {
            return Ok(CompactThetaSketch::from_parts(
                Vec::new(),
                MAX_THETA,
                self.seed_hash,
                ordered,
                true,
            ));
        }

        let theta = a.theta64().min(b.theta64());

        // Index b's hashes below theta for membership tests.
        let b_table = if b.num_retained() == 0 {
            None
        } else {
            let lg_size = ThetaHashTable::lg_size_from_count(b.num_retained(), REBUILD_THRESHOLD);
            let mut table = ThetaHashTable::from_raw_parts(
                lg_size,
                lg_size - 1,
                ResizeFactor::X1,
                1.0,
                theta,
                0,
                false,
            );
            for hash in b.iter_hashes() {
                if hash == 0 {
                    return Err(Error::invalid_argument(
                        "zero hash, possibly corrupted input sketch",
                    ));
                }
                if hash >= theta {
                    if b.is_ordered() {
                        break;
                    }
                    continue;
                }
                let _ = table.try_insert_hash(hash);
            }
            Some(table)
        };

        let mut entries = Vec::new();
        for hash in a.iter_hashes() {
            if hash == 0 {
                return Err(Error::invalid_argument(
                    "zero hash, possibly corrupted input sketch",
                ));
            }
            if hash >= theta {
                if a.is_ordered() {
                    break;
                }
                continue;
            }
            let survives = match &b_table {
                Some(table) => !table.contains_hash(hash),
                None => true,
            };
            if survives {
                entries.push(hash);
            }
        }
        if ordered && !a.is_ordered() {
            entries.sort_unstable();
        }

        // No survivors at full theta is indistinguishable from empty.
        let is_empty = entries.is_empty() && theta == MAX_THETA;
        Ok(CompactThetaSketch::from_parts(
            entries,
            theta,
            self.seed_hash,
            ordered || a.is_ordered(),
            is_empty,
        ))
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
    fn test_self_difference_is_empty() {
        let a = sketch_with_range(0, 1000);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b.compute(&a, &a, true).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.estimate(), 0.0);
    }

    #[test]
    fn test_empty_a_yields_empty() {
        let a = ThetaSketch::builder().build();
        let b = sketch_with_range(0, 100);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b.compute(&a, &b, true).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.theta64(), MAX_THETA);
    }

    #[test]
    fn test_empty_b_yields_a() {
        let a = sketch_with_range(0, 500);
        let b = ThetaSketch::builder().build();
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b.compute(&a, &b, true).unwrap();
        assert_eq!(result.estimate(), 500.0);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_exact_difference() {
        let a = sketch_with_range(0, 500);
        let b = sketch_with_range(250, 500);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b.compute(&a, &b, true).unwrap();
        assert!(!result.is_estimation_mode());
        assert_eq!(result.estimate(), 250.0);
    }

    #[test]
    fn test_ordered_inputs_and_result() {
        let a = sketch_with_range(0, 500);
        let b = sketch_with_range(250, 500);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b
            .compute(&a.compact(true), &b.compact(true), true)
            .unwrap();
        assert_eq!(result.estimate(), 250.0);
        assert!(result.is_ordered());
        let hashes: Vec<u64> = result.iter().collect();
        assert!(hashes.is_sorted());
    }

    #[test]
    fn test_seed_mismatch_rejected() {
        let mut a = ThetaSketch::builder().seed(7).build();
        a.update("x");
        let b = sketch_with_range(0, 10);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let err = a_not_b.compute(&a, &b, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SeedHashMismatch);
    }

    #[test]
    fn test_no_survivors_in_estimation_mode_is_not_empty() {
        // Disjoint region of a wiped out by b, with theta < 1: the result
        // has no entries but still witnesses a nonzero set.
        let a = sketch_with_range(0, 20_000);
        let b = sketch_with_range(0, 20_000);
        let a_not_b = ThetaANotB::new_with_default_seed();
        let result = a_not_b.compute(&a, &b, true).unwrap();
        assert_eq!(result.num_retained(), 0);
        assert!(result.is_estimation_mode());
        assert!(!result.is_empty());
        assert_eq!(result.estimate(), 0.0);
    }
}
