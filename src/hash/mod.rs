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

//! Keyed hashing for sketch updates.
//!
//! Serialized sketches store hashes, not original items, so the hash function
//! is part of the wire format: two sketches can only be merged if they were
//! built with the same function and the same seed.

mod murmur;

pub use murmur::MurmurHash3X64128;

/// Default seed for sketch updates. Sketches built with different seeds
/// cannot be merged.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Compute the 16-bit hash of an update seed.
///
/// The seed hash is stored in serialized images so that mixing sketches
/// built with different seeds is detected on read. Zero is reserved to mean
/// "no seed check".
pub fn compute_seed_hash(seed: u64) -> u16 {
    let mut hasher = MurmurHash3X64128::with_seed(0);
    hasher.write_u64_raw(seed);
    let (h1, _) = hasher.finish128();
    (h1 & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed_hash_is_nonzero() {
        assert_ne!(compute_seed_hash(DEFAULT_UPDATE_SEED), 0);
    }

    #[test]
    fn test_seed_hash_distinguishes_seeds() {
        assert_ne!(
            compute_seed_hash(DEFAULT_UPDATE_SEED),
            compute_seed_hash(DEFAULT_UPDATE_SEED + 1)
        );
    }

    #[test]
    fn test_seed_hash_is_stable() {
        assert_eq!(
            compute_seed_hash(DEFAULT_UPDATE_SEED),
            compute_seed_hash(DEFAULT_UPDATE_SEED)
        );
    }
}
