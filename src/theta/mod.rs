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

//! Theta sketches: distinct counting with set operations.
//!
//! The family consists of:
//!
//! - [`ThetaSketch`]: the mutable sketch that accumulates a stream,
//! - [`CompactThetaSketch`]: the immutable, serializable result form,
//! - [`ThetaUnion`], [`ThetaIntersection`], [`ThetaANotB`]: set operators
//!   over any sketch form.
//!
//! All sketches sample the 63-bit hash space below a threshold theta. A
//! sketch retains every hash below its theta, so the retained count divided
//! by theta estimates the distinct count, and two sketches built with the
//! same seed can be combined hash-by-hash.

mod a_not_b;
mod bit_pack;
mod compact;
mod hash_table;
mod intersection;
mod serialization;
mod sketch;
mod union;

pub use self::a_not_b::ThetaANotB;
pub use self::compact::CompactThetaSketch;
pub use self::compact::WrappedThetaSketch;
pub use self::hash_table::DEFAULT_LG_K;
pub use self::hash_table::MAX_LG_K;
pub use self::hash_table::MAX_THETA;
pub use self::hash_table::MIN_LG_K;
pub use self::intersection::ThetaIntersection;
pub use self::sketch::ThetaSketch;
pub use self::sketch::ThetaSketchBuilder;
pub use self::sketch::UpdateResult;
pub use self::union::ThetaUnion;
pub use self::union::ThetaUnionBuilder;

/// Read access to any theta sketch form.
///
/// Set operators accept `impl ThetaSketchView`, so a mutable sketch, a
/// compact sketch, and a wrap over raw image bytes all combine the same way.
pub trait ThetaSketchView {
    /// The sampling threshold as u64.
    fn theta64(&self) -> u64;

    /// Number of retained hashes.
    fn num_retained(&self) -> usize;

    /// Whether the source set is empty.
    fn is_empty(&self) -> bool;

    /// Whether [`iter_hashes`](Self::iter_hashes) yields ascending hashes.
    fn is_ordered(&self) -> bool;

    /// The 16-bit hash of the update seed.
    fn seed_hash(&self) -> u16;

    /// Iterator over the retained hashes.
    fn iter_hashes(&self) -> impl Iterator<Item = u64> + '_;
}
