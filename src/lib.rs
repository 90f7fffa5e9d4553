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

//! Theta sketches for approximate distinct counting.
//!
//! A Theta sketch summarises a stream of items in fixed memory and answers
//! "how many distinct items were there?" with a bounded relative error. Unlike
//! counter-based cardinality sketches, Theta sketches also support exact set
//! algebra over summaries: union, intersection, and difference of sketches are
//! themselves sketches.
//!
//! # Quick start
//!
//! ```
//! use theta_sketches::theta::ThetaSketch;
//! use theta_sketches::theta::ThetaUnion;
//!
//! let mut a = ThetaSketch::builder().lg_k(12).build();
//! let mut b = ThetaSketch::builder().lg_k(12).build();
//! for i in 0..1000 {
//!     a.update(i);
//!     b.update(i + 500);
//! }
//!
//! let mut union = ThetaUnion::builder().lg_k(12).build();
//! union.update(&a).unwrap();
//! union.update(&b).unwrap();
//! let result = union.result(true);
//! assert!((result.estimate() - 1500.0).abs() < 15.0);
//! ```
//!
//! Sketches serialize to a compact little-endian binary image that can be
//! written by one process and merged by another; see
//! [`CompactThetaSketch`](theta::CompactThetaSketch).

mod codec;
pub mod common;
pub mod error;
pub mod hash;
pub mod theta;

pub use error::Error;
pub use error::ErrorKind;
