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

//! Serialization tests for the theta sketch image formats.

use theta_sketches::ErrorKind;
use theta_sketches::theta::CompactThetaSketch;
use theta_sketches::theta::ThetaSketch;
use theta_sketches::theta::ThetaUnion;

fn sketch_with_range(lg_k: u8, start: u64, count: u64) -> ThetaSketch {
    let mut sketch = ThetaSketch::builder().lg_k(lg_k).build();
    for i in 0..count {
        sketch.update(start + i);
    }
    sketch
}

#[test]
fn test_empty_compact_image_is_canonical() {
    let sketch = ThetaSketch::builder().lg_k(12).build();
    let bytes = sketch.compact(true).serialize();
    assert_eq!(bytes, vec![1, 3, 3, 0, 0, 0x1E, 0, 0]);
}

#[test]
fn test_single_item_image() {
    let mut sketch = ThetaSketch::builder().lg_k(12).build();
    sketch.update("apple");

    let bytes = sketch.compact(true).serialize();
    assert_eq!(bytes.len(), 16);
    assert_eq!(bytes[0], 1, "pre longs");
    assert_eq!(bytes[1], 3, "serial version");
    assert_eq!(bytes[2], 3, "family");
    assert_ne!(bytes[5] & (1 << 5), 0, "single item flag");

    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.estimate(), 1.0);
}

#[test]
fn test_exact_compact_image_layout() {
    let sketch = sketch_with_range(12, 0, 100);
    let bytes = sketch.compact(true).serialize();

    // 2 preamble longs + 100 hashes.
    assert_eq!(bytes.len(), 16 + 100 * 8);
    assert_eq!(bytes[0], 2, "pre longs");
    assert_eq!(
        u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        100,
        "retained count"
    );
}

#[test]
fn test_estimation_compact_image_layout() {
    let sketch = sketch_with_range(4, 0, 100_000);
    let compact = sketch.compact(true);
    let bytes = compact.serialize();

    assert_eq!(bytes.len(), 24 + compact.num_retained() * 8);
    assert_eq!(bytes[0], 3, "pre longs");
    assert_eq!(
        u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        compact.theta64(),
        "theta long"
    );
}

#[test]
fn test_compact_round_trip_all_modes() {
    for (lg_k, count) in [(12u8, 0u64), (12, 1), (12, 100), (4, 100_000)] {
        let sketch = sketch_with_range(lg_k, 0, count);
        let compact = sketch.compact(true);
        let restored = CompactThetaSketch::deserialize(&compact.serialize()).unwrap();
        assert_eq!(restored, compact, "lg_k {lg_k} count {count}");
    }
}

#[test]
fn test_compressed_round_trip_small_exact_set() {
    // Four hashes at theta 1.0 through the compressed image.
    let compact = sketch_with_range(12, 0, 4).compact(true);
    assert_eq!(compact.num_retained(), 4);

    let bytes = compact.serialize_compressed();
    assert_eq!(bytes[1], 4, "compressed serial version");
    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored, compact);
    let hashes: Vec<u64> = restored.iter().collect();
    assert!(hashes.is_sorted());
}

#[test]
fn test_compressed_round_trip_estimation_mode() {
    let sketch = sketch_with_range(4, 0, 1_000_000);
    let compact = sketch.compact(true);
    assert!(compact.is_estimation_mode());

    let bytes = compact.serialize_compressed();
    let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored, compact);
}

#[test]
fn test_unknown_serial_version_is_rejected() {
    let sketch = sketch_with_range(12, 0, 10);
    let mut bytes = sketch.compact(true).serialize();
    bytes[1] = 99;
    let err = CompactThetaSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_wrap_feeds_set_operations() {
    // Writer process: build and serialize two sketches. Reader process:
    // wrap the images and merge without decoding.
    let a_bytes = sketch_with_range(12, 0, 10_000).compact(true).serialize();
    let b_bytes = sketch_with_range(12, 5_000, 10_000).compact(true).serialize();

    let a = CompactThetaSketch::wrap(&a_bytes).unwrap();
    let b = CompactThetaSketch::wrap(&b_bytes).unwrap();

    let mut union = ThetaUnion::builder().lg_k(12).build();
    union.update(&a).unwrap();
    union.update(&b).unwrap();

    let estimate = union.result(true).estimate();
    assert!((estimate - 15_000.0).abs() < 15_000.0 * 0.05);
}

#[test]
fn test_update_sketch_table_image_round_trip() {
    let sketch = sketch_with_range(5, 0, 10_000);
    let restored = ThetaSketch::deserialize(&sketch.serialize()).unwrap();
    assert_eq!(restored.estimate(), sketch.estimate());
    assert_eq!(restored.theta64(), sketch.theta64());
    assert_eq!(restored.num_retained(), sketch.num_retained());
}

#[test]
fn test_union_state_image_round_trip() {
    let mut union = ThetaUnion::builder().lg_k(5).build();
    union.update(&sketch_with_range(5, 0, 10_000)).unwrap();

    let restored = ThetaUnion::deserialize(&union.serialize()).unwrap();
    assert_eq!(restored.result(true), union.result(true));
}

#[test]
fn test_seed_checks_across_images() {
    let mut sketch = ThetaSketch::builder().seed(42).build();
    for i in 0..100 {
        sketch.update(i);
    }
    let compact_bytes = sketch.compact(true).serialize();
    let table_bytes = sketch.serialize();

    assert!(CompactThetaSketch::deserialize_with_seed(&compact_bytes, 42).is_ok());
    assert_eq!(
        CompactThetaSketch::deserialize(&compact_bytes).unwrap_err().kind(),
        ErrorKind::SeedHashMismatch
    );
    assert!(ThetaSketch::deserialize_with_seed(&table_bytes, 42).is_ok());
    assert_eq!(
        ThetaSketch::deserialize(&table_bytes).unwrap_err().kind(),
        ErrorKind::SeedHashMismatch
    );

    // Seed 0 skips the check on read.
    assert!(CompactThetaSketch::deserialize_with_seed(&compact_bytes, 0).is_ok());
    assert!(CompactThetaSketch::wrap_with_seed(&compact_bytes, 0).is_ok());
}

#[test]
fn test_images_are_cross_seed_compatible_when_seeds_match() {
    let mut a = ThetaSketch::builder().seed(42).build();
    let mut b = ThetaSketch::builder().seed(42).build();
    for i in 0..1000 {
        a.update(i);
        b.update(i + 500);
    }

    let mut union = ThetaUnion::builder().lg_k(12).seed(42).build();
    union.update_image(&a.compact(true).serialize()).unwrap();
    union.update_image(&b.compact(true).serialize()).unwrap();
    assert_eq!(union.result(true).estimate(), 1500.0);
}

#[test]
fn test_truncated_images_are_rejected() {
    let sketch = sketch_with_range(12, 0, 100);
    let compact_bytes = sketch.compact(true).serialize();
    let compressed_bytes = sketch.compact(true).serialize_compressed();
    let table_bytes = sketch.serialize();

    for bytes in [&compact_bytes, &compressed_bytes] {
        for len in [0, 1, 7, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                CompactThetaSketch::deserialize(&bytes[..len]).is_err(),
                "truncation to {len} must not parse"
            );
        }
    }
    for len in [0, 1, 7, table_bytes.len() / 2, table_bytes.len() - 1] {
        assert!(ThetaSketch::deserialize(&table_bytes[..len]).is_err());
    }
}
