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

//! Types shared across sketch families.

pub mod binomial_bounds;

/// Hash table resize factor: how much the table grows on each resize until it
/// reaches its maximum size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeFactor {
    /// No growth; the table is allocated at full size up front.
    X1,
    /// Double on each resize.
    X2,
    /// Quadruple on each resize.
    X4,
    /// Grow eightfold on each resize.
    X8,
}

impl ResizeFactor {
    /// Log2 of the growth multiple.
    pub fn lg_value(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }

    /// Inverse of [`lg_value`](Self::lg_value), used when reading an image.
    pub(crate) fn from_lg(lg: u8) -> Option<ResizeFactor> {
        match lg {
            0 => Some(ResizeFactor::X1),
            1 => Some(ResizeFactor::X2),
            2 => Some(ResizeFactor::X4),
            3 => Some(ResizeFactor::X8),
            _ => None,
        }
    }
}

/// Number of standard deviations for confidence bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumStdDev {
    /// ~68% confidence interval.
    One,
    /// ~95% confidence interval.
    Two,
    /// ~99.7% confidence interval.
    Three,
}

impl NumStdDev {
    pub(crate) fn value(self) -> f64 {
        match self {
            NumStdDev::One => 1.0,
            NumStdDev::Two => 2.0,
            NumStdDev::Three => 3.0,
        }
    }
}

/// Canonicalize a double so equal-valued inputs hash identically: signed zero
/// collapses to +0.0 and every NaN collapses to the single canonical NaN bit
/// pattern.
pub fn canonical_double(value: f64) -> i64 {
    if value.is_nan() {
        0x7ff8_0000_0000_0000_i64
    } else {
        // -0.0 + 0.0 == +0.0 under IEEE754 roundTiesToEven rounding mode,
        // which Rust guarantees. Thus, by adding a positive zero we
        // canonicalize signed zero without any branches in one instruction.
        (value + 0.0).to_bits() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_factor_lg_round_trip() {
        for rf in [
            ResizeFactor::X1,
            ResizeFactor::X2,
            ResizeFactor::X4,
            ResizeFactor::X8,
        ] {
            assert_eq!(ResizeFactor::from_lg(rf.lg_value()), Some(rf));
        }
        assert_eq!(ResizeFactor::from_lg(4), None);
    }

    #[test]
    fn test_canonical_double_signed_zero() {
        assert_eq!(canonical_double(-0.0), canonical_double(0.0));
    }

    #[test]
    fn test_canonical_double_nan_collapses() {
        let quiet = f64::NAN;
        let weird = f64::from_bits(0x7ff8_0000_0000_0001);
        assert_eq!(canonical_double(quiet), canonical_double(weird));
    }

    #[test]
    fn test_canonical_double_distinct_values() {
        assert_ne!(canonical_double(1.0), canonical_double(2.0));
        assert_ne!(canonical_double(1.0), canonical_double(-1.0));
    }
}
