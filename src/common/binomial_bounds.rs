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

//! Confidence bounds for the theta-sampling estimator.
//!
//! With `n` hashes retained at threshold `theta`, the retained count is a
//! binomial sample of the unknown cardinality `N` with success probability
//! `theta`, so the relative standard error of the estimate `n / theta` is
//! `sqrt((1 - theta) / n)`. The bounds below apply the log-normal
//! approximation `estimate * exp(±s * rse)`, which stays positive, brackets
//! the estimate, and widens monotonically with `s`. The lower bound is
//! floored at `n`: at least `n` distinct items were observed.

use crate::common::NumStdDev;

// One-sided upper tail mass at 1, 2, and 3 standard deviations. Used for the
// zero-count Poisson bound ln(1/delta) / theta.
const LN_INV_TAIL: [f64; 3] = [1.841, 3.783, 6.608];

fn tail_index(num_std_dev: NumStdDev) -> usize {
    match num_std_dev {
        NumStdDev::One => 0,
        NumStdDev::Two => 1,
        NumStdDev::Three => 2,
    }
}

/// Approximate lower bound on the cardinality given `num_retained` entries at
/// threshold `theta` (a fraction in `(0, 1]`).
pub fn lower_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev) -> f64 {
    debug_assert!(theta > 0.0 && theta <= 1.0);
    if theta >= 1.0 {
        return num_retained as f64;
    }
    if num_retained == 0 {
        return 0.0;
    }
    let n = num_retained as f64;
    let estimate = n / theta;
    let rse = ((1.0 - theta) / n).sqrt();
    (estimate * (-num_std_dev.value() * rse).exp()).max(n)
}

/// Approximate upper bound on the cardinality given `num_retained` entries at
/// threshold `theta` (a fraction in `(0, 1]`).
pub fn upper_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev) -> f64 {
    debug_assert!(theta > 0.0 && theta <= 1.0);
    if theta >= 1.0 {
        return num_retained as f64;
    }
    if num_retained == 0 {
        // Zero retained at sampling rate theta: one-sided Poisson bound on
        // how large the set could still be.
        return LN_INV_TAIL[tail_index(num_std_dev)] / theta;
    }
    let n = num_retained as f64;
    let estimate = n / theta;
    let rse = ((1.0 - theta) / n).sqrt();
    estimate * (num_std_dev.value() * rse).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_mode_bounds_collapse() {
        for s in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            assert_eq!(lower_bound(100, 1.0, s), 100.0);
            assert_eq!(upper_bound(100, 1.0, s), 100.0);
        }
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        let n = 4096u64;
        let theta = 0.01;
        let estimate = n as f64 / theta;
        for s in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            assert!(lower_bound(n, theta, s) < estimate);
            assert!(upper_bound(n, theta, s) > estimate);
        }
    }

    #[test]
    fn test_bounds_widen_with_std_dev() {
        let n = 1000u64;
        let theta = 0.1;
        let lb1 = lower_bound(n, theta, NumStdDev::One);
        let lb2 = lower_bound(n, theta, NumStdDev::Two);
        let lb3 = lower_bound(n, theta, NumStdDev::Three);
        let ub1 = upper_bound(n, theta, NumStdDev::One);
        let ub2 = upper_bound(n, theta, NumStdDev::Two);
        let ub3 = upper_bound(n, theta, NumStdDev::Three);
        assert!(lb3 < lb2 && lb2 < lb1);
        assert!(ub1 < ub2 && ub2 < ub3);
    }

    #[test]
    fn test_lower_bound_never_below_retained() {
        // Tiny n with a harsh theta: the raw approximation would dip below n.
        assert!(lower_bound(2, 0.001, NumStdDev::Three) >= 2.0);
    }

    #[test]
    fn test_zero_count_estimation_mode() {
        assert_eq!(lower_bound(0, 0.5, NumStdDev::Two), 0.0);
        let ub = upper_bound(0, 0.5, NumStdDev::Two);
        assert!(ub > 0.0 && ub < 10.0);
        assert!(upper_bound(0, 0.5, NumStdDev::Three) > ub);
    }
}
