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

use std::fmt;

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;

mod sealed {
    pub trait Sealed {}
}

/// How a [`CountMinSketch`](super::CountMinSketch) turns one observation into
/// register updates.
///
/// Implemented by [`Increment`], [`SignedIncrement`] and [`PowerOfTwo`].
/// Every value a policy returns is a candidate: the sketch stores it only if it
/// fits the register range, otherwise the register keeps its old value.
pub trait UpdatePolicy: sealed::Sealed + Clone + fmt::Debug {
    /// Short name used in diagnostics.
    const NAME: &'static str;
    /// Whether registers hold two's complement values.
    const SIGNED: bool;
    /// Hash bits consumed per row beyond the column bits.
    const SIGN_BITS: u32;
    /// Whether the policy can undo an update.
    const INVERTIBLE: bool;
    /// Whether conservative update is meaningful for the policy.
    const SUPPORTS_CONSERVATIVE: bool;

    /// Creates the policy state; `seed` feeds any private randomness.
    fn from_seed(seed: u64) -> Self;

    /// Returns the candidate next value of a register holding `current`.
    ///
    /// `sign` is `+1` or `-1`, drawn from the row's hash field. Policies that do
    /// not use signs ignore it.
    fn apply(&mut self, current: i64, sign: i64) -> i64;

    /// Combines two registers at the same position of two sketches.
    fn combine(a: i64, b: i64) -> i64;

    /// Converts a register value to a frequency estimate.
    fn to_estimate(value: i64) -> i64;
}

/// Saturating increment: each observation adds one.
///
/// The only invertible policy; with conservative update disabled the sketch
/// can also retract observations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Increment;

impl sealed::Sealed for Increment {}

impl UpdatePolicy for Increment {
    const NAME: &'static str = "increment";
    const SIGNED: bool = false;
    const SIGN_BITS: u32 = 0;
    const INVERTIBLE: bool = true;
    const SUPPORTS_CONSERVATIVE: bool = true;

    fn from_seed(_seed: u64) -> Self {
        Increment
    }

    #[inline]
    fn apply(&mut self, current: i64, _sign: i64) -> i64 {
        current.saturating_add(1)
    }

    #[inline]
    fn combine(a: i64, b: i64) -> i64 {
        a.saturating_add(b)
    }

    #[inline]
    fn to_estimate(value: i64) -> i64 {
        value
    }
}

/// Count-Sketch style update inside the Count-Min engine: each row adds the
/// `±1` sign drawn from its hash field.
///
/// Merging sums registers; that rule has not been validated for this policy
/// and merges log a warning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SignedIncrement;

impl sealed::Sealed for SignedIncrement {}

impl UpdatePolicy for SignedIncrement {
    const NAME: &'static str = "signed-increment";
    const SIGNED: bool = true;
    const SIGN_BITS: u32 = 1;
    const INVERTIBLE: bool = false;
    const SUPPORTS_CONSERVATIVE: bool = false;

    fn from_seed(_seed: u64) -> Self {
        SignedIncrement
    }

    #[inline]
    fn apply(&mut self, current: i64, sign: i64) -> i64 {
        current.saturating_add(sign)
    }

    #[inline]
    fn combine(a: i64, b: i64) -> i64 {
        a.saturating_add(b)
    }

    #[inline]
    fn to_estimate(value: i64) -> i64 {
        value
    }
}

/// Randomized logarithmic counting.
///
/// A register holding `v > 0` stands for roughly `2^(v-1)` observations. The
/// first observation sets it to 1; afterwards it grows by one with probability
/// `2^-(v-1)`, decided by `v - 1` bits taken from a private random word that
/// is refilled when it runs short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerOfTwo {
    rng: XorShift64,
    bits: u64,
    remaining: u32,
}

impl sealed::Sealed for PowerOfTwo {}

impl PowerOfTwo {
    /// Takes `count` (< 64) random bits and reports whether they were all zero.
    #[inline]
    fn all_zero(&mut self, count: u32) -> bool {
        if self.remaining < count {
            self.bits = self.rng.next_u64();
            self.remaining = u64::BITS;
        }
        let hit = self.bits & ((1u64 << count) - 1) == 0;
        self.bits >>= count;
        self.remaining -= count;
        hit
    }
}

impl UpdatePolicy for PowerOfTwo {
    const NAME: &'static str = "power-of-two";
    const SIGNED: bool = false;
    const SIGN_BITS: u32 = 0;
    const INVERTIBLE: bool = false;
    const SUPPORTS_CONSERVATIVE: bool = true;

    fn from_seed(seed: u64) -> Self {
        let mut rng = XorShift64::seeded(seed);
        let bits = rng.next_u64();
        PowerOfTwo {
            rng,
            bits,
            remaining: u64::BITS,
        }
    }

    fn apply(&mut self, current: i64, _sign: i64) -> i64 {
        if current <= 0 {
            return 1;
        }
        let needed = current - 1;
        // below 2^-63 the draw is treated as a miss
        if needed >= u64::BITS as i64 {
            return current;
        }
        if self.all_zero(needed as u32) {
            current + 1
        } else {
            current
        }
    }

    #[inline]
    fn combine(a: i64, b: i64) -> i64 {
        if a == 0 && b == 0 {
            return 0;
        }
        a.max(b) + i64::from(a == b)
    }

    #[inline]
    fn to_estimate(value: i64) -> i64 {
        match value {
            v if v <= 0 => 0,
            v if v - 1 >= 63 => i64::MAX,
            v => 1 << (v - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment() {
        let mut policy = Increment::from_seed(0);
        assert_eq!(policy.apply(0, -1), 1);
        assert_eq!(policy.apply(41, 1), 42);
        assert_eq!(Increment::combine(3, 4), 7);
        assert_eq!(Increment::to_estimate(9), 9);
    }

    #[test]
    fn test_signed_increment_follows_sign() {
        let mut policy = SignedIncrement::from_seed(0);
        assert_eq!(policy.apply(0, -1), -1);
        assert_eq!(policy.apply(-1, 1), 0);
        assert_eq!(SignedIncrement::combine(-3, 5), 2);
        assert_eq!(SignedIncrement::to_estimate(-7), -7);
    }

    #[test]
    fn test_power_of_two_first_touch_and_second_step() {
        let mut policy = PowerOfTwo::from_seed(11);
        assert_eq!(policy.apply(0, 1), 1);
        // probability 2^0: always advances
        assert_eq!(policy.apply(1, 1), 2);
    }

    #[test]
    fn test_power_of_two_rate() {
        // from 3, the chance of advancing is 1/4
        let mut policy = PowerOfTwo::from_seed(2024);
        let trials = 40_000;
        let hits = (0..trials).filter(|_| policy.apply(3, 1) == 4).count();
        let rate = hits as f64 / trials as f64;
        assert!((rate - 0.25).abs() < 0.02, "rate {rate}");
    }

    #[test]
    fn test_power_of_two_refills_bits() {
        let mut policy = PowerOfTwo::from_seed(5);
        // 40 bits per draw forces a refill on every second call
        for _ in 0..100 {
            let next = policy.apply(41, 1);
            assert!(next == 41 || next == 42);
            assert!(policy.remaining <= u64::BITS);
        }
        assert_eq!(policy.apply(65, 1), 65);
    }

    #[test]
    fn test_power_of_two_combine_and_estimate() {
        assert_eq!(PowerOfTwo::combine(3, 3), 4);
        assert_eq!(PowerOfTwo::combine(5, 2), 5);
        assert_eq!(PowerOfTwo::combine(0, 0), 0);
        assert_eq!(PowerOfTwo::combine(0, 1), 1);
        assert_eq!(PowerOfTwo::to_estimate(0), 0);
        assert_eq!(PowerOfTwo::to_estimate(1), 1);
        assert_eq!(PowerOfTwo::to_estimate(4), 8);
        assert_eq!(PowerOfTwo::to_estimate(64), i64::MAX);
    }
}
