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

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;

/// The Mersenne prime `2^61 - 1`, modulus of [`KWiseHasherSet`].
pub const MERSENNE_61: u64 = (1 << 61) - 1;

#[inline]
fn reduce(x: u128) -> u64 {
    let folded = ((x as u64) & MERSENNE_61) + (x >> 61) as u64;
    let folded = (folded & MERSENNE_61) + (folded >> 61);
    if folded >= MERSENNE_61 {
        folded - MERSENNE_61
    } else {
        folded
    }
}

#[inline]
fn mul_add_mod(acc: u64, x: u64, c: u64) -> u64 {
    reduce(acc as u128 * x as u128 + c as u128)
}

/// A family of independent `K`-wise independent hash functions, one per row.
///
/// Row `r` evaluates a polynomial of degree `K - 1` with its own random
/// coefficients over the field of integers modulo [`MERSENNE_61`]. Outputs are
/// below `2^61`. Keys congruent modulo the prime hash identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KWiseHasherSet<const K: usize = 4> {
    key: u64,
    coefficients: Vec<[u64; K]>,
}

impl<const K: usize> KWiseHasherSet<K> {
    /// Draws coefficients for `num_rows` functions from `key`.
    pub fn new(key: u64, num_rows: usize) -> Self {
        let mut rng = XorShift64::seeded(key);
        let coefficients = (0..num_rows)
            .map(|_| std::array::from_fn(|_| reduce(rng.next_u64() as u128)))
            .collect();
        Self { key, coefficients }
    }

    /// Evaluates the function of `row` at `value`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not below [`num_rows`](Self::num_rows).
    #[inline]
    pub fn hash(&self, value: u64, row: usize) -> u64 {
        let x = reduce(value as u128);
        let coefficients = &self.coefficients[row];
        coefficients
            .iter()
            .rev()
            .fold(0, |acc, &c| mul_add_mod(acc, x, c))
    }

    /// Returns the key the coefficients were drawn from.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Returns the number of functions in the set.
    pub fn num_rows(&self) -> usize {
        self.coefficients.len()
    }
}
