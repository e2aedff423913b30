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

use tracing::debug;

use crate::common::median_i64;
use crate::config::DEFAULT_LOG2_ROW_SIZE;
use crate::config::DEFAULT_NUM_ROWS;
use crate::config::DEFAULT_REGISTER_BITS;
use crate::config::SketchConfig;
use crate::countsketch::DEFAULT_SEED;
use crate::countsketch::table::SignTable;
use crate::error::Error;
use crate::hash::KWiseHasherSet;
use crate::hash::LANES;

/// Count-Sketch with a 4-wise independent hash function per row.
///
/// Row `r` evaluates its own cubic polynomial over `2^61 - 1`; the low `L`
/// bits of the result pick the column and bit `L` the sign. Slower than
/// [`CountSketch`](super::CountSketch) but with the independence the
/// Count-Sketch variance bound assumes.
#[derive(Debug, Clone)]
pub struct CountSketch4Wise {
    table: SignTable,
    hashers: KWiseHasherSet<4>,
    log2_row_size: u32,
    mask: u64,
}

impl CountSketch4Wise {
    /// Returns a builder for creating a 4-wise Count-Sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::countsketch::CountSketch4Wise;
    ///
    /// let mut sketch = CountSketch4Wise::builder().num_rows(7).build().unwrap();
    /// sketch.add(1);
    /// sketch.add(1);
    /// assert_eq!(sketch.estimate(1).unwrap(), 2);
    /// ```
    pub fn builder() -> CountSketch4WiseBuilder {
        CountSketch4WiseBuilder::default()
    }

    fn from_config(config: SketchConfig) -> Result<Self, Error> {
        let table = SignTable::new(config)?;
        let hashers = KWiseHasherSet::new(config.seed(), config.num_rows() as usize);
        let log2_row_size = u32::from(config.log2_row_size());

        debug!(
            register_bits = config.register_bits(),
            log2_row_size = config.log2_row_size(),
            num_rows = config.num_rows(),
            key = hashers.key(),
            "created 4-wise count-sketch"
        );

        Ok(Self {
            table,
            hashers,
            log2_row_size,
            mask: (1u64 << log2_row_size) - 1,
        })
    }

    /// Flat register index and sign of `item` in `row`.
    #[inline]
    fn locate(&self, item: u64, row: usize) -> (usize, i64) {
        let hv = self.hashers.hash(item, row);
        let index = (row << self.log2_row_size) + (hv & self.mask) as usize;
        let sign = if (hv >> self.log2_row_size) & 1 == 1 {
            1
        } else {
            -1
        };
        (index, sign)
    }

    fn update(&mut self, item: u64, delta: i64) {
        for row in 0..self.hashers.num_rows() {
            let (index, sign) = self.locate(item, row);
            self.table.update(index, sign, delta);
        }
    }

    fn update_and_estimate(&mut self, item: u64, delta: i64) -> Result<i64, Error> {
        let mut votes = self.table.votes_buffer()?;
        for row in 0..self.hashers.num_rows() {
            let (index, sign) = self.locate(item, row);
            votes.push(self.table.update(index, sign, delta));
        }
        Ok(median_i64(&mut votes))
    }

    /// Adds one occurrence of `item`.
    pub fn add(&mut self, item: u64) {
        self.update(item, 1);
    }

    /// Removes one occurrence of `item`.
    pub fn subtract(&mut self, item: u64) {
        self.update(item, -1);
    }

    /// Adds one occurrence of `item` and returns the median of its updated
    /// row votes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory)
    /// if the vote buffer cannot be allocated; the update is not applied then.
    pub fn add_and_estimate(&mut self, item: u64) -> Result<i64, Error> {
        self.update_and_estimate(item, 1)
    }

    /// Removes one occurrence of `item` and returns the median of its updated
    /// row votes.
    ///
    /// # Errors
    ///
    /// Same as [`add_and_estimate`](Self::add_and_estimate).
    pub fn subtract_and_estimate(&mut self, item: u64) -> Result<i64, Error> {
        self.update_and_estimate(item, -1)
    }

    /// Adds each of the [`LANES`] items, lane by lane.
    pub fn add_batch(&mut self, items: [u64; LANES]) {
        for item in items {
            self.update(item, 1);
        }
    }

    /// Removes each of the [`LANES`] items, lane by lane.
    pub fn subtract_batch(&mut self, items: [u64; LANES]) {
        for item in items {
            self.update(item, -1);
        }
    }

    /// Estimates the frequency of `item` as the median over rows of
    /// `register * sign`. The result is not clipped at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory)
    /// if the vote buffer cannot be allocated.
    pub fn estimate(&self, item: u64) -> Result<i64, Error> {
        let mut votes = self.table.votes_buffer()?;
        for row in 0..self.hashers.num_rows() {
            let (index, sign) = self.locate(item, row);
            votes.push(self.table.vote(index, sign));
        }
        Ok(median_i64(&mut votes))
    }

    /// Sums the registers of `other` into this sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`](crate::error::ErrorKind::IncompatibleSketch)
    /// if the dimensions or hash family keys differ.
    pub fn merge_in_place(&mut self, other: &Self) -> Result<(), Error> {
        self.table.check_dimensions(&other.table)?;
        if self.hashers != other.hashers {
            return Err(Error::incompatible("hash family keys differ")
                .with_context("left_key", self.hashers.key())
                .with_context("right_key", other.hashers.key()));
        }
        self.table.add_table(&other.table);
        Ok(())
    }

    /// Returns the sum of this sketch and `other`.
    ///
    /// # Errors
    ///
    /// Same as [`merge_in_place`](Self::merge_in_place).
    pub fn merge(&self, other: &Self) -> Result<Self, Error> {
        let mut merged = self.clone();
        merged.merge_in_place(other)?;
        Ok(merged)
    }

    /// Median over rows of each row's Euclidean norm.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory)
    /// if the per-row buffer cannot be allocated.
    pub fn l2_norm_estimate(&self) -> Result<f64, Error> {
        self.table.l2_norm_estimate()
    }

    /// Resets every register to zero.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Calls `f(index, value)` for every register in index order.
    pub fn for_each_register(&self, f: impl FnMut(usize, i64)) {
        self.table.for_each_register(f);
    }

    /// Returns the total number of registers.
    pub fn num_registers(&self) -> usize {
        self.table.len()
    }

    /// Returns the key the hash family was drawn from.
    pub fn key(&self) -> u64 {
        self.hashers.key()
    }

    /// Returns the dimensions this sketch was built with.
    pub fn config(&self) -> &SketchConfig {
        self.table.config()
    }

    /// Returns `(struct_bytes, data_bytes)`.
    pub fn memory_usage(&self) -> (usize, usize) {
        (
            size_of::<Self>(),
            self.hashers.num_rows() * size_of::<[u64; 4]>() + self.table.byte_size(),
        )
    }
}

/// Builder for [`CountSketch4Wise`].
#[derive(Debug, Clone)]
pub struct CountSketch4WiseBuilder {
    config: SketchConfig,
}

impl Default for CountSketch4WiseBuilder {
    fn default() -> Self {
        Self {
            config: SketchConfig::new(
                DEFAULT_REGISTER_BITS,
                DEFAULT_LOG2_ROW_SIZE,
                DEFAULT_NUM_ROWS,
                DEFAULT_SEED,
            ),
        }
    }
}

impl CountSketch4WiseBuilder {
    /// Set the register width `W` in bits; at least 2.
    pub fn register_bits(mut self, register_bits: u8) -> Self {
        self.config.set_register_bits(register_bits);
        self
    }

    /// Set the log2 `L` of the number of registers per row.
    pub fn log2_row_size(mut self, log2_row_size: u8) -> Self {
        self.config.set_log2_row_size(log2_row_size);
        self
    }

    /// Set the number of rows `H`.
    pub fn num_rows(mut self, num_rows: u32) -> Self {
        self.config.set_num_rows(num_rows);
        self
    }

    /// Set the key the hash family is drawn from.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.set_seed(seed);
        self
    }

    /// Build the sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// for invalid dimensions and
    /// [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory) if the
    /// registers cannot be allocated.
    pub fn build(self) -> Result<CountSketch4Wise, Error> {
        CountSketch4Wise::from_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rows_use_their_own_function() {
        let sketch = CountSketch4Wise::builder()
            .log2_row_size(16)
            .num_rows(4)
            .build()
            .unwrap();
        let columns: Vec<usize> = (0..4)
            .map(|row| sketch.locate(99, row).0 - (row << 16))
            .collect();
        assert!(columns.iter().any(|&c| c != columns[0]), "{columns:?}");
    }

    #[test]
    fn test_batch_matches_sequential() {
        let build = || CountSketch4Wise::builder().log2_row_size(6).build().unwrap();
        let mut batched = build();
        let mut sequential = build();
        batched.add_batch([1, 2, 3, 1]);
        for item in [1, 2, 3, 1] {
            sequential.add(item);
        }
        let mut left = vec![];
        let mut right = vec![];
        batched.for_each_register(|_, v| left.push(v));
        sequential.for_each_register(|_, v| right.push(v));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_requires_same_key() {
        let mut left = CountSketch4Wise::builder().seed(1).build().unwrap();
        let right = CountSketch4Wise::builder().seed(2).build().unwrap();
        let err = left.merge_in_place(&right).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleSketch);
    }

    #[test]
    fn test_subtract_and_estimate() {
        let mut sketch = CountSketch4Wise::builder().build().unwrap();
        assert_eq!(sketch.add_and_estimate(5).unwrap(), 1);
        assert_eq!(sketch.add_and_estimate(5).unwrap(), 2);
        assert_eq!(sketch.subtract_and_estimate(5).unwrap(), 1);
        sketch.clear();
        assert_eq!(sketch.estimate(5).unwrap(), 0);
    }
}
