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
use crate::common::try_filled;
use crate::config::DEFAULT_LOG2_ROW_SIZE;
use crate::config::DEFAULT_NUM_ROWS;
use crate::config::DEFAULT_REGISTER_BITS;
use crate::config::SketchConfig;
use crate::countsketch::DEFAULT_SEED;
use crate::countsketch::table::SignTable;
use crate::error::Error;
use crate::hash::KeyHasher;
use crate::hash::LANES;
use crate::hash::WangHash;
use crate::rows::RowLayout;

/// Count-Sketch whose rows are packed into seeded hash words.
///
/// Each row takes `L + 1` bits of a hash word: `L` for the column and one
/// for the sign. Registers are signed and estimates may be negative.
///
/// # Examples
///
/// ```
/// use freqsketch::countsketch::CountSketch;
///
/// let mut sketch = CountSketch::<freqsketch::hash::WangHash>::builder()
///     .log2_row_size(12)
///     .num_rows(5)
///     .build()
///     .unwrap();
/// for _ in 0..20 {
///     sketch.add(8);
/// }
/// assert_eq!(sketch.estimate(8).unwrap(), 20);
/// ```
#[derive(Debug, Clone)]
pub struct CountSketch<H: KeyHasher = WangHash> {
    table: SignTable,
    layout: RowLayout,
    hasher: H,
    /// Per-group hash words of a batch.
    words: Vec<[u64; LANES]>,
}

impl<H: KeyHasher + Default> CountSketch<H> {
    /// Returns a builder for creating a Count-Sketch.
    pub fn builder() -> CountSketchBuilder<H> {
        CountSketchBuilder::default()
    }
}

impl<H: KeyHasher> CountSketch<H> {
    fn from_parts(config: SketchConfig, hasher: H) -> Result<Self, Error> {
        let table = SignTable::new(config)?;
        let layout_seed = u64::from(config.log2_row_size())
            .wrapping_add(u64::from(config.num_rows()))
            .wrapping_add(config.seed());
        let layout = RowLayout::new(&config, 1, layout_seed);
        let words = try_filled("batch hash words", layout.num_groups(), [0u64; LANES])?;

        debug!(
            register_bits = config.register_bits(),
            log2_row_size = config.log2_row_size(),
            num_rows = config.num_rows(),
            seeds = layout.seeds().len(),
            rows_per_word = layout.rows_per_word(),
            "created count-sketch"
        );

        Ok(Self {
            table,
            layout,
            hasher,
            words,
        })
    }

    fn update(&mut self, item: u64, delta: i64) {
        let Self {
            table,
            layout,
            hasher,
            ..
        } = self;
        layout.for_each_row_batched(hasher, item, |_, index, bits| {
            table.update(index, layout.sign(bits), delta);
        });
    }

    fn update_and_estimate(&mut self, item: u64, delta: i64) -> Result<i64, Error> {
        let mut votes = self.table.votes_buffer()?;
        let Self {
            table,
            layout,
            hasher,
            ..
        } = self;
        layout.for_each_row_batched(hasher, item, |_, index, bits| {
            votes.push(table.update(index, layout.sign(bits), delta));
        });
        Ok(median_i64(&mut votes))
    }

    fn update_batch(&mut self, items: [u64; LANES], delta: i64) {
        let Self {
            table,
            layout,
            hasher,
            words,
        } = self;
        layout.for_each_lane_row(hasher, items, words, |_, _, index, bits| {
            table.update(index, layout.sign(bits), delta);
        });
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

    /// Adds one occurrence of each of the [`LANES`] items, in lane order.
    ///
    /// Same result as calling [`add`](Self::add) on each item in turn.
    pub fn add_batch(&mut self, items: [u64; LANES]) {
        self.update_batch(items, 1);
    }

    /// Removes one occurrence of each of the [`LANES`] items, in lane order.
    pub fn subtract_batch(&mut self, items: [u64; LANES]) {
        self.update_batch(items, -1);
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
        self.layout
            .for_each_row_batched(&self.hasher, item, |_, index, bits| {
                votes.push(self.table.vote(index, self.layout.sign(bits)));
            });
        Ok(median_i64(&mut votes))
    }

    /// Sums the registers of `other` into this sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`](crate::error::ErrorKind::IncompatibleSketch)
    /// if the dimensions, seed sets or hashers differ.
    pub fn merge_in_place(&mut self, other: &Self) -> Result<(), Error> {
        self.table.check_dimensions(&other.table)?;
        if self.layout.seeds() != other.layout.seeds() {
            return Err(Error::incompatible("seed sets differ")
                .with_context("left_seed", self.table.config().seed())
                .with_context("right_seed", other.table.config().seed()));
        }
        if self.hasher != other.hasher {
            return Err(Error::incompatible("hashers differ"));
        }
        self.table.add_table(&other.table);
        Ok(())
    }

    /// Returns the sum of this sketch and `other`.
    ///
    /// # Errors
    ///
    /// Same as [`merge_in_place`](Self::merge_in_place).
    pub fn merge(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
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

    /// Returns the seed set.
    pub fn seeds(&self) -> &[u64] {
        self.layout.seeds()
    }

    /// Returns the dimensions this sketch was built with.
    pub fn config(&self) -> &SketchConfig {
        self.table.config()
    }

    /// Returns `(struct_bytes, data_bytes)`.
    pub fn memory_usage(&self) -> (usize, usize) {
        (
            size_of::<Self>(),
            size_of_val(self.layout.seeds()) + self.table.byte_size(),
        )
    }
}

/// Builder for [`CountSketch`].
#[derive(Debug, Clone)]
pub struct CountSketchBuilder<H: KeyHasher = WangHash> {
    config: SketchConfig,
    hasher: H,
}

impl<H: KeyHasher + Default> Default for CountSketchBuilder<H> {
    fn default() -> Self {
        Self {
            config: SketchConfig::new(
                DEFAULT_REGISTER_BITS,
                DEFAULT_LOG2_ROW_SIZE,
                DEFAULT_NUM_ROWS,
                DEFAULT_SEED,
            ),
            hasher: H::default(),
        }
    }
}

impl<H: KeyHasher> CountSketchBuilder<H> {
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

    /// Set the base seed the row seeds are drawn from.
    ///
    /// Only rows past the first hash word use seeds. When `num_rows` is at
    /// most `64 / (log2_row_size + 1)` (rounded down) the base seed does not
    /// change hashing, and sketches built with different seeds merge.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.set_seed(seed);
        self
    }

    /// Set the hasher instance.
    pub fn hasher(mut self, hasher: H) -> Self {
        self.hasher = hasher;
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
    pub fn build(self) -> Result<CountSketch<H>, Error> {
        CountSketch::from_parts(self.config, self.hasher)
    }
}
