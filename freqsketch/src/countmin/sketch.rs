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
use tracing::warn;

use crate::common::l2_norm_estimate;
use crate::common::try_with_capacity;
use crate::config::SketchConfig;
use crate::countmin::CountMinSketchBuilder;
use crate::countmin::Increment;
use crate::countmin::UpdatePolicy;
use crate::error::Error;
use crate::hash::KeyHasher;
use crate::hash::WangHash;
use crate::register::RegisterTable;
use crate::rows::RowLayout;

/// Count-Min frequency sketch over 64-bit keys.
///
/// `H` rows of `2^L` registers, each `W` bits wide. An item touches one
/// register per row; how the register changes is decided by the
/// [`UpdatePolicy`] `P`, and the estimate is the minimum over rows.
///
/// Use [`CountMinSketch::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CountMinSketch<P: UpdatePolicy = Increment, H: KeyHasher = WangHash> {
    config: SketchConfig,
    layout: RowLayout,
    registers: RegisterTable,
    policy: P,
    hasher: H,
    conservative: bool,
    allow_deletion: bool,
    /// Register indices of the item being updated, one per row.
    indices: Vec<usize>,
}

impl<P: UpdatePolicy, H: KeyHasher + Default> CountMinSketch<P, H> {
    /// Returns a builder for creating a Count-Min sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::countmin::CountMinSketch;
    /// use freqsketch::countmin::PowerOfTwo;
    ///
    /// let sketch = CountMinSketch::<PowerOfTwo>::builder()
    ///     .register_bits(6)
    ///     .log2_row_size(12)
    ///     .num_rows(5)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(sketch.num_registers(), 5 << 12);
    /// ```
    pub fn builder() -> CountMinSketchBuilder<P, H> {
        CountMinSketchBuilder::default()
    }
}

impl<P: UpdatePolicy, H: KeyHasher> CountMinSketch<P, H> {
    pub(super) fn from_parts(
        config: SketchConfig,
        conservative: bool,
        allow_deletion: bool,
        hasher: H,
    ) -> Result<Self, Error> {
        let registers =
            RegisterTable::new(config.register_bits(), P::SIGNED, config.num_registers())?;
        let layout = RowLayout::new(&config, P::SIGN_BITS, config.seed().wrapping_add(4));
        let indices = try_with_capacity("row indices", layout.num_rows())?;
        let policy_seed = config.seed().wrapping_add(
            u64::from(config.log2_row_size())
                * u64::from(config.register_bits())
                * u64::from(config.num_rows()),
        );

        debug!(
            policy = P::NAME,
            register_bits = config.register_bits(),
            log2_row_size = config.log2_row_size(),
            num_rows = config.num_rows(),
            seeds = layout.seeds().len(),
            rows_per_word = layout.rows_per_word(),
            conservative,
            allow_deletion,
            "created count-min sketch"
        );

        Ok(Self {
            config,
            layout,
            registers,
            policy: P::from_seed(policy_seed),
            hasher,
            conservative,
            allow_deletion,
            indices,
        })
    }

    /// Records one occurrence of `item` and returns its updated estimate.
    ///
    /// Registers that would leave their range keep their value.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// let mut sketch = CountMinSketch::<freqsketch::countmin::Increment>::builder()
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(sketch.add(42), 1);
    /// assert_eq!(sketch.add(42), 2);
    /// ```
    pub fn add(&mut self, item: u64) -> i64 {
        if self.conservative {
            self.add_conservative(item)
        } else {
            self.add_independent(item)
        }
    }

    fn add_independent(&mut self, item: u64) -> i64 {
        let Self {
            layout,
            registers,
            policy,
            hasher,
            ..
        } = self;
        let mut min = i64::MAX;
        layout.for_each_row_batched(hasher, item, |_, index, bits| {
            let current = registers.get(index);
            let sign = if P::SIGN_BITS > 0 { layout.sign(bits) } else { 1 };
            let next = policy.apply(current, sign);
            let value = if registers.try_set(index, next) {
                next
            } else {
                current
            };
            min = min.min(value);
        });
        P::to_estimate(min)
    }

    // Only the registers holding the row minimum move, and all of them move
    // to the same value.
    fn add_conservative(&mut self, item: u64) -> i64 {
        let Self {
            layout,
            registers,
            policy,
            hasher,
            indices,
            ..
        } = self;
        indices.clear();
        let mut min = i64::MAX;
        layout.for_each_row_batched(hasher, item, |_, index, _| {
            min = min.min(registers.get(index));
            indices.push(index);
        });

        let next = policy.apply(min, 1);
        if next != min && registers.range().contains(next) {
            for &index in indices.iter() {
                if registers.get(index) == min {
                    registers.try_set(index, next);
                }
            }
            min = next;
        }
        P::to_estimate(min)
    }

    /// Retracts one occurrence of `item` and returns the smallest decremented
    /// register.
    ///
    /// Registers already at zero stay at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnsupportedOperation`](crate::error::ErrorKind::UnsupportedOperation)
    /// unless the sketch was built with
    /// [`allow_deletion`](CountMinSketchBuilder::allow_deletion).
    pub fn subtract(&mut self, item: u64) -> Result<i64, Error> {
        if !self.allow_deletion {
            return Err(Error::unsupported(
                "subtract requires a sketch built with allow_deletion",
            )
            .with_context("policy", P::NAME)
            .with_context("conservative", self.conservative));
        }

        let Self {
            layout,
            registers,
            hasher,
            ..
        } = self;
        let mut min = i64::MAX;
        layout.for_each_row_batched(hasher, item, |_, index, _| {
            let current = registers.get(index);
            let next = current - 1;
            let value = if registers.try_set(index, next) {
                next
            } else {
                current
            };
            min = min.min(value);
        });
        Ok(P::to_estimate(min))
    }

    /// Returns the estimated frequency of `item`: the smallest of its
    /// registers, converted by the policy.
    pub fn estimate(&self, item: u64) -> i64 {
        let mut min = i64::MAX;
        self.layout
            .for_each_row_batched(&self.hasher, item, |_, index, _| {
                min = min.min(self.registers.get(index));
            });
        P::to_estimate(min)
    }

    /// Estimates the L2 norm of the frequency vector as the median over rows
    /// of each row's Euclidean norm.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory)
    /// if the per-row buffer cannot be allocated.
    pub fn l2_norm_estimate(&self) -> Result<f64, Error> {
        l2_norm_estimate(self.layout.num_rows(), self.layout.row_size(), |index| {
            self.registers.get(index)
        })
    }

    fn check_compatible(&self, other: &Self, operation: &'static str) -> Result<(), Error> {
        if self.config.register_bits() != other.config.register_bits()
            || self.config.log2_row_size() != other.config.log2_row_size()
            || self.config.num_rows() != other.config.num_rows()
        {
            return Err(Error::incompatible("sketch dimensions differ")
                .with_context("operation", operation)
                .with_context(
                    "left",
                    format!(
                        "W={} L={} H={}",
                        self.config.register_bits(),
                        self.config.log2_row_size(),
                        self.config.num_rows()
                    ),
                )
                .with_context(
                    "right",
                    format!(
                        "W={} L={} H={}",
                        other.config.register_bits(),
                        other.config.log2_row_size(),
                        other.config.num_rows()
                    ),
                ));
        }
        if self.layout.seeds() != other.layout.seeds() {
            return Err(Error::incompatible("seed sets differ")
                .with_context("operation", operation)
                .with_context("left_seed", self.config.seed())
                .with_context("right_seed", other.config.seed()));
        }
        if self.hasher != other.hasher {
            return Err(
                Error::incompatible("hashers differ").with_context("operation", operation)
            );
        }
        Ok(())
    }

    /// Adds the counts of `other` into this sketch, register by register,
    /// using the policy's combine rule.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`](crate::error::ErrorKind::IncompatibleSketch)
    /// if the dimensions, seed sets or hashers differ.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// # use freqsketch::countmin::Increment;
    /// let mut left = CountMinSketch::<Increment>::builder().seed(9).build().unwrap();
    /// let mut right = CountMinSketch::<Increment>::builder().seed(9).build().unwrap();
    /// left.add(1);
    /// right.add(1);
    /// right.add(2);
    ///
    /// left.merge_in_place(&right).unwrap();
    /// assert_eq!(left.estimate(1), 2);
    /// assert_eq!(left.estimate(2), 1);
    /// ```
    pub fn merge_in_place(&mut self, other: &Self) -> Result<(), Error> {
        self.check_compatible(other, "merge")?;
        if P::SIGNED {
            warn!(
                policy = P::NAME,
                "merging signed count-min registers by summation; the rule is unvalidated"
            );
        }
        for index in 0..self.registers.len() {
            let combined = P::combine(self.registers.get(index), other.registers.get(index));
            self.registers.set_clamped(index, combined);
        }
        Ok(())
    }

    /// Returns the merge of this sketch and `other`, leaving both unchanged.
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

    /// Keeps, for every register, the smaller of the two sketches' values.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`](crate::error::ErrorKind::IncompatibleSketch)
    /// if the dimensions, seed sets or hashers differ.
    pub fn intersect_in_place(&mut self, other: &Self) -> Result<(), Error> {
        self.check_compatible(other, "intersect")?;
        for index in 0..self.registers.len() {
            let value = self.registers.get(index).min(other.registers.get(index));
            self.registers.set_clamped(index, value);
        }
        Ok(())
    }

    /// Returns the intersection of this sketch and `other`.
    ///
    /// # Errors
    ///
    /// Same as [`intersect_in_place`](Self::intersect_in_place).
    pub fn intersect(&self, other: &Self) -> Result<Self, Error>
    where
        H: Clone,
    {
        let mut intersected = self.clone();
        intersected.intersect_in_place(other)?;
        Ok(intersected)
    }

    /// Resets every register to zero. Seeds and settings are kept.
    pub fn clear(&mut self) {
        self.registers.zero_all();
    }

    /// Calls `f(index, value)` for every register in index order.
    pub fn for_each_register(&self, mut f: impl FnMut(usize, i64)) {
        for (index, value) in self.registers.values().enumerate() {
            f(index, value);
        }
    }

    /// Flat register index of `item` in `row`, computed with one scalar hash.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not below the number of rows.
    pub fn row_index(&self, item: u64, row: usize) -> usize {
        assert!(
            row < self.layout.num_rows(),
            "row must be below {}, got {row}",
            self.layout.num_rows()
        );
        self.layout.row_index(&self.hasher, item, row)
    }

    /// Returns the seed set that, together with the dimensions, decides merge
    /// compatibility.
    pub fn seeds(&self) -> &[u64] {
        self.layout.seeds()
    }

    /// Returns the dimensions this sketch was built with.
    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    /// Returns the total number of registers, `H * 2^L`.
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Whether updates are conservative.
    pub fn is_conservative(&self) -> bool {
        self.conservative
    }

    /// Whether [`subtract`](Self::subtract) is available.
    pub fn supports_deletion(&self) -> bool {
        self.allow_deletion
    }

    /// Returns `(struct_bytes, data_bytes)`: the inline size of the sketch and
    /// the heap bytes held by its seeds and registers.
    pub fn memory_usage(&self) -> (usize, usize) {
        (
            size_of::<Self>(),
            size_of_val(self.layout.seeds()) + self.registers.byte_size(),
        )
    }
}
