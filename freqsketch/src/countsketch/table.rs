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

use crate::common::l2_norm_estimate;
use crate::common::try_with_capacity;
use crate::config::SketchConfig;
use crate::error::Error;
use crate::register::RegisterTable;

/// Signed register table shared by both Count-Sketch variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SignTable {
    config: SketchConfig,
    registers: RegisterTable,
}

impl SignTable {
    pub(super) fn new(config: SketchConfig) -> Result<Self, Error> {
        config.validate(true)?;
        let registers = RegisterTable::new(config.register_bits(), true, config.num_registers())?;
        Ok(Self { config, registers })
    }

    pub(super) fn config(&self) -> &SketchConfig {
        &self.config
    }

    /// Adds `sign * delta` to the register at `index` unless that leaves the
    /// range. Returns the register after the update, times `sign`.
    #[inline]
    pub(super) fn update(&mut self, index: usize, sign: i64, delta: i64) -> i64 {
        let current = self.registers.get(index);
        let next = current + sign * delta;
        if self.registers.try_set(index, next) {
            next * sign
        } else {
            current * sign
        }
    }

    /// Register at `index` times `sign`: the row's vote for the item.
    #[inline]
    pub(super) fn vote(&self, index: usize, sign: i64) -> i64 {
        self.registers.get(index) * sign
    }

    /// Buffer for one vote per row.
    pub(super) fn votes_buffer(&self) -> Result<Vec<i64>, Error> {
        try_with_capacity("row votes", self.config.num_rows() as usize)
    }

    pub(super) fn check_dimensions(&self, other: &Self) -> Result<(), Error> {
        let (a, b) = (&self.config, &other.config);
        if a.register_bits() != b.register_bits()
            || a.log2_row_size() != b.log2_row_size()
            || a.num_rows() != b.num_rows()
        {
            return Err(Error::incompatible("sketch dimensions differ")
                .with_context("left_num_rows", a.num_rows())
                .with_context("right_num_rows", b.num_rows())
                .with_context("left_log2_row_size", a.log2_row_size())
                .with_context("right_log2_row_size", b.log2_row_size()));
        }
        Ok(())
    }

    /// Sums `other` into this table, clamping each sum into range.
    pub(super) fn add_table(&mut self, other: &Self) {
        for index in 0..self.registers.len() {
            let sum = self.registers.get(index) + other.registers.get(index);
            self.registers.set_clamped(index, sum);
        }
    }

    pub(super) fn l2_norm_estimate(&self) -> Result<f64, Error> {
        l2_norm_estimate(
            self.config.num_rows() as usize,
            self.config.row_size(),
            |index| self.registers.get(index),
        )
    }

    pub(super) fn clear(&mut self) {
        self.registers.zero_all();
    }

    pub(super) fn for_each_register(&self, mut f: impl FnMut(usize, i64)) {
        for (index, value) in self.registers.values().enumerate() {
            f(index, value);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.registers.len()
    }

    pub(super) fn byte_size(&self) -> usize {
        self.registers.byte_size()
    }
}
