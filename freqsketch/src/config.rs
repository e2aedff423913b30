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

//! Sketch dimensions shared by every sketch family.

use crate::error::Error;

/// Default register width in bits.
pub const DEFAULT_REGISTER_BITS: u8 = 32;
/// Default log2 of the number of registers per row.
pub const DEFAULT_LOG2_ROW_SIZE: u8 = 10;
/// Default number of rows.
pub const DEFAULT_NUM_ROWS: u32 = 4;

/// Widest supported register.
pub const MAX_REGISTER_BITS: u8 = 32;
/// Largest supported log2 row size.
pub const MAX_LOG2_ROW_SIZE: u8 = 32;

/// Immutable shape of a sketch: register width `W`, log2 row size `L`,
/// row count `H` and the base seed.
///
/// Holds `H * 2^L` registers of `W` bits.
///
/// # Examples
///
/// ```
/// use freqsketch::config::SketchConfig;
///
/// let config = SketchConfig::new(8, 10, 4, 0);
/// assert!(config.validate(false).is_ok());
/// assert_eq!(config.num_registers(), 4 << 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SketchConfig {
    register_bits: u8,
    log2_row_size: u8,
    num_rows: u32,
    seed: u64,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            register_bits: DEFAULT_REGISTER_BITS,
            log2_row_size: DEFAULT_LOG2_ROW_SIZE,
            num_rows: DEFAULT_NUM_ROWS,
            seed: 0,
        }
    }
}

impl SketchConfig {
    /// Creates a configuration; call [`validate`](Self::validate) before use.
    pub fn new(register_bits: u8, log2_row_size: u8, num_rows: u32, seed: u64) -> Self {
        Self {
            register_bits,
            log2_row_size,
            num_rows,
            seed,
        }
    }

    pub(crate) fn set_register_bits(&mut self, register_bits: u8) {
        self.register_bits = register_bits;
    }

    pub(crate) fn set_log2_row_size(&mut self, log2_row_size: u8) {
        self.log2_row_size = log2_row_size;
    }

    pub(crate) fn set_num_rows(&mut self, num_rows: u32) {
        self.num_rows = num_rows;
    }

    pub(crate) fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Register width in bits.
    pub fn register_bits(&self) -> u8 {
        self.register_bits
    }

    /// Log2 of the number of registers per row.
    pub fn log2_row_size(&self) -> u8 {
        self.log2_row_size
    }

    /// Number of registers per row.
    pub fn row_size(&self) -> usize {
        1usize << self.log2_row_size
    }

    /// Number of rows.
    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    /// Base seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total number of registers, `H * 2^L`.
    ///
    /// Only meaningful once [`validate`](Self::validate) succeeded.
    pub fn num_registers(&self) -> usize {
        (self.num_rows as usize) << self.log2_row_size
    }

    /// Checks that the dimensions describe an allocatable sketch.
    ///
    /// `signed` registers need at least two bits.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// describing the first offending parameter.
    pub fn validate(&self, signed: bool) -> Result<(), Error> {
        let min_bits = if signed { 2 } else { 1 };
        if self.register_bits < min_bits || self.register_bits > MAX_REGISTER_BITS {
            return Err(Error::config_invalid(format!(
                "register_bits must be in {min_bits}..={MAX_REGISTER_BITS}"
            ))
            .with_context("register_bits", self.register_bits)
            .with_context("signed", signed));
        }
        if self.log2_row_size > MAX_LOG2_ROW_SIZE {
            return Err(Error::config_invalid(format!(
                "log2_row_size must not exceed {MAX_LOG2_ROW_SIZE}"
            ))
            .with_context("log2_row_size", self.log2_row_size));
        }
        if self.num_rows == 0 {
            return Err(Error::config_invalid("num_rows must be at least 1"));
        }
        let fits = 1usize
            .checked_shl(self.log2_row_size as u32)
            .and_then(|size| size.checked_mul(self.num_rows as usize));
        if fits.is_none() {
            return Err(Error::config_invalid("register table size overflows usize")
                .with_context("log2_row_size", self.log2_row_size)
                .with_context("num_rows", self.num_rows));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use googletest::assert_that;
    use googletest::prelude::contains_substring;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_is_valid() {
        assert!(SketchConfig::default().validate(true).is_ok());
        assert_eq!(SketchConfig::default().row_size(), 1024);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let err = SketchConfig::new(0, 10, 4, 0).validate(false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_that!(err.message(), contains_substring("register_bits"));

        let err = SketchConfig::new(33, 10, 4, 0).validate(false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = SketchConfig::new(1, 10, 4, 0).validate(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = SketchConfig::new(8, 33, 4, 0).validate(false).unwrap_err();
        assert_that!(err.message(), contains_substring("log2_row_size"));

        let err = SketchConfig::new(8, 10, 0, 0).validate(false).unwrap_err();
        assert_that!(err.message(), contains_substring("num_rows"));
    }

    #[test]
    fn test_zero_log2_row_size_is_allowed() {
        let config = SketchConfig::new(8, 0, 3, 0);
        assert!(config.validate(false).is_ok());
        assert_eq!(config.num_registers(), 3);
    }
}
