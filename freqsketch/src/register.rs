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

//! Bit-packed register storage.
//!
//! [`RegisterArray`] stores `len` unsigned integers of an arbitrary width
//! between 1 and 64 bits back to back in 64-bit words; a register may straddle
//! two words. [`RegisterTable`] layers a value interpretation on top of it
//! (unsigned or two's complement) together with the saturation bounds that
//! every write is checked against.

use crate::common::try_filled;
use crate::error::Error;

const WORD_BITS: usize = 64;

/// Fixed-width integer array packed into 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterArray {
    width: u8,
    len: usize,
    words: Box<[u64]>,
}

impl RegisterArray {
    /// Creates an array of `len` zeroed registers of `width` bits each.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `width` is not in `1..=64` or the bit length overflows, and
    /// [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory) if the
    /// words cannot be allocated.
    pub fn new(width: u8, len: usize) -> Result<Self, Error> {
        if width == 0 || width as usize > WORD_BITS {
            return Err(Error::config_invalid("register width must be in 1..=64")
                .with_context("width", width));
        }
        let total_bits = len.checked_mul(width as usize).ok_or_else(|| {
            Error::config_invalid("register array too large")
                .with_context("width", width)
                .with_context("len", len)
        })?;
        let words = try_filled("registers", total_bits.div_ceil(WORD_BITS), 0u64)?;
        Ok(Self {
            width,
            len,
            words: words.into_boxed_slice(),
        })
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.width as usize == WORD_BITS {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Returns the raw bits stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        assert!(index < self.len, "register index {index} out of range");
        let bit = index * self.width as usize;
        let word = bit / WORD_BITS;
        let shift = bit % WORD_BITS;
        let low = self.words[word] >> shift;
        if shift + self.width as usize <= WORD_BITS {
            low & self.mask()
        } else {
            // spills into the next word
            (low | (self.words[word + 1] << (WORD_BITS - shift))) & self.mask()
        }
    }

    /// Stores the low `width` bits of `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        assert!(index < self.len, "register index {index} out of range");
        let mask = self.mask();
        let value = value & mask;
        let bit = index * self.width as usize;
        let word = bit / WORD_BITS;
        let shift = bit % WORD_BITS;

        self.words[word] = (self.words[word] & !(mask << shift)) | (value << shift);

        let end = shift + self.width as usize;
        if end > WORD_BITS {
            let spill = end - WORD_BITS;
            let spill_mask = (1u64 << spill) - 1;
            self.words[word + 1] =
                (self.words[word + 1] & !spill_mask) | (value >> (WORD_BITS - shift));
        }
    }

    /// Returns the number of registers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array holds no registers.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the width of each register in bits.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Returns the number of bytes backing the registers.
    pub fn byte_size(&self) -> usize {
        self.words.len() * size_of::<u64>()
    }

    /// Resets every register to zero.
    pub fn zero_all(&mut self) {
        self.words.fill(0);
    }
}

/// Inclusive range of values a register can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    width: u8,
    signed: bool,
    min: i64,
    max: i64,
}

impl RegisterRange {
    /// Range of a `width`-bit register; `width` must be in `1..=63`.
    pub fn new(width: u8, signed: bool) -> Self {
        debug_assert!((1..64).contains(&width));
        let (min, max) = if signed {
            let half = 1i64 << (width - 1);
            (-half, half - 1)
        } else {
            (0, (1i64 << width) - 1)
        };
        Self {
            width,
            signed,
            min,
            max,
        }
    }

    /// Smallest representable value.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest representable value.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Whether registers are interpreted as two's complement.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Returns true if `value` can be stored without saturating.
    #[inline]
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamps `value` into the range.
    #[inline]
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    fn decode(&self, raw: u64) -> i64 {
        if self.signed {
            let unused = 64 - self.width as u32;
            ((raw << unused) as i64) >> unused
        } else {
            raw as i64
        }
    }

    #[inline]
    fn encode(&self, value: i64) -> u64 {
        value as u64
    }
}

/// Register array interpreted through a [`RegisterRange`].
///
/// Every write goes through [`RegisterTable::try_set`], which refuses values
/// outside the range before touching the packed bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTable {
    array: RegisterArray,
    range: RegisterRange,
}

impl RegisterTable {
    pub(crate) fn new(width: u8, signed: bool, len: usize) -> Result<Self, Error> {
        Ok(Self {
            array: RegisterArray::new(width, len)?,
            range: RegisterRange::new(width, signed),
        })
    }

    /// Returns the value stored at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> i64 {
        self.range.decode(self.array.get(index))
    }

    /// Stores `value` at `index` if it is within range; returns whether the
    /// write happened.
    #[inline]
    pub fn try_set(&mut self, index: usize, value: i64) -> bool {
        if !self.range.contains(value) {
            return false;
        }
        self.array.set(index, self.range.encode(value));
        true
    }

    /// Stores `value` clamped into range.
    #[inline]
    pub fn set_clamped(&mut self, index: usize, value: i64) {
        let value = self.range.clamp(value);
        self.array.set(index, self.range.encode(value));
    }

    /// Returns the saturation bounds.
    pub fn range(&self) -> RegisterRange {
        self.range
    }

    /// Returns the number of registers.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns true if the table holds no registers.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Returns the number of bytes backing the registers.
    pub fn byte_size(&self) -> usize {
        self.array.byte_size()
    }

    /// Resets every register to zero.
    pub fn zero_all(&mut self) {
        self.array.zero_all();
    }

    /// Visits every register value in index order.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rejects_bad_width() {
        assert_eq!(
            RegisterArray::new(0, 8).unwrap_err().kind(),
            ErrorKind::ConfigInvalid
        );
        assert_eq!(
            RegisterArray::new(65, 8).unwrap_err().kind(),
            ErrorKind::ConfigInvalid
        );
    }

    #[test]
    fn test_straddling_registers_keep_neighbours() {
        // 7-bit registers cross word boundaries at indices 9, 18, ...
        let mut array = RegisterArray::new(7, 40).unwrap();
        for i in 0..40 {
            array.set(i, (i as u64 * 37) & 0x7f);
        }
        for i in 0..40 {
            assert_eq!(array.get(i), (i as u64 * 37) & 0x7f, "index {i}");
        }
        array.set(9, 0x7f);
        assert_eq!(array.get(8), (8 * 37) & 0x7f);
        assert_eq!(array.get(10), (10 * 37) & 0x7f);
        assert_eq!(array.get(9), 0x7f);
    }

    #[test]
    fn test_set_truncates_to_width() {
        let mut array = RegisterArray::new(3, 4).unwrap();
        array.set(1, 0xff);
        assert_eq!(array.get(1), 7);
        assert_eq!(array.get(0), 0);
        assert_eq!(array.get(2), 0);
    }

    #[test]
    fn test_full_width_registers() {
        let mut array = RegisterArray::new(64, 3).unwrap();
        array.set(1, u64::MAX);
        assert_eq!(array.get(1), u64::MAX);
        assert_eq!(array.get(0), 0);
        assert_eq!(array.byte_size(), 24);
    }

    #[test]
    fn test_zero_all() {
        let mut array = RegisterArray::new(5, 100).unwrap();
        array.set(99, 31);
        array.zero_all();
        assert_eq!(array.get(99), 0);
        assert_eq!(array.len(), 100);
    }

    #[test]
    fn test_signed_table_round_trip_and_saturation() {
        let mut table = RegisterTable::new(4, true, 8).unwrap();
        assert_eq!(table.range().min(), -8);
        assert_eq!(table.range().max(), 7);

        assert!(table.try_set(3, -8));
        assert_eq!(table.get(3), -8);
        assert!(!table.try_set(3, -9));
        assert_eq!(table.get(3), -8);
        assert!(!table.try_set(4, 8));
        assert_eq!(table.get(4), 0);

        table.set_clamped(5, 100);
        assert_eq!(table.get(5), 7);
        assert_eq!(table.get(2), 0);
    }

    #[test]
    fn test_unsigned_table_bounds() {
        let mut table = RegisterTable::new(8, false, 2).unwrap();
        assert!(table.try_set(0, 255));
        assert!(!table.try_set(0, 256));
        assert!(!table.try_set(1, -1));
        assert_eq!(table.get(0), 255);
        assert_eq!(table.values().collect::<Vec<_>>(), vec![255, 0]);
    }
}
