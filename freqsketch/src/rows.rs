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

//! Row index derivation.
//!
//! One 64-bit hash is split into `rows_per_word` fields of `stride` bits, each
//! field addressing one row: the low `log2_row_size` bits pick the column and,
//! for signed sketches, the next bit picks the sign. Rows are filled in groups
//! of `rows_per_word`. Group 0 hashes the item itself, group `g` hashes
//! `item ^ seeds[g - 1]`.
//!
//! The batched paths hash [`LANES`] seeds (or items) per call and must yield
//! the same indices as the scalar path.

use crate::common::random::XorShift64;
use crate::config::SketchConfig;
use crate::hash::KeyHasher;
use crate::hash::LANES;

const WORD_BITS: u32 = u64::BITS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowLayout {
    log2_row_size: u32,
    stride: u32,
    rows_per_word: usize,
    num_rows: usize,
    mask: u64,
    seeds: Vec<u64>,
}

impl RowLayout {
    /// Lays out the rows of a validated `config`, reserving `sign_bits` hash
    /// bits per row after the column bits.
    pub(crate) fn new(config: &SketchConfig, sign_bits: u32, seed: u64) -> Self {
        let log2_row_size = config.log2_row_size() as u32;
        let stride = log2_row_size + sign_bits;
        let rows_per_word = if stride == 0 {
            WORD_BITS as usize
        } else {
            (WORD_BITS / stride) as usize
        };
        let num_rows = config.num_rows() as usize;
        // smallest seed count with rows_per_word * (seeds + 1) >= num_rows,
        // padded so that batched reads stay inside the vector
        let needed = num_rows.div_ceil(rows_per_word) - 1;
        let seeds = XorShift64::seeded(seed).draw(needed.next_multiple_of(LANES));

        Self {
            log2_row_size,
            stride,
            rows_per_word,
            num_rows,
            mask: (1u64 << log2_row_size) - 1,
            seeds,
        }
    }

    pub(crate) fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    pub(crate) fn rows_per_word(&self) -> usize {
        self.rows_per_word
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub(crate) fn row_size(&self) -> usize {
        1 << self.log2_row_size
    }

    /// Number of hash words needed to cover every row.
    pub(crate) fn num_groups(&self) -> usize {
        self.num_rows.div_ceil(self.rows_per_word)
    }

    #[inline]
    fn group_word<H: KeyHasher>(&self, hasher: &H, item: u64, group: usize) -> u64 {
        if group == 0 {
            hasher.hash(item)
        } else {
            hasher.hash(item ^ self.seeds[group - 1])
        }
    }

    /// Splits the hash word of `group` into its rows.
    #[inline]
    fn emit(&self, word: u64, group: usize, f: &mut impl FnMut(usize, usize, u64)) {
        let first = group * self.rows_per_word;
        let count = self.rows_per_word.min(self.num_rows - first);
        for k in 0..count {
            let bits = word >> (k as u32 * self.stride);
            let row = first + k;
            let index = (row << self.log2_row_size) + (bits & self.mask) as usize;
            f(row, index, bits);
        }
    }

    /// Flat register index of `item` in `row`.
    pub(crate) fn row_index<H: KeyHasher>(&self, hasher: &H, item: u64, row: usize) -> usize {
        debug_assert!(row < self.num_rows);
        let group = row / self.rows_per_word;
        let k = (row % self.rows_per_word) as u32;
        let bits = self.group_word(hasher, item, group) >> (k * self.stride);
        (row << self.log2_row_size) + (bits & self.mask) as usize
    }

    /// Sign carried by the field `bits`: bit `log2_row_size` set means `+1`.
    #[inline]
    pub(crate) fn sign(&self, bits: u64) -> i64 {
        if (bits >> self.log2_row_size) & 1 == 1 {
            1
        } else {
            -1
        }
    }

    /// Calls `f(row, flat_index, field_bits)` for every row, in row order,
    /// one scalar hash per group.
    #[cfg(test)]
    pub(crate) fn for_each_row<H: KeyHasher>(
        &self,
        hasher: &H,
        item: u64,
        mut f: impl FnMut(usize, usize, u64),
    ) {
        for group in 0..self.num_groups() {
            let word = self.group_word(hasher, item, group);
            self.emit(word, group, &mut f);
        }
    }

    /// Same visit as [`for_each_row`](Self::for_each_row), hashing the seeded
    /// groups [`LANES`] at a time.
    pub(crate) fn for_each_row_batched<H: KeyHasher>(
        &self,
        hasher: &H,
        item: u64,
        mut f: impl FnMut(usize, usize, u64),
    ) {
        let groups = self.num_groups();
        self.emit(hasher.hash(item), 0, &mut f);

        for (chunk_index, chunk) in self.seeds.chunks_exact(LANES).enumerate() {
            let first_group = 1 + chunk_index * LANES;
            if first_group >= groups {
                break;
            }
            let keys = std::array::from_fn(|lane| item ^ chunk[lane]);
            let words = hasher.hash_batch(keys);
            for (lane, &word) in words.iter().enumerate() {
                let group = first_group + lane;
                if group >= groups {
                    break;
                }
                self.emit(word, group, &mut f);
            }
        }
    }

    /// Hashes [`LANES`] items at once, then calls `f(lane, row, flat_index,
    /// field_bits)` lane by lane, each lane in row order. `words` must hold
    /// [`num_groups`](Self::num_groups) entries.
    pub(crate) fn for_each_lane_row<H: KeyHasher>(
        &self,
        hasher: &H,
        items: [u64; LANES],
        words: &mut [[u64; LANES]],
        mut f: impl FnMut(usize, usize, usize, u64),
    ) {
        debug_assert_eq!(words.len(), self.num_groups());
        for (group, slot) in words.iter_mut().enumerate() {
            *slot = if group == 0 {
                hasher.hash_batch(items)
            } else {
                let seed = self.seeds[group - 1];
                hasher.hash_batch(items.map(|item| item ^ seed))
            };
        }
        for lane in 0..LANES {
            for (group, slot) in words.iter().enumerate() {
                self.emit(slot[lane], group, &mut |row, index, bits| {
                    f(lane, row, index, bits)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::MurFinHash;
    use crate::hash::WangHash;

    fn collect_scalar<H: KeyHasher>(layout: &RowLayout, hasher: &H, item: u64) -> Vec<(usize, usize, u64)> {
        let mut out = vec![];
        layout.for_each_row(hasher, item, |row, index, bits| out.push((row, index, bits)));
        out
    }

    fn collect_batched<H: KeyHasher>(layout: &RowLayout, hasher: &H, item: u64) -> Vec<(usize, usize, u64)> {
        let mut out = vec![];
        layout.for_each_row_batched(hasher, item, |row, index, bits| out.push((row, index, bits)));
        out
    }

    #[test]
    fn test_seed_count_is_minimal_and_padded() {
        // 64 / 10 = 6 rows per word: 4 rows need no seed at all
        let layout = RowLayout::new(&SketchConfig::new(8, 10, 4, 0), 0, 0);
        assert_eq!(layout.rows_per_word(), 6);
        assert_eq!(layout.seeds().len(), 0);

        // 20 rows need 4 groups, so 3 seeds, padded to 4
        let layout = RowLayout::new(&SketchConfig::new(8, 10, 20, 0), 0, 0);
        assert_eq!(layout.num_groups(), 4);
        assert_eq!(layout.seeds().len(), 4);

        // sign bit shrinks rows per word: 64 / 11 = 5
        let layout = RowLayout::new(&SketchConfig::new(8, 10, 30, 0), 1, 0);
        assert_eq!(layout.rows_per_word(), 5);
        assert_eq!(layout.seeds().len(), 8);
    }

    #[test]
    fn test_scalar_and_batched_agree() {
        for (log2, rows, sign_bits) in [(10, 4, 0), (10, 40, 0), (16, 23, 1), (0, 9, 0), (32, 11, 1), (5, 64, 1)] {
            let layout = RowLayout::new(&SketchConfig::new(16, log2, rows, 0), sign_bits, 99);
            for item in [0u64, 1, 42, 7, u64::MAX, 0xdead_beef] {
                let scalar = collect_scalar(&layout, &WangHash, item);
                assert_eq!(scalar.len(), rows as usize);
                assert_eq!(scalar, collect_batched(&layout, &WangHash, item));
                assert_eq!(scalar, collect_scalar(&layout.clone(), &WangHash, item));
                for &(row, index, _) in &scalar {
                    assert_eq!(layout.row_index(&WangHash, item, row), index);
                    assert!(index >= row << log2 && index < (row + 1) << log2);
                }
            }
        }
    }

    #[test]
    fn test_lane_rows_match_scalar() {
        let layout = RowLayout::new(&SketchConfig::new(16, 12, 13, 0), 1, 5);
        let items = [3u64, 1 << 40, 77, 3];
        let mut words = vec![[0u64; LANES]; layout.num_groups()];
        let mut per_lane = vec![vec![]; LANES];
        layout.for_each_lane_row(&MurFinHash, items, &mut words, |lane, row, index, bits| {
            per_lane[lane].push((row, index, bits));
        });
        for (lane, &item) in items.iter().enumerate() {
            assert_eq!(per_lane[lane], collect_scalar(&layout, &MurFinHash, item));
        }
    }

    #[test]
    fn test_sign_reads_bit_after_column() {
        let layout = RowLayout::new(&SketchConfig::new(16, 4, 1, 0), 1, 0);
        assert_eq!(layout.sign(0b1_0000), 1);
        assert_eq!(layout.sign(0b0_1111), -1);
    }
}
