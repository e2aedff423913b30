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

use freqsketch::countsketch::CountSketch;
use freqsketch::countsketch::CountSketch4Wise;
use freqsketch::error::ErrorKind;
use freqsketch::hash::Murmur3Hasher;
use freqsketch::hash::WangHash;

const HEAVY: u64 = 7;
const HEAVY_COUNT: i64 = 50;

fn noise(trial: u64) -> impl Iterator<Item = u64> {
    (0..300u64).map(move |i| 1_000 + trial * 300 + i)
}

const TRIALS: u64 = 200;
// odd row counts: the median is a single vote, so it carries no rounding bias
const ROW_COUNTS: [u32; 3] = [3, 9, 21];
// mean of TRIALS estimates; a single estimate has a spread of a few units
const MEAN_TOLERANCE: f64 = 1.0;

/// Returns the mean estimate and the mean absolute error of `estimates`.
fn summarize(estimates: &[i64]) -> (f64, f64) {
    let n = estimates.len() as f64;
    let mean = estimates.iter().sum::<i64>() as f64 / n;
    let spread = estimates
        .iter()
        .map(|&e| (e - HEAVY_COUNT).abs() as f64)
        .sum::<f64>()
        / n;
    (mean, spread)
}

fn assert_converges(spreads: &[(u32, f64, f64)]) {
    for &(num_rows, mean, _) in spreads {
        assert!(
            (mean - HEAVY_COUNT as f64).abs() <= MEAN_TOLERANCE,
            "mean {mean} with {num_rows} rows"
        );
    }
    let (_, _, fewest) = spreads[0];
    let (_, _, most) = spreads[spreads.len() - 1];
    assert!(most <= fewest, "spread grew from {fewest} to {most}");
}

#[test]
fn chunked_estimates_converge_as_rows_increase() {
    let mut spreads = vec![];
    for num_rows in ROW_COUNTS {
        let mut estimates = vec![];
        for trial in 0..TRIALS {
            let mut sketch = CountSketch::<Murmur3Hasher>::builder()
                .log2_row_size(6)
                .num_rows(num_rows)
                .seed(trial)
                .hasher(Murmur3Hasher::with_seed(trial as u32))
                .build()
                .unwrap();
            // 7-bit fields fit 9 rows per hash word
            assert_eq!(sketch.seeds().is_empty(), num_rows <= 9);
            for _ in 0..HEAVY_COUNT {
                sketch.add(HEAVY);
            }
            for item in noise(trial) {
                sketch.add(item);
            }
            estimates.push(sketch.estimate(HEAVY).unwrap());
        }
        let (mean, spread) = summarize(&estimates);
        spreads.push((num_rows, mean, spread));
    }
    assert_converges(&spreads);
}

#[test]
fn four_wise_estimates_converge_as_rows_increase() {
    let mut spreads = vec![];
    for num_rows in ROW_COUNTS {
        let mut estimates = vec![];
        for trial in 0..TRIALS {
            let mut sketch = CountSketch4Wise::builder()
                .log2_row_size(6)
                .num_rows(num_rows)
                .seed(trial)
                .build()
                .unwrap();
            for _ in 0..HEAVY_COUNT {
                sketch.add(HEAVY);
            }
            for item in noise(trial) {
                sketch.add(item);
            }
            estimates.push(sketch.estimate(HEAVY).unwrap());
        }
        let (mean, spread) = summarize(&estimates);
        spreads.push((num_rows, mean, spread));
    }
    assert_converges(&spreads);
}

#[test]
fn base_seed_matters_once_rows_need_seeds() {
    let build = |num_rows, seed| {
        CountSketch::<WangHash>::builder()
            .log2_row_size(6)
            .num_rows(num_rows)
            .seed(seed)
            .build()
            .unwrap()
    };
    // 9 rows fit in one hash word: the seed is unused
    assert!(build(9, 1).seeds().is_empty());
    let mut few = build(9, 1);
    few.add(5);
    few.merge_in_place(&build(9, 999)).unwrap();
    assert_eq!(few.estimate(5).unwrap(), 1);

    let wide = build(21, 1);
    assert_ne!(wide.seeds(), build(21, 999).seeds());
}

#[test]
fn subtract_cancels_add() {
    let mut sketch = CountSketch::<WangHash>::builder()
        .register_bits(8)
        .log2_row_size(5)
        .num_rows(20)
        .build()
        .unwrap();
    for item in 0..100 {
        sketch.add(item);
    }
    for item in 0..100 {
        sketch.subtract(item);
    }
    sketch.for_each_register(|_, value| assert_eq!(value, 0));
    assert_eq!(sketch.l2_norm_estimate().unwrap(), 0.0);
}

#[test]
fn batched_updates_match_scalar_updates() {
    let build = || {
        CountSketch::<WangHash>::builder()
            .register_bits(12)
            .log2_row_size(7)
            .num_rows(31)
            .build()
            .unwrap()
    };
    let mut batched = build();
    let mut scalar = build();
    for chunk in 0..50u64 {
        let items = [chunk, chunk * 3, chunk ^ 0xff, 42];
        batched.add_batch(items);
        for item in items {
            scalar.add(item);
        }
        if chunk % 5 == 0 {
            batched.subtract_batch(items);
            for item in items {
                scalar.subtract(item);
            }
        }
    }
    let mut left = vec![];
    let mut right = vec![];
    batched.for_each_register(|_, v| left.push(v));
    scalar.for_each_register(|_, v| right.push(v));
    assert_eq!(left, right);
    assert_eq!(batched.estimate(42).unwrap(), scalar.estimate(42).unwrap());
}

#[test]
fn merge_sums_shards() {
    let build = || CountSketch::<WangHash>::builder().num_rows(9).build().unwrap();
    let mut left = build();
    let mut right = build();
    let mut whole = build();
    for item in 0..400u64 {
        let key = item % 37;
        if item % 2 == 0 {
            left.add(key);
        } else {
            right.add(key);
        }
        whole.add(key);
    }
    let merged = left.merge(&right).unwrap();
    for key in 0..37 {
        assert_eq!(merged.estimate(key).unwrap(), whole.estimate(key).unwrap());
    }
}

#[test]
fn merge_rejects_mismatched_sketches() {
    let mut left = CountSketch::<WangHash>::builder().num_rows(9).seed(1).build().unwrap();
    let other_seed = CountSketch::<WangHash>::builder().num_rows(9).seed(2).build().unwrap();
    let other_shape = CountSketch::<WangHash>::builder().num_rows(8).seed(1).build().unwrap();
    assert_eq!(
        left.merge_in_place(&other_seed).unwrap_err().kind(),
        ErrorKind::IncompatibleSketch
    );
    assert_eq!(
        left.merge_in_place(&other_shape).unwrap_err().kind(),
        ErrorKind::IncompatibleSketch
    );

    let mut seeded = CountSketch::<Murmur3Hasher>::builder()
        .hasher(Murmur3Hasher::with_seed(1))
        .build()
        .unwrap();
    let other_hasher = CountSketch::<Murmur3Hasher>::builder()
        .hasher(Murmur3Hasher::with_seed(2))
        .build()
        .unwrap();
    assert_eq!(seeded.seeds(), other_hasher.seeds());
    assert_eq!(
        seeded.merge_in_place(&other_hasher).unwrap_err().kind(),
        ErrorKind::IncompatibleSketch
    );

    let mut four_wise = CountSketch4Wise::builder().log2_row_size(8).build().unwrap();
    let narrower = CountSketch4Wise::builder().log2_row_size(7).build().unwrap();
    assert_eq!(
        four_wise.merge_in_place(&narrower).unwrap_err().kind(),
        ErrorKind::IncompatibleSketch
    );
}

#[test]
fn rejects_one_bit_registers() {
    let err = CountSketch::<WangHash>::builder()
        .register_bits(1)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    let err = CountSketch4Wise::builder().num_rows(0).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn memory_usage_reports_register_bytes() {
    let sketch = CountSketch4Wise::builder()
        .register_bits(16)
        .log2_row_size(4)
        .num_rows(2)
        .build()
        .unwrap();
    let (struct_bytes, data_bytes) = sketch.memory_usage();
    assert!(struct_bytes > 0);
    // 32 registers of 16 bits plus two rows of coefficients
    assert_eq!(data_bytes, 64 + 2 * 32);
}
