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

//! Common utilities shared by the sketch families.

pub mod random;

use crate::error::Error;

/// Allocates an empty vector able to hold `len` elements, reporting
/// allocation failure instead of aborting.
pub(crate) fn try_with_capacity<T>(what: &'static str, len: usize) -> Result<Vec<T>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|err| Error::out_of_memory(what, len, err))?;
    Ok(buf)
}

/// Allocates a vector of `len` copies of `fill`.
pub(crate) fn try_filled<T: Clone>(what: &'static str, len: usize, fill: T) -> Result<Vec<T>, Error> {
    let mut buf = try_with_capacity(what, len)?;
    buf.resize(len, fill);
    Ok(buf)
}

/// Sorts `values` and averages the two middle elements.
///
/// For an odd length both picks are the same element.
pub(crate) fn median_f64(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    (values[n >> 1] + values[(n - 1) >> 1]) * 0.5
}

/// Integer counterpart of [`median_f64`]; the average rounds toward negative
/// infinity.
pub(crate) fn median_i64(values: &mut [i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let n = values.len();
    (values[n >> 1] + values[(n - 1) >> 1]) >> 1
}

/// Median over rows of the per-row Euclidean norm of the register values.
pub(crate) fn l2_norm_estimate(
    num_rows: usize,
    row_len: usize,
    value_at: impl Fn(usize) -> i64,
) -> Result<f64, Error> {
    let mut norms = try_with_capacity::<f64>("row norms", num_rows)?;
    for row in 0..num_rows {
        let start = row * row_len;
        let sum_of_squares: f64 = (start..start + row_len)
            .map(|index| {
                let value = value_at(index) as f64;
                value * value
            })
            .sum();
        norms.push(sum_of_squares.sqrt());
    }
    Ok(median_f64(&mut norms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median_i64(&mut [5, 1, 3]), 3);
        assert_eq!(median_i64(&mut [4, 1, 3, 2]), 2);
        assert_eq!(median_i64(&mut [-3, -2]), -3);
        assert_eq!(median_f64(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median_f64(&mut [7.0]), 7.0);
    }

    #[test]
    fn test_l2_norm_estimate_takes_row_median() {
        // rows: [3, 4] -> 5, [0, 0] -> 0, [6, 8] -> 10
        let values = [3i64, 4, 0, 0, 6, 8];
        let est = l2_norm_estimate(3, 2, |i| values[i]).unwrap();
        assert_eq!(est, 5.0);
    }

    #[test]
    fn test_try_filled() {
        let buf = try_filled("test", 3, 7u8).unwrap();
        assert_eq!(buf, vec![7, 7, 7]);
    }
}
