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

//! Count-Sketch: signed frequency sketches.
//!
//! Every row maps an item to a column and a sign. Updates add the sign to
//! the register; an estimate collects `register * sign` from every row and
//! returns the median. Collisions cancel out in expectation, so estimates are
//! unbiased but may be negative.
//!
//! Two variants share the register table:
//!
//! - [`CountSketch`] packs several rows into each seeded hash word and can
//!   update a batch of items at once.
//! - [`CountSketch4Wise`] evaluates a 4-wise independent polynomial hash per
//!   row.
//!
//! # Usage
//!
//! ```rust
//! use freqsketch::countsketch::CountSketch;
//! use freqsketch::hash::WangHash;
//!
//! let mut sketch = CountSketch::<WangHash>::builder()
//!     .log2_row_size(10)
//!     .num_rows(5)
//!     .build()
//!     .unwrap();
//! sketch.add_batch([1, 2, 1, 3]);
//! sketch.subtract(3);
//! assert_eq!(sketch.estimate(1).unwrap(), 2);
//! assert_eq!(sketch.estimate(3).unwrap(), 0);
//! ```

mod chunked;
mod four_wise;
mod table;

pub use self::chunked::CountSketch;
pub use self::chunked::CountSketchBuilder;
pub use self::four_wise::CountSketch4Wise;
pub use self::four_wise::CountSketch4WiseBuilder;

/// Default base seed of both variants.
pub const DEFAULT_SEED: u64 = 137;
