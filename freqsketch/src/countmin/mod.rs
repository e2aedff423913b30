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

//! Count-Min sketch with pluggable update policies.
//!
//! The sketch keeps `H` rows of `2^L` bit-packed registers. Each item maps to
//! one register per row and its frequency estimate is the smallest of them.
//! The [`UpdatePolicy`] decides how registers move:
//!
//! - [`Increment`]: saturating `+1`. Supports conservative update (the default,
//!   only the minimal registers move) and, with conservative update off,
//!   deletions.
//! - [`SignedIncrement`]: adds a per-row `±1` sign taken from the hash.
//! - [`PowerOfTwo`]: randomized logarithmic counter; a register value `v`
//!   estimates `2^(v-1)` occurrences.
//!
//! # Usage
//!
//! ```rust
//! use freqsketch::countmin::CountMinSketch;
//! use freqsketch::countmin::Increment;
//! use freqsketch::hash::hash_item;
//!
//! let mut sketch = CountMinSketch::<Increment>::builder()
//!     .register_bits(8)
//!     .log2_row_size(10)
//!     .num_rows(4)
//!     .build()
//!     .unwrap();
//!
//! let apple = hash_item("apple");
//! for _ in 0..5 {
//!     sketch.add(apple);
//! }
//! assert_eq!(sketch.estimate(apple), 5);
//! ```
//!
//! # Merging
//!
//! Sketches built with the same dimensions and seed can be merged, so partial
//! sketches computed per shard combine into one.
//!
//! ```rust
//! # use freqsketch::countmin::CountMinSketch;
//! # use freqsketch::countmin::Increment;
//! let build = || {
//!     CountMinSketch::<Increment>::builder()
//!         .conservative_update(false)
//!         .seed(7)
//!         .build()
//!         .unwrap()
//! };
//! let mut shard_a = build();
//! let mut shard_b = build();
//! shard_a.add(1);
//! shard_b.add(1);
//!
//! let total = shard_a.merge(&shard_b).unwrap();
//! assert_eq!(total.estimate(1), 2);
//! ```

mod builder;
mod policy;
mod sketch;

pub use self::builder::CountMinSketchBuilder;
pub use self::policy::Increment;
pub use self::policy::PowerOfTwo;
pub use self::policy::SignedIncrement;
pub use self::policy::UpdatePolicy;
pub use self::sketch::CountMinSketch;
