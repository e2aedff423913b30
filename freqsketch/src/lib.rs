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

//! # freqsketch
//!
//! Fixed-memory frequency sketches for high-volume streams of 64-bit keys.
//!
//! - [`countmin`]: Count-Min sketch with saturating, signed or power-of-two
//!   update policies, conservative update and deletions.
//! - [`countsketch`]: Count-Sketch in a seed-chunked and a 4-wise independent
//!   variant.
//! - [`window`]: frequency estimates over the last `N` items.
//!
//! All sketches are single-owner and unsynchronized. To use several threads,
//! sketch each shard separately and merge the results.
//!
//! Arbitrary items are mapped to keys with [`hash::hash_item`].

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod config;
pub mod countmin;
pub mod countsketch;
pub mod error;
pub mod hash;
pub mod register;
pub mod window;

mod rows;
