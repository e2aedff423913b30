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

//! Hash functions mapping 64-bit keys to 64-bit hash values.
//!
//! The sketches are generic over [`KeyHasher`]. Besides the scalar form, a
//! hasher exposes a batched form over [`LANES`] keys; row derivation uses it to
//! hash several seeded copies of an item at once. The batched form must return
//! exactly what `LANES` scalar calls would.

mod kwise;

use std::hash::Hash;

pub use self::kwise::KWiseHasherSet;
pub use self::kwise::MERSENNE_61;

/// Number of keys hashed together by [`KeyHasher::hash_batch`].
pub const LANES: usize = 4;

/// Seed used by [`hash_item`].
pub const DEFAULT_ITEM_SEED: u32 = 9001;

/// A deterministic mapping from 64-bit keys to 64-bit hashes.
///
/// Equal hashers must hash every key identically; sketches compare their
/// hashers before merging.
pub trait KeyHasher: PartialEq {
    /// Hashes a single key.
    fn hash(&self, key: u64) -> u64;

    /// Hashes [`LANES`] keys; bit-identical to hashing each key separately.
    #[inline]
    fn hash_batch(&self, keys: [u64; LANES]) -> [u64; LANES] {
        keys.map(|key| self.hash(key))
    }
}

/// Thomas Wang's 64-bit integer hash.
///
/// A bijection on `u64`, so distinct keys never collide before the row
/// masking step. [`WangHash::invert`] recovers the key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WangHash;

impl WangHash {
    /// Inverts [`KeyHasher::hash`] for this hasher.
    ///
    /// # Examples
    ///
    /// ```
    /// use freqsketch::hash::KeyHasher;
    /// use freqsketch::hash::WangHash;
    ///
    /// let h = WangHash.hash(1337);
    /// assert_eq!(WangHash::invert(h), 1337);
    /// ```
    pub fn invert(mut key: u64) -> u64 {
        // key = key + (key << 31)
        let mut tmp = key.wrapping_sub(key << 31);
        key = key.wrapping_sub(tmp << 31);
        // key = key ^ (key >> 28)
        tmp = key ^ (key >> 28);
        key ^= tmp >> 28;
        // key *= 21
        key = key.wrapping_mul(14933078535860113213);
        // key = key ^ (key >> 14)
        tmp = key ^ (key >> 14);
        tmp = key ^ (tmp >> 14);
        tmp = key ^ (tmp >> 14);
        key ^= tmp >> 14;
        // key *= 265
        key = key.wrapping_mul(15244667743933553977);
        // key = key ^ (key >> 24)
        tmp = key ^ (key >> 24);
        key ^= tmp >> 24;
        // key = (!key) + (key << 21)
        tmp = !key;
        tmp = !(key.wrapping_sub(tmp << 21));
        tmp = !(key.wrapping_sub(tmp << 21));
        !(key.wrapping_sub(tmp << 21))
    }
}

impl KeyHasher for WangHash {
    #[inline]
    fn hash(&self, mut key: u64) -> u64 {
        key = (!key).wrapping_add(key << 21);
        key ^= key >> 24;
        key = key.wrapping_add(key << 3).wrapping_add(key << 8);
        key ^= key >> 14;
        key = key.wrapping_add(key << 2).wrapping_add(key << 4);
        key ^= key >> 28;
        key.wrapping_add(key << 31)
    }

    // Same steps as `hash`, applied lane by lane so the loops vectorize.
    #[inline]
    fn hash_batch(&self, mut keys: [u64; LANES]) -> [u64; LANES] {
        for k in &mut keys {
            *k = (!*k).wrapping_add(*k << 21);
        }
        for k in &mut keys {
            *k ^= *k >> 24;
        }
        for k in &mut keys {
            *k = k.wrapping_add(*k << 3).wrapping_add(*k << 8);
        }
        for k in &mut keys {
            *k ^= *k >> 14;
        }
        for k in &mut keys {
            *k = k.wrapping_add(*k << 2).wrapping_add(*k << 4);
        }
        for k in &mut keys {
            *k ^= *k >> 28;
        }
        for k in &mut keys {
            *k = k.wrapping_add(*k << 31);
        }
        keys
    }
}

/// The MurmurHash3 64-bit finalizer (`fmix64`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MurFinHash;

const FMIX_C1: u64 = 0xff51afd7ed558ccd;
const FMIX_C2: u64 = 0xc4ceb9fe1a85ec53;

impl KeyHasher for MurFinHash {
    #[inline]
    fn hash(&self, mut key: u64) -> u64 {
        key ^= key >> 33;
        key = key.wrapping_mul(FMIX_C1);
        key ^= key >> 33;
        key = key.wrapping_mul(FMIX_C2);
        key ^ (key >> 33)
    }

    #[inline]
    fn hash_batch(&self, mut keys: [u64; LANES]) -> [u64; LANES] {
        for k in &mut keys {
            *k ^= *k >> 33;
            *k = k.wrapping_mul(FMIX_C1);
        }
        for k in &mut keys {
            *k ^= *k >> 33;
            *k = k.wrapping_mul(FMIX_C2);
        }
        for k in &mut keys {
            *k ^= *k >> 33;
        }
        keys
    }
}

/// Seeded MurmurHash3 x64/128 over the little-endian key bytes, keeping the
/// low 64 bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Murmur3Hasher {
    seed: u32,
}

impl Murmur3Hasher {
    /// Creates a hasher with the given seed.
    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }

    /// Returns the seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl KeyHasher for Murmur3Hasher {
    #[inline]
    fn hash(&self, key: u64) -> u64 {
        let (h1, _) = mur3::murmurhash3_x64_128(&key.to_le_bytes(), self.seed);
        h1
    }
}

/// Maps any hashable item to the 64-bit key the sketches consume.
///
/// # Examples
///
/// ```
/// use freqsketch::hash::hash_item;
///
/// assert_eq!(hash_item(&"apple"), hash_item(&"apple"));
/// assert_ne!(hash_item(&"apple"), hash_item(&"banana"));
/// ```
pub fn hash_item<T: Hash + ?Sized>(item: &T) -> u64 {
    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_ITEM_SEED);
    item.hash(&mut hasher);
    let (lo, _) = hasher.finish128();
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_keys() -> Vec<[u64; LANES]> {
        vec![
            [0, 1, 2, 3],
            [u64::MAX, u64::MAX - 1, 1 << 63, 42],
            [0x9e3779b97f4a7c15, 0xdeadbeef, 7, 1337],
        ]
    }

    fn assert_batch_matches_scalar<H: KeyHasher>(hasher: &H) {
        for keys in sample_keys() {
            let batch = hasher.hash_batch(keys);
            for (lane, &key) in keys.iter().enumerate() {
                assert_eq!(batch[lane], hasher.hash(key), "lane {lane} key {key:#x}");
            }
        }
    }

    #[test]
    fn test_batch_matches_scalar() {
        assert_batch_matches_scalar(&WangHash);
        assert_batch_matches_scalar(&MurFinHash);
        assert_batch_matches_scalar(&Murmur3Hasher::with_seed(17));
    }

    #[test]
    fn test_wang_hash_inverts() {
        for key in [0u64, 1, 42, 1337, u64::MAX, 0x0123_4567_89ab_cdef] {
            assert_eq!(WangHash::invert(WangHash.hash(key)), key);
        }
    }

    #[test]
    fn test_murfin_known_value() {
        // fmix64(0) is 0; the finalizer has no additive constant.
        assert_eq!(MurFinHash.hash(0), 0);
        assert_ne!(MurFinHash.hash(1), 1);
    }

    #[test]
    fn test_murmur3_seed_changes_hash() {
        let a = Murmur3Hasher::with_seed(1).hash(99);
        let b = Murmur3Hasher::with_seed(2).hash(99);
        assert_ne!(a, b);
        assert_eq!(a, Murmur3Hasher::with_seed(1).hash(99));
    }
}
