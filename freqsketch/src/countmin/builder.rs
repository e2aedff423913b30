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

use std::marker::PhantomData;

use crate::config::SketchConfig;
use crate::countmin::CountMinSketch;
use crate::countmin::Increment;
use crate::countmin::UpdatePolicy;
use crate::error::Error;
use crate::hash::KeyHasher;
use crate::hash::WangHash;

/// Builder for [`CountMinSketch`].
///
/// Conservative update defaults to on for policies that support it.
#[derive(Debug, Clone)]
pub struct CountMinSketchBuilder<P: UpdatePolicy = Increment, H: KeyHasher = WangHash> {
    config: SketchConfig,
    conservative_update: bool,
    allow_deletion: bool,
    hasher: H,
    policy: PhantomData<P>,
}

impl<P: UpdatePolicy, H: KeyHasher + Default> Default for CountMinSketchBuilder<P, H> {
    fn default() -> Self {
        Self {
            config: SketchConfig::default(),
            conservative_update: P::SUPPORTS_CONSERVATIVE,
            allow_deletion: false,
            hasher: H::default(),
            policy: PhantomData,
        }
    }
}

impl<P: UpdatePolicy, H: KeyHasher> CountMinSketchBuilder<P, H> {
    /// Set the register width `W` in bits.
    pub fn register_bits(mut self, register_bits: u8) -> Self {
        self.config.set_register_bits(register_bits);
        self
    }

    /// Set the log2 `L` of the number of registers per row.
    pub fn log2_row_size(mut self, log2_row_size: u8) -> Self {
        self.config.set_log2_row_size(log2_row_size);
        self
    }

    /// Set the number of rows `H`.
    pub fn num_rows(mut self, num_rows: u32) -> Self {
        self.config.set_num_rows(num_rows);
        self
    }

    /// Set the base seed the row seeds are drawn from.
    ///
    /// Sketches merge only if their dimensions, seed sets and hashers match.
    /// Rows that fit in the first hash word use no seed, so when `num_rows`
    /// is at most `64 / log2_row_size` (rounded down) the base seed does not
    /// change hashing and sketches built with different seeds still merge.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.set_seed(seed);
        self
    }

    /// Enable or disable conservative update.
    pub fn conservative_update(mut self, conservative_update: bool) -> Self {
        self.conservative_update = conservative_update;
        self
    }

    /// Allow [`CountMinSketch::subtract`].
    ///
    /// Requires an invertible policy and conservative update turned off.
    ///
    /// # Examples
    ///
    /// ```
    /// # use freqsketch::countmin::CountMinSketch;
    /// # use freqsketch::countmin::Increment;
    /// let mut sketch = CountMinSketch::<Increment>::builder()
    ///     .conservative_update(false)
    ///     .allow_deletion(true)
    ///     .build()
    ///     .unwrap();
    /// sketch.add(3);
    /// assert_eq!(sketch.subtract(3).unwrap(), 0);
    /// ```
    pub fn allow_deletion(mut self, allow_deletion: bool) -> Self {
        self.allow_deletion = allow_deletion;
        self
    }

    /// Set the hasher instance, e.g. a seeded
    /// [`Murmur3Hasher`](crate::hash::Murmur3Hasher).
    pub fn hasher(mut self, hasher: H) -> Self {
        self.hasher = hasher;
        self
    }

    /// Build the sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if the dimensions are invalid or the flags do not suit the policy, and
    /// [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory) if the
    /// registers cannot be allocated.
    pub fn build(self) -> Result<CountMinSketch<P, H>, Error> {
        self.config.validate(P::SIGNED)?;
        if self.conservative_update && !P::SUPPORTS_CONSERVATIVE {
            return Err(Error::config_invalid(
                "conservative update is not supported by this policy",
            )
            .with_context("policy", P::NAME));
        }
        if self.allow_deletion && !P::INVERTIBLE {
            return Err(
                Error::config_invalid("deletion requires an invertible policy")
                    .with_context("policy", P::NAME),
            );
        }
        if self.allow_deletion && self.conservative_update {
            return Err(Error::config_invalid(
                "deletion cannot be combined with conservative update",
            )
            .with_context("policy", P::NAME));
        }
        CountMinSketch::from_parts(
            self.config,
            self.conservative_update,
            self.allow_deletion,
            self.hasher,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countmin::PowerOfTwo;
    use crate::countmin::SignedIncrement;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let sketch = CountMinSketch::<Increment>::builder().build().unwrap();
        assert!(sketch.is_conservative());
        assert!(!sketch.supports_deletion());
        assert_eq!(sketch.config(), &SketchConfig::default());

        let signed = CountMinSketch::<SignedIncrement>::builder().build().unwrap();
        assert!(!signed.is_conservative());
    }

    #[test]
    fn test_rejects_unsupported_flags() {
        let err = CountMinSketch::<SignedIncrement>::builder()
            .conservative_update(true)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = CountMinSketch::<PowerOfTwo>::builder()
            .conservative_update(false)
            .allow_deletion(true)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = CountMinSketch::<Increment>::builder()
            .allow_deletion(true)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_rejects_invalid_dimensions() {
        let err = CountMinSketch::<SignedIncrement>::builder()
            .register_bits(1)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = CountMinSketch::<Increment>::builder()
            .num_rows(0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
