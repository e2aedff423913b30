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

//! Sliding-window frequency estimation.
//!
//! [`SlidingWindow`] keeps the last `N` items in a FIFO next to a sketch that
//! can retract updates. When the window is full, each new item evicts the
//! oldest one, which is subtracted from the sketch, so the sketch only ever
//! reflects the items currently in the window.
//!
//! # Usage
//!
//! ```rust
//! use freqsketch::countsketch::CountSketch;
//! use freqsketch::hash::WangHash;
//! use freqsketch::window::SlidingWindow;
//!
//! let sketch = CountSketch::<WangHash>::builder().build().unwrap();
//! let mut window = SlidingWindow::new(3, sketch).unwrap();
//! for item in [7, 7, 1, 2] {
//!     window.add(item).unwrap();
//! }
//! // the first 7 has left the window
//! assert_eq!(window.sketch().estimate(7).unwrap(), 1);
//! ```

use std::collections::VecDeque;

use tracing::debug;

use crate::countmin::CountMinSketch;
use crate::countmin::UpdatePolicy;
use crate::countsketch::CountSketch;
use crate::countsketch::CountSketch4Wise;
use crate::error::Error;
use crate::hash::KeyHasher;

/// A sketch that can take back an earlier update.
pub trait Subtractable {
    /// Whether [`remove`](Self::remove) is available on this instance.
    fn supports_subtraction(&self) -> bool;

    /// Records one occurrence of `item`.
    fn insert(&mut self, item: u64) -> Result<(), Error>;

    /// Retracts one occurrence of `item`.
    fn remove(&mut self, item: u64) -> Result<(), Error>;
}

impl<P: UpdatePolicy, H: KeyHasher> Subtractable for CountMinSketch<P, H> {
    fn supports_subtraction(&self) -> bool {
        self.supports_deletion()
    }

    fn insert(&mut self, item: u64) -> Result<(), Error> {
        self.add(item);
        Ok(())
    }

    fn remove(&mut self, item: u64) -> Result<(), Error> {
        self.subtract(item).map(|_| ())
    }
}

impl<H: KeyHasher> Subtractable for CountSketch<H> {
    fn supports_subtraction(&self) -> bool {
        true
    }

    fn insert(&mut self, item: u64) -> Result<(), Error> {
        self.add(item);
        Ok(())
    }

    fn remove(&mut self, item: u64) -> Result<(), Error> {
        self.subtract(item);
        Ok(())
    }
}

impl Subtractable for CountSketch4Wise {
    fn supports_subtraction(&self) -> bool {
        true
    }

    fn insert(&mut self, item: u64) -> Result<(), Error> {
        self.add(item);
        Ok(())
    }

    fn remove(&mut self, item: u64) -> Result<(), Error> {
        self.subtract(item);
        Ok(())
    }
}

/// Bounded FIFO of the most recent items composed with a subtractable sketch.
#[derive(Debug, Clone)]
pub struct SlidingWindow<S> {
    sketch: S,
    items: VecDeque<u64>,
    capacity: usize,
}

impl<S: Subtractable> SlidingWindow<S> {
    /// Wraps `sketch` in a window of the last `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if `capacity` is zero or the sketch cannot subtract, and
    /// [`ErrorKind::OutOfMemory`](crate::error::ErrorKind::OutOfMemory) if the
    /// queue cannot be allocated.
    pub fn new(capacity: usize, sketch: S) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::config_invalid("window capacity must be at least 1"));
        }
        if !sketch.supports_subtraction() {
            return Err(Error::config_invalid(
                "sliding window requires a sketch that supports subtraction",
            )
            .with_context("capacity", capacity));
        }
        let mut items = VecDeque::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|err| Error::out_of_memory("window queue", capacity, err))?;
        Ok(Self {
            sketch,
            items,
            capacity,
        })
    }

    /// Adds `item`, evicting the oldest item once the window is full.
    ///
    /// # Errors
    ///
    /// Propagates errors from the wrapped sketch.
    pub fn add(&mut self, item: u64) -> Result<(), Error> {
        self.sketch.insert(item)?;
        if self.items.len() == self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                self.sketch.remove(oldest)?;
                debug!(evicted = oldest, capacity = self.capacity, "window evicted oldest item");
            }
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Returns the wrapped sketch.
    pub fn sketch(&self) -> &S {
        &self.sketch
    }

    /// Returns the items in the window, oldest first.
    pub fn items(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().copied()
    }

    /// Returns the number of items currently in the window.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no item has been added yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the maximum number of items in the window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unwraps the sketch, dropping the queue.
    pub fn into_sketch(self) -> S {
        self.sketch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countmin::Increment;
    use crate::countmin::PowerOfTwo;
    use crate::error::ErrorKind;
    use crate::hash::WangHash;

    #[test]
    fn test_rejects_non_invertible_sketch() {
        let sketch = CountMinSketch::<PowerOfTwo>::builder().build().unwrap();
        let err = SlidingWindow::new(4, sketch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let conservative = CountMinSketch::<Increment>::builder().build().unwrap();
        assert!(SlidingWindow::new(4, conservative).is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let sketch = CountSketch::<WangHash>::builder().build().unwrap();
        let err = SlidingWindow::new(0, sketch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_queue_keeps_last_items() {
        let sketch = CountSketch4Wise::builder().build().unwrap();
        let mut window = SlidingWindow::new(2, sketch).unwrap();
        for item in 1..=5 {
            window.add(item).unwrap();
        }
        assert_eq!(window.items().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(window.len(), 2);
        assert_eq!(window.sketch().estimate(3).unwrap(), 0);
        assert_eq!(window.sketch().estimate(5).unwrap(), 1);
    }
}
