use std::ops::RangeBounds;

use crate::error::Result;

/// Positional access to an ordered sequence.
pub trait SequenceBase {
    type Value;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Self::Value>;
    fn set(&mut self, index: usize, value: Self::Value) -> Result<()>;

    /// Insert so that `value` ends up at `index`; `index == len()` appends.
    fn insert(&mut self, index: usize, value: Self::Value) -> Result<()>;
    fn push_back(&mut self, value: Self::Value);
    fn remove(&mut self, index: usize) -> Result<Self::Value>;

    fn extend<I: IntoIterator<Item = Self::Value>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

pub trait SequenceSplitMerge: SequenceBase + Sized {
    /// Keep `[0, at)` in `self` and return `[at, len)`.
    fn split_off(&mut self, at: usize) -> Result<Self>;

    /// Concatenate `other` after the last element of `self`.
    fn append(&mut self, other: Self);
}

pub trait SequenceAgg: SequenceBase {
    type Agg;

    /// Aggregate of the elements in `range`; the neutral value when empty.
    fn fold<R: RangeBounds<usize>>(&mut self, range: R) -> Result<Self::Agg>;
}

pub trait SequenceLazy: SequenceAgg {
    type Delta;

    /// Apply `delta` to every element in `range`.
    fn update<R: RangeBounds<usize>>(&mut self, range: R, delta: Self::Delta) -> Result<()>;
}
