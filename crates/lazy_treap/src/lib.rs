//! Implicit treap over a positional sequence with range aggregates and
//! lazily propagated range deltas.

mod error;
mod policy;
mod traits;
mod treap;

pub use error::{Result, TreapError};
pub use policy::{
    Bounds, LazyPolicy, RangeMaxRangeAdd, RangeMinRangeAdd, RangeSumRangeAdd, RangeSumRangeAssign,
};
pub use traits::{SequenceAgg, SequenceBase, SequenceLazy, SequenceSplitMerge};
pub use treap::{Iter, LazyTreap};
