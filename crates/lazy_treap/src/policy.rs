/// How values aggregate and how pending deltas compose and apply.
///
/// `Value` is used both for single elements and for subtree aggregates.
/// Implementations must satisfy:
///
/// - `join_values(neutral_value(), x) == x == join_values(x, neutral_value())`
/// - `join_deltas(neutral_delta(), d) == d == join_deltas(d, neutral_delta())`
/// - `join_values` and `join_deltas` are associative.
/// - Applying a delta to an aggregate of `len` elements equals aggregating
///   the `len` elements after applying the delta to each one.
///
/// Violations are not detected at runtime; they show up as aggregate drift.
pub trait LazyPolicy {
    type Value: Clone;
    type Delta: Clone;

    fn neutral_value() -> Self::Value;
    fn neutral_delta() -> Self::Delta;

    /// Combine the aggregates of two adjacent runs, `left` first.
    fn join_values(left: &Self::Value, right: &Self::Value) -> Self::Value;

    /// Compose `new` after `old`.
    fn join_deltas(old: &Self::Delta, new: &Self::Delta) -> Self::Delta;

    /// Apply `delta` to a value that aggregates `len` elements.
    fn join_value_with_delta(value: &Self::Value, delta: &Self::Delta, len: usize) -> Self::Value;


    /// Per-subtree summary of the elements that decides whether a delta can
    /// be applied without overflow. `()` when nothing can overflow.
    type Extent: Clone;

    fn extent_of(value: &Self::Value) -> Self::Extent;
    fn join_extents(left: &Self::Extent, right: &Self::Extent) -> Self::Extent;

    /// Extent of a run of `len` elements after `delta` was applied to each.
    fn extent_with_delta(extent: &Self::Extent, delta: &Self::Delta, len: usize) -> Self::Extent;

    /// Whether `delta` can be applied to every element of a run with
    /// aggregate `agg` and `extent`, and to the aggregate itself, without
    /// leaving the value type.
    fn delta_fits(
        _agg: &Self::Value,
        _extent: &Self::Extent,
        _delta: &Self::Delta,
        _len: usize,
    ) -> bool {
        true
    }
}

/// Smallest and largest element of a run of `i64`s.
pub type Bounds = (i64, i64);

fn bounds_of(value: &i64) -> Bounds {
    (*value, *value)
}

fn join_bounds(left: &Bounds, right: &Bounds) -> Bounds {
    (left.0.min(right.0), left.1.max(right.1))
}

fn shift_bounds(bounds: &Bounds, delta: i64) -> Bounds {
    (bounds.0.wrapping_add(delta), bounds.1.wrapping_add(delta))
}

fn shift_fits(bounds: &Bounds, delta: i64) -> bool {
    bounds.0.checked_add(delta).is_some() && bounds.1.checked_add(delta).is_some()
}

/// Range maximum with range add.
pub struct RangeMaxRangeAdd;

impl LazyPolicy for RangeMaxRangeAdd {
    type Value = i64;
    type Delta = i64;
    type Extent = Bounds;

    fn neutral_value() -> Self::Value {
        i64::MIN
    }

    fn neutral_delta() -> Self::Delta {
        0
    }

    fn join_values(left: &Self::Value, right: &Self::Value) -> Self::Value {
        *left.max(right)
    }

    fn join_deltas(old: &Self::Delta, new: &Self::Delta) -> Self::Delta {
        old.wrapping_add(*new)
    }

    fn join_value_with_delta(value: &Self::Value, delta: &Self::Delta, _len: usize) -> Self::Value {
        value.wrapping_add(*delta)
    }

    fn extent_of(value: &Self::Value) -> Self::Extent {
        bounds_of(value)
    }

    fn join_extents(left: &Self::Extent, right: &Self::Extent) -> Self::Extent {
        join_bounds(left, right)
    }

    fn extent_with_delta(extent: &Self::Extent, delta: &Self::Delta, _len: usize) -> Self::Extent {
        shift_bounds(extent, *delta)
    }

    fn delta_fits(
        _agg: &Self::Value,
        extent: &Self::Extent,
        delta: &Self::Delta,
        _len: usize,
    ) -> bool {
        shift_fits(extent, *delta)
    }
}

/// Range minimum with range add.
pub struct RangeMinRangeAdd;

impl LazyPolicy for RangeMinRangeAdd {
    type Value = i64;
    type Delta = i64;
    type Extent = Bounds;

    fn neutral_value() -> Self::Value {
        i64::MAX
    }

    fn neutral_delta() -> Self::Delta {
        0
    }

    fn join_values(left: &Self::Value, right: &Self::Value) -> Self::Value {
        *left.min(right)
    }

    fn join_deltas(old: &Self::Delta, new: &Self::Delta) -> Self::Delta {
        old.wrapping_add(*new)
    }

    fn join_value_with_delta(value: &Self::Value, delta: &Self::Delta, _len: usize) -> Self::Value {
        value.wrapping_add(*delta)
    }

    fn extent_of(value: &Self::Value) -> Self::Extent {
        bounds_of(value)
    }

    fn join_extents(left: &Self::Extent, right: &Self::Extent) -> Self::Extent {
        join_bounds(left, right)
    }

    fn extent_with_delta(extent: &Self::Extent, delta: &Self::Delta, _len: usize) -> Self::Extent {
        shift_bounds(extent, *delta)
    }

    fn delta_fits(
        _agg: &Self::Value,
        extent: &Self::Extent,
        delta: &Self::Delta,
        _len: usize,
    ) -> bool {
        shift_fits(extent, *delta)
    }
}

/// Range sum with range add. The delta is scaled by the number of elements
/// it covers.
pub struct RangeSumRangeAdd;

impl LazyPolicy for RangeSumRangeAdd {
    type Value = i64;
    type Delta = i64;
    type Extent = Bounds;

    fn neutral_value() -> Self::Value {
        0
    }

    fn neutral_delta() -> Self::Delta {
        0
    }

    fn join_values(left: &Self::Value, right: &Self::Value) -> Self::Value {
        left.wrapping_add(*right)
    }

    fn join_deltas(old: &Self::Delta, new: &Self::Delta) -> Self::Delta {
        old.wrapping_add(*new)
    }

    fn join_value_with_delta(value: &Self::Value, delta: &Self::Delta, len: usize) -> Self::Value {
        value.wrapping_add(delta.wrapping_mul(len as i64))
    }

    fn extent_of(value: &Self::Value) -> Self::Extent {
        bounds_of(value)
    }

    fn join_extents(left: &Self::Extent, right: &Self::Extent) -> Self::Extent {
        join_bounds(left, right)
    }

    fn extent_with_delta(extent: &Self::Extent, delta: &Self::Delta, _len: usize) -> Self::Extent {
        shift_bounds(extent, *delta)
    }

    fn delta_fits(
        agg: &Self::Value,
        extent: &Self::Extent,
        delta: &Self::Delta,
        len: usize,
    ) -> bool {
        let total = i64::try_from(len)
            .ok()
            .and_then(|len| delta.checked_mul(len))
            .and_then(|shift| agg.checked_add(shift));
        total.is_some() && shift_fits(extent, *delta)
    }
}

/// Range sum with range assignment. `None` leaves values untouched; a later
/// assignment replaces an earlier one.
pub struct RangeSumRangeAssign;

impl LazyPolicy for RangeSumRangeAssign {
    type Value = i64;
    type Delta = Option<i64>;
    type Extent = ();

    fn neutral_value() -> Self::Value {
        0
    }

    fn neutral_delta() -> Self::Delta {
        None
    }

    fn join_values(left: &Self::Value, right: &Self::Value) -> Self::Value {
        left.wrapping_add(*right)
    }

    fn join_deltas(old: &Self::Delta, new: &Self::Delta) -> Self::Delta {
        new.or(*old)
    }

    fn join_value_with_delta(value: &Self::Value, delta: &Self::Delta, len: usize) -> Self::Value {
        match delta {
            Some(assigned) => assigned.wrapping_mul(len as i64),
            None => *value,
        }
    }

    fn extent_of(_value: &Self::Value) -> Self::Extent {}

    fn join_extents(_left: &Self::Extent, _right: &Self::Extent) -> Self::Extent {}

    fn extent_with_delta(
        _extent: &Self::Extent,
        _delta: &Self::Delta,
        _len: usize,
    ) -> Self::Extent {
    }

    fn delta_fits(
        _agg: &Self::Value,
        _extent: &Self::Extent,
        delta: &Self::Delta,
        len: usize,
    ) -> bool {
        match delta {
            Some(assigned) => i64::try_from(len)
                .ok()
                .and_then(|len| assigned.checked_mul(len))
                .is_some(),
            None => true,
        }
    }
}
