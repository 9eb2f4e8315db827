//! Cross-checks `LazyTreap` against a naive `Vec`-backed sequence that
//! implements the same traits.

use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use lazy_treap::{
    LazyPolicy, LazyTreap, RangeMaxRangeAdd, RangeMinRangeAdd, RangeSumRangeAdd,
    RangeSumRangeAssign, Result, SequenceAgg, SequenceBase, SequenceLazy, SequenceSplitMerge,
    TreapError,
};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestCaseError};
use tracing_subscriber::EnvFilter;

// =============================================================================
// Reference sequence
// =============================================================================

struct VecSequence<P: LazyPolicy> {
    values: Vec<P::Value>,
    _policy: PhantomData<P>,
}

impl<P: LazyPolicy> VecSequence<P> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            _policy: PhantomData,
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.values.len() {
            Ok(())
        } else {
            Err(TreapError::IndexOutOfRange {
                index,
                len: self.values.len(),
            })
        }
    }

    fn bounds<B: RangeBounds<usize>>(&self, range: B) -> Result<(usize, usize)> {
        let len = self.values.len();
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end + 1,
            Bound::Excluded(&end) => end,
            Bound::Unbounded => len,
        };
        if start <= end && end <= len {
            Ok((start, end))
        } else {
            Err(TreapError::RangeOutOfBounds { start, end, len })
        }
    }
}

impl<P: LazyPolicy> SequenceBase for VecSequence<P> {
    type Value = P::Value;

    fn len(&self) -> usize {
        self.values.len()
    }

    fn get(&self, index: usize) -> Result<Self::Value> {
        self.check_index(index)?;
        Ok(self.values[index].clone())
    }

    fn set(&mut self, index: usize, value: Self::Value) -> Result<()> {
        self.check_index(index)?;
        self.values[index] = value;
        Ok(())
    }

    fn insert(&mut self, index: usize, value: Self::Value) -> Result<()> {
        let len = self.values.len();
        if index > len {
            return Err(TreapError::IndexOutOfRange { index, len });
        }
        self.values.insert(index, value);
        Ok(())
    }

    fn push_back(&mut self, value: Self::Value) {
        self.values.push(value);
    }

    fn remove(&mut self, index: usize) -> Result<Self::Value> {
        self.check_index(index)?;
        Ok(self.values.remove(index))
    }
}

impl<P: LazyPolicy> SequenceSplitMerge for VecSequence<P> {
    fn split_off(&mut self, at: usize) -> Result<Self> {
        let len = self.values.len();
        if at > len {
            return Err(TreapError::IndexOutOfRange { index: at, len });
        }
        Ok(Self {
            values: self.values.split_off(at),
            _policy: PhantomData,
        })
    }

    fn append(&mut self, mut other: Self) {
        self.values.append(&mut other.values);
    }
}

impl<P: LazyPolicy> SequenceAgg for VecSequence<P> {
    type Agg = P::Value;

    fn fold<B: RangeBounds<usize>>(&mut self, range: B) -> Result<Self::Agg> {
        let (start, end) = self.bounds(range)?;
        Ok(self.values[start..end]
            .iter()
            .fold(P::neutral_value(), |acc, value| P::join_values(&acc, value)))
    }
}

impl<P: LazyPolicy> SequenceLazy for VecSequence<P> {
    type Delta = P::Delta;

    fn update<B: RangeBounds<usize>>(&mut self, range: B, delta: Self::Delta) -> Result<()> {
        let (start, end) = self.bounds(range)?;
        for value in &mut self.values[start..end] {
            *value = P::join_value_with_delta(value, &delta, 1);
        }
        Ok(())
    }
}

// =============================================================================
// Operation streams
// =============================================================================

trait DeltaFromI64: Clone {
    fn from_i64(delta: i64) -> Self;
}

impl DeltaFromI64 for i64 {
    fn from_i64(delta: i64) -> Self {
        delta
    }
}

impl DeltaFromI64 for Option<i64> {
    fn from_i64(delta: i64) -> Self {
        (delta % 5 != 0).then_some(delta)
    }
}

/// Positions are fractions of the current length; values above 1.0 land out
/// of range on purpose.
#[derive(Clone, Debug)]
enum Op {
    Insert { at: f64, value: i64 },
    Remove { at: f64 },
    Get { at: f64 },
    Set { at: f64, value: i64 },
    Fold { start: f64, end: f64 },
    Update { start: f64, end: f64, delta: i64 },
    SplitAppend { at: f64 },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    let at = 0.0..=1.2f64;
    let value = -1_000i64..=1_000;
    prop_oneof![
        3 => (at.clone(), value.clone()).prop_map(|(at, value)| Op::Insert { at, value }),
        1 => at.clone().prop_map(|at| Op::Remove { at }),
        1 => at.clone().prop_map(|at| Op::Get { at }),
        1 => (at.clone(), value).prop_map(|(at, value)| Op::Set { at, value }),
        2 => (at.clone(), at.clone()).prop_map(|(start, end)| Op::Fold { start, end }),
        2 => (at.clone(), at.clone(), -100i64..=100)
            .prop_map(|(start, end, delta)| Op::Update { start, end, delta }),
        1 => at.prop_map(|at| Op::SplitAppend { at }),
    ]
}

fn scale(fraction: f64, len: usize) -> usize {
    (fraction * len as f64) as usize
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn check_against_reference<P>(ops: &[Op]) -> std::result::Result<(), TestCaseError>
where
    P: LazyPolicy,
    P::Value: PartialEq + std::fmt::Debug,
    P::Delta: DeltaFromI64,
    P::Value: From<i64>,
{
    init_tracing();
    let mut treap = LazyTreap::<P>::with_seed(ops.len() as u64);
    let mut model = VecSequence::<P>::new();

    for op in ops {
        let len = model.len();
        match *op {
            Op::Insert { at, value } => {
                let index = scale(at, len + 1);
                prop_assert_eq!(
                    treap.insert(index, value.into()),
                    model.insert(index, value.into())
                );
            }
            Op::Remove { at } => {
                let index = scale(at, len);
                prop_assert_eq!(treap.remove(index), model.remove(index));
            }
            Op::Get { at } => {
                let index = scale(at, len);
                prop_assert_eq!(treap.get(index), model.get(index));
            }
            Op::Set { at, value } => {
                let index = scale(at, len);
                prop_assert_eq!(treap.set(index, value.into()), model.set(index, value.into()));
            }
            Op::Fold { start, end } => {
                let range = scale(start, len)..scale(end, len + 1);
                prop_assert_eq!(treap.fold(range.clone()), model.fold(range));
            }
            Op::Update { start, end, delta } => {
                let range = scale(start, len)..scale(end, len + 1);
                let delta = P::Delta::from_i64(delta);
                prop_assert_eq!(
                    treap.update(range.clone(), delta.clone()),
                    model.update(range, delta)
                );
            }
            Op::SplitAppend { at } => {
                let index = scale(at, len);
                match (treap.split_off(index), model.split_off(index)) {
                    (Ok(treap_tail), Ok(model_tail)) => {
                        prop_assert_eq!(treap_tail.to_vec(), model_tail.values.clone());
                        prop_assert_eq!(treap.len(), model.len());
                        treap.append(treap_tail);
                        model.append(model_tail);
                    }
                    (Err(treap_err), Err(model_err)) => prop_assert_eq!(treap_err, model_err),
                    (treap_result, model_result) => {
                        return Err(TestCaseError::fail(format!(
                            "split_off({index}) diverged: treap ok={}, model ok={}",
                            treap_result.is_ok(),
                            model_result.is_ok()
                        )));
                    }
                }
            }
        }
        prop_assert_eq!(treap.len(), model.len());
    }

    prop_assert_eq!(treap.to_vec(), model.values.clone());
    Ok(())
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(Config {
        cases: 64,
        max_shrink_iters: 1000,
        ..Config::default()
    })]

    #[test]
    fn max_add_matches_reference(ops in prop::collection::vec(arbitrary_op(), 1..300)) {
        check_against_reference::<RangeMaxRangeAdd>(&ops)?;
    }

    #[test]
    fn min_add_matches_reference(ops in prop::collection::vec(arbitrary_op(), 1..300)) {
        check_against_reference::<RangeMinRangeAdd>(&ops)?;
    }

    #[test]
    fn sum_add_matches_reference(ops in prop::collection::vec(arbitrary_op(), 1..300)) {
        check_against_reference::<RangeSumRangeAdd>(&ops)?;
    }

    #[test]
    fn sum_assign_matches_reference(ops in prop::collection::vec(arbitrary_op(), 1..300)) {
        check_against_reference::<RangeSumRangeAssign>(&ops)?;
    }

    /// Elements inside the range move by the delta; the rest stay put.
    #[test]
    fn update_touches_only_its_range(
        values in prop::collection::vec(-1_000i64..=1_000, 1..200),
        bounds in (0.0..1.0f64, 0.0..1.0f64),
        delta in -100i64..=100,
    ) {
        let mut treap: LazyTreap<RangeMaxRangeAdd> = values.iter().copied().collect();
        let a = scale(bounds.0.min(bounds.1), values.len());
        let b = scale(bounds.0.max(bounds.1), values.len());

        treap.range_update(a, b, delta)?;
        for (index, (before, after)) in values.iter().zip(treap.iter()).enumerate() {
            let expected = if (a..=b).contains(&index) { before + delta } else { *before };
            prop_assert_eq!(after, expected);
        }
    }

    /// A delta that would wrap any element of the range is refused and
    /// leaves the sequence as it was.
    #[test]
    fn overflowing_deltas_leave_sequence_unchanged(
        values in prop::collection::vec(
            prop_oneof![Just(i64::MIN + 1), Just(i64::MAX - 1), -1_000i64..=1_000],
            1..64,
        ),
        bounds in (0.0..1.0f64, 0.0..1.0f64),
        delta in prop_oneof![Just(-5i64), Just(5i64), -100i64..=100],
    ) {
        init_tracing();
        let mut treap: LazyTreap<RangeMaxRangeAdd> = values.iter().copied().collect();
        let a = scale(bounds.0.min(bounds.1), values.len());
        let b = scale(bounds.0.max(bounds.1), values.len());

        let shifted: Option<Vec<i64>> =
            values[a..=b].iter().map(|value| value.checked_add(delta)).collect();
        let mut expected = values.clone();
        match shifted {
            Some(shifted) => {
                treap.range_update(a, b, delta)?;
                expected[a..=b].copy_from_slice(&shifted);
            }
            None => {
                prop_assert_eq!(
                    treap.range_update(a, b, delta),
                    Err(TreapError::NumericOverflow)
                );
            }
        }
        prop_assert_eq!(treap.to_vec(), expected.clone());
        prop_assert_eq!(
            treap.range_query(0, values.len() - 1)?,
            expected.iter().copied().max().unwrap_or(i64::MIN)
        );
    }

    #[test]
    fn split_then_append_restores_sequence(
        values in prop::collection::vec(-1_000i64..=1_000, 0..300),
        at in 0.0..=1.0f64,
        delta in -100i64..=100,
    ) {
        let mut treap: LazyTreap<RangeSumRangeAdd> = values.iter().copied().collect();
        treap.update(.., delta)?;
        let before = treap.to_vec();

        let tail = treap.split_off(scale(at, values.len()))?;
        prop_assert_eq!(treap.len() + tail.len(), before.len());
        treap.append(tail);
        prop_assert_eq!(treap.to_vec(), before);
        prop_assert_eq!(treap.fold(..)?, values.iter().map(|value| value + delta).sum::<i64>());
    }
}
