use std::fmt;
use std::ops::{Bound, RangeBounds};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::{Result, TreapError};
use crate::policy::LazyPolicy;
use crate::traits::{SequenceAgg, SequenceBase, SequenceLazy, SequenceSplitMerge};

const DEFAULT_SEED: u64 = 0x5EED_7EA9;

/// Implicit treap: an ordered sequence where position is given by in-order
/// rank, with range aggregates and lazily propagated range deltas.
///
/// Every structural operation splits the tree into fragments and merges
/// them back, so node placement changes on reads as well as writes. All
/// access goes through the single owned root.
pub struct LazyTreap<P: LazyPolicy, R = SmallRng> {
    root: Link<P>,
    rng: R,
}

struct Node<P: LazyPolicy> {
    value: P::Value,
    agg: P::Value,
    extent: P::Extent,
    delta: P::Delta,
    pending: bool,
    size: usize,
    prio: u64,
    left: Link<P>,
    right: Link<P>,
}

type Link<P> = Option<Box<Node<P>>>;

impl<P: LazyPolicy> Clone for Node<P> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            agg: self.agg.clone(),
            extent: self.extent.clone(),
            delta: self.delta.clone(),
            pending: self.pending,
            size: self.size,
            prio: self.prio,
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

impl<P: LazyPolicy> Node<P> {
    fn new(value: P::Value, prio: u64) -> Self {
        Self {
            agg: value.clone(),
            extent: P::extent_of(&value),
            value,
            delta: P::neutral_delta(),
            pending: false,
            size: 1,
            prio,
            left: None,
            right: None,
        }
    }

    fn size(node: &Link<P>) -> usize {
        node.as_ref().map(|n| n.size).unwrap_or(0)
    }

    fn recalc(&mut self) {
        let mut agg = self.value.clone();
        let mut extent = P::extent_of(&self.value);
        if let Some(left) = self.left.as_deref() {
            agg = P::join_values(&left.agg, &agg);
            extent = P::join_extents(&left.extent, &extent);
        }
        if let Some(right) = self.right.as_deref() {
            agg = P::join_values(&agg, &right.agg);
            extent = P::join_extents(&extent, &right.extent);
        }
        self.agg = agg;
        self.extent = extent;
        self.size = 1 + Self::size(&self.left) + Self::size(&self.right);
    }

    /// O(1): the whole subtree receives `delta`, children only once pushed.
    fn apply_delta(&mut self, delta: &P::Delta) {
        self.delta = P::join_deltas(&self.delta, delta);
        self.pending = true;
        self.value = P::join_value_with_delta(&self.value, delta, 1);
        self.agg = P::join_value_with_delta(&self.agg, delta, self.size);
        self.extent = P::extent_with_delta(&self.extent, delta, self.size);
    }

    /// Must run before the children are read or relinked.
    fn push(&mut self) {
        if !self.pending {
            return;
        }
        if self.left.is_some() || self.right.is_some() {
            let delta = std::mem::replace(&mut self.delta, P::neutral_delta());
            if let Some(left) = self.left.as_deref_mut() {
                left.apply_delta(&delta);
            }
            if let Some(right) = self.right.as_deref_mut() {
                right.apply_delta(&delta);
            }
        } else {
            self.delta = P::neutral_delta();
        }
        self.pending = false;
    }

    /// Deltas still owed to this node's children, given the deltas `above`
    /// owed to the node itself.
    fn owed_below(&self, above: &P::Delta) -> P::Delta {
        if self.pending {
            P::join_deltas(&self.delta, above)
        } else {
            above.clone()
        }
    }
}

impl<P: LazyPolicy> LazyTreap<P> {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    /// Priorities drawn from OS entropy; tree shape differs between runs.
    pub fn from_os_rng() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }
}

impl<P: LazyPolicy, R: Rng + SeedableRng> LazyTreap<P, R> {
    pub fn with_rng(rng: R) -> Self {
        Self { root: None, rng }
    }

    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Aggregate over the inclusive range `[a, b]`; requires `a <= b < len`.
    pub fn range_query(&mut self, a: usize, b: usize) -> Result<P::Value> {
        self.check_inclusive(a, b)?;
        self.fold(a..=b)
    }

    /// Apply `delta` to every element of the inclusive range `[a, b]`;
    /// requires `a <= b < len`.
    pub fn range_update(&mut self, a: usize, b: usize, delta: P::Delta) -> Result<()> {
        self.check_inclusive(a, b)?;
        self.update(a..=b, delta)
    }

    fn check_inclusive(&self, a: usize, b: usize) -> Result<()> {
        Self::check_index(b, self.len())?;
        if a > b {
            debug!(a, b, "rejected reversed inclusive range");
            return Err(TreapError::ReversedRange { a, b });
        }
        Ok(())
    }

    /// Length of the longest root-to-leaf path; 0 when empty.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = Vec::new();
        if let Some(root) = self.root.as_deref() {
            stack.push((root, 1));
        }
        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);
            for child in [node.left.as_deref(), node.right.as_deref()].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        height
    }

    /// In-order values with every pending delta accounted for.
    pub fn iter(&self) -> Iter<'_, P> {
        Iter::new(self.root.as_deref())
    }

    pub fn to_vec(&self) -> Vec<P::Value> {
        self.iter().collect()
    }

    fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            debug!(index, len, "rejected out-of-range index");
            Err(TreapError::IndexOutOfRange { index, len })
        }
    }

    fn normalize_range<B: RangeBounds<usize>>(range: B, len: usize) -> Result<(usize, usize)> {
        let start = match range.start_bound() {
            Bound::Included(&start) => Some(start),
            Bound::Excluded(&start) => start.checked_add(1),
            Bound::Unbounded => Some(0),
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end.checked_add(1),
            Bound::Excluded(&end) => Some(end),
            Bound::Unbounded => Some(len),
        };

        match (start, end) {
            (Some(start), Some(end)) if start <= end && end <= len => Ok((start, end)),
            (start, end) => {
                let start = start.unwrap_or(usize::MAX);
                let end = end.unwrap_or(usize::MAX);
                debug!(start, end, len, "rejected out-of-bounds range");
                Err(TreapError::RangeOutOfBounds { start, end, len })
            }
        }
    }

    /// Split into the first `left_count` elements and the rest.
    fn split(root: Link<P>, left_count: usize) -> (Link<P>, Link<P>) {
        let mut node = match root {
            Some(node) => node,
            None => return (None, None),
        };
        node.push();
        if left_count == 0 {
            return (None, Some(node));
        }
        if left_count >= node.size {
            return (Some(node), None);
        }

        let left_size = Node::size(&node.left);
        if left_count <= left_size {
            let (left, right) = Self::split(node.left.take(), left_count);
            node.left = right;
            node.recalc();
            (left, Some(node))
        } else {
            let (left, right) = Self::split(node.right.take(), left_count - left_size - 1);
            node.right = left;
            node.recalc();
            (Some(node), right)
        }
    }

    /// Concatenate; every element of `left` precedes every element of
    /// `right`. On equal priority the left node becomes the root.
    fn merge(left: Link<P>, right: Link<P>) -> Link<P> {
        match (left, right) {
            (None, right) => right,
            (left, None) => left,
            (Some(mut left), Some(mut right)) => {
                if left.prio >= right.prio {
                    left.push();
                    left.right = Self::merge(left.right.take(), Some(right));
                    left.recalc();
                    Some(left)
                } else {
                    right.push();
                    right.left = Self::merge(Some(left), right.left.take());
                    right.recalc();
                    Some(right)
                }
            }
        }
    }

    /// Cut out `[start, end)` as `(before, middle, after)`.
    fn split_range(root: Link<P>, start: usize, end: usize) -> (Link<P>, Link<P>, Link<P>) {
        let (rest, after) = Self::split(root, end);
        let (before, middle) = Self::split(rest, start);
        (before, middle, after)
    }

    fn merge_range(before: Link<P>, middle: Link<P>, after: Link<P>) -> Link<P> {
        Self::merge(Self::merge(before, middle), after)
    }
}

impl<P: LazyPolicy> Default for LazyTreap<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LazyPolicy, R: Clone> Clone for LazyTreap<P, R> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            rng: self.rng.clone(),
        }
    }
}

impl<P, R> fmt::Debug for LazyTreap<P, R>
where
    P: LazyPolicy,
    P::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(Iter::<P>::new(self.root.as_deref()))
            .finish()
    }
}

impl<P: LazyPolicy> FromIterator<P::Value> for LazyTreap<P> {
    fn from_iter<I: IntoIterator<Item = P::Value>>(iter: I) -> Self {
        let mut treap = Self::new();
        SequenceBase::extend(&mut treap, iter);
        treap
    }
}

impl<'a, P: LazyPolicy, R: Rng + SeedableRng> IntoIterator for &'a LazyTreap<P, R> {
    type Item = P::Value;
    type IntoIter = Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<P: LazyPolicy, R: Rng + SeedableRng> SequenceBase for LazyTreap<P, R> {
    type Value = P::Value;

    fn len(&self) -> usize {
        Node::size(&self.root)
    }

    fn get(&self, index: usize) -> Result<Self::Value> {
        let len = self.len();
        Self::check_index(index, len)?;

        let mut rank = index;
        let mut owed = P::neutral_delta();
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            let left_size = Node::size(&current.left);
            if rank == left_size {
                return Ok(P::join_value_with_delta(&current.value, &owed, 1));
            }
            owed = current.owed_below(&owed);
            if rank < left_size {
                node = current.left.as_deref();
            } else {
                rank -= left_size + 1;
                node = current.right.as_deref();
            }
        }
        Err(TreapError::IndexOutOfRange { index, len })
    }

    fn set(&mut self, index: usize, value: Self::Value) -> Result<()> {
        Self::check_index(index, self.len())?;

        let (before, middle, after) = Self::split_range(self.root.take(), index, index + 1);
        let middle = middle.map(|node| Box::new(Node::new(value, node.prio)));
        self.root = Self::merge_range(before, middle, after);
        Ok(())
    }

    fn insert(&mut self, index: usize, value: Self::Value) -> Result<()> {
        let len = self.len();
        if index > len {
            debug!(index, len, "rejected out-of-range insert");
            return Err(TreapError::IndexOutOfRange { index, len });
        }

        let node = Some(Box::new(Node::new(value, self.rng.random())));
        let (left, right) = Self::split(self.root.take(), index);
        self.root = Self::merge_range(left, node, right);
        Ok(())
    }

    fn push_back(&mut self, value: Self::Value) {
        let node = Some(Box::new(Node::new(value, self.rng.random())));
        self.root = Self::merge(self.root.take(), node);
    }

    fn remove(&mut self, index: usize) -> Result<Self::Value> {
        let len = self.len();
        Self::check_index(index, len)?;

        let (left, target, right) = Self::split_range(self.root.take(), index, index + 1);
        self.root = Self::merge(left, right);
        target
            .map(|node| node.value)
            .ok_or(TreapError::IndexOutOfRange { index, len })
    }
}

impl<P: LazyPolicy, R: Rng + SeedableRng> SequenceSplitMerge for LazyTreap<P, R> {
    fn split_off(&mut self, at: usize) -> Result<Self> {
        let len = self.len();
        if at > len {
            debug!(at, len, "rejected out-of-range split");
            return Err(TreapError::IndexOutOfRange { index: at, len });
        }

        let (left, right) = Self::split(self.root.take(), at);
        self.root = left;
        let tail = Self {
            root: right,
            rng: R::from_rng(&mut self.rng),
        };
        trace!(head = self.len(), tail = tail.len(), "split sequence");
        Ok(tail)
    }

    fn append(&mut self, other: Self) {
        self.root = Self::merge(self.root.take(), other.root);
        trace!(len = self.len(), "appended sequence");
    }
}

impl<P: LazyPolicy, R: Rng + SeedableRng> SequenceAgg for LazyTreap<P, R> {
    type Agg = P::Value;

    fn fold<B: RangeBounds<usize>>(&mut self, range: B) -> Result<Self::Agg> {
        let (start, end) = Self::normalize_range(range, self.len())?;
        if start == end {
            return Ok(P::neutral_value());
        }

        let (before, middle, after) = Self::split_range(self.root.take(), start, end);
        let agg = middle
            .as_ref()
            .map(|node| node.agg.clone())
            .unwrap_or_else(P::neutral_value);
        self.root = Self::merge_range(before, middle, after);
        Ok(agg)
    }
}

impl<P: LazyPolicy, R: Rng + SeedableRng> SequenceLazy for LazyTreap<P, R> {
    type Delta = P::Delta;

    fn update<B: RangeBounds<usize>>(&mut self, range: B, delta: Self::Delta) -> Result<()> {
        let (start, end) = Self::normalize_range(range, self.len())?;
        if start == end {
            return Ok(());
        }

        let (before, mut middle, after) = Self::split_range(self.root.take(), start, end);
        let mut result = Ok(());
        if let Some(node) = middle.as_deref_mut() {
            if P::delta_fits(&node.agg, &node.extent, &delta, node.size) {
                node.apply_delta(&delta);
            } else {
                debug!(start, end, "rejected range delta: numeric overflow");
                result = Err(TreapError::NumericOverflow);
            }
        }
        self.root = Self::merge_range(before, middle, after);
        result
    }
}

/// In-order iterator that applies outstanding deltas on the fly instead of
/// pushing them into the tree.
pub struct Iter<'a, P: LazyPolicy> {
    stack: Vec<(&'a Node<P>, P::Delta)>,
    remaining: usize,
}

impl<'a, P: LazyPolicy> Iter<'a, P> {
    fn new(root: Option<&'a Node<P>>) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            remaining: root.map(|node| node.size).unwrap_or(0),
        };
        iter.descend_left(root, P::neutral_delta());
        iter
    }

    fn descend_left(&mut self, mut node: Option<&'a Node<P>>, mut owed: P::Delta) {
        while let Some(current) = node {
            let below = current.owed_below(&owed);
            self.stack.push((current, owed));
            node = current.left.as_deref();
            owed = below;
        }
    }
}

impl<P: LazyPolicy> Iterator for Iter<'_, P> {
    type Item = P::Value;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, owed) = self.stack.pop()?;
        let value = P::join_value_with_delta(&node.value, &owed, 1);
        self.descend_left(node.right.as_deref(), node.owed_below(&owed));
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P: LazyPolicy> ExactSizeIterator for Iter<'_, P> {}
