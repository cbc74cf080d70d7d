//! # Order statistics over a sliding window
//!
//! A multiset of floating values with `insert`, `evict` and rank queries in
//! `O(log D)`, where `D` is the number of distinct values the multiset may
//! ever hold. The value universe is fixed up front (coordinate compression of
//! the chunk being processed); counts live in a Fenwick tree indexed by the
//! compressed slot.
//!
//! Kernels precompute one slot per input position with
//! [`ValueDomain::slots_for`] and drive [`OrderStatTree`] directly.
//! [`RankedMultiset`] wraps both for value-level use.

use crate::utilities::data_loader::RankValue;
use crate::utilities::enums::RankMethod;
use std::cmp::Ordering;

/// Slot assigned to NaN positions. Never inserted.
pub const NAN_SLOT: usize = usize::MAX;

/// Prefix sums over `0..len` with point updates.
#[derive(Debug, Clone)]
pub struct FenwickTree {
	tree: Vec<i64>,
}

impl FenwickTree {
	pub fn new(len: usize) -> Self {
		Self { tree: vec![0; len + 1] }
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.tree.len() - 1
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[inline(always)]
	pub fn add(&mut self, idx: usize, delta: i64) {
		let mut i = idx + 1;
		while i < self.tree.len() {
			self.tree[i] += delta;
			i += i & i.wrapping_neg();
		}
	}

	/// Sum of `[0, end)`.
	#[inline(always)]
	pub fn prefix(&self, end: usize) -> i64 {
		let mut i = end;
		let mut acc = 0;
		while i > 0 {
			acc += self.tree[i];
			i -= i & i.wrapping_neg();
		}
		acc
	}

	#[inline(always)]
	pub fn total(&self) -> i64 {
		self.prefix(self.len())
	}
}

/// Sorted, distinct, non-NaN values a multiset may contain.
#[derive(Debug, Clone)]
pub struct ValueDomain<T> {
	values: Vec<T>,
}

impl<T: RankValue> ValueDomain<T> {
	pub fn from_values(data: &[T]) -> Self {
		let mut values: Vec<T> = data.iter().copied().filter(|v| !v.is_nan()).collect();
		values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
		values.dedup();
		Self { values }
	}

	#[inline(always)]
	pub fn len(&self) -> usize {
		self.values.len()
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Number of domain values strictly below `v`.
	#[inline]
	pub fn lower_bound(&self, v: T) -> usize {
		self.values.partition_point(|&x| x < v)
	}

	#[inline]
	pub fn slot(&self, v: T) -> Option<usize> {
		if v.is_nan() {
			return None;
		}
		let idx = self.lower_bound(v);
		(idx < self.values.len() && self.values[idx] == v).then_some(idx)
	}

	/// One slot per element of `data`, [`NAN_SLOT`] for NaN entries.
	pub fn slots_for(&self, data: &[T]) -> Vec<usize> {
		data.iter()
			.map(|&v| self.slot(v).unwrap_or(NAN_SLOT))
			.collect()
	}
}

/// Multiset counts over the slots of a [`ValueDomain`].
///
/// Evicting a slot with a zero count means the caller's window bookkeeping is
/// broken; it panics rather than returning an error.
#[derive(Debug, Clone)]
pub struct OrderStatTree {
	fenwick: FenwickTree,
	counts: Vec<u32>,
	len: usize,
}

impl OrderStatTree {
	pub fn with_slots(slots: usize) -> Self {
		Self {
			fenwick: FenwickTree::new(slots),
			counts: vec![0; slots],
			len: 0,
		}
	}

	/// Number of elements currently held.
	#[inline(always)]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline(always)]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[inline(always)]
	pub fn insert(&mut self, slot: usize) {
		self.counts[slot] += 1;
		self.fenwick.add(slot, 1);
		self.len += 1;
	}

	#[inline(always)]
	pub fn evict(&mut self, slot: usize) {
		assert!(
			self.counts[slot] > 0,
			"order_stat: evicting slot {slot} which holds no element"
		);
		self.counts[slot] -= 1;
		self.fenwick.add(slot, -1);
		self.len -= 1;
	}

	/// Elements strictly below `slot`.
	#[inline(always)]
	pub fn count_less(&self, slot: usize) -> usize {
		self.fenwick.prefix(slot) as usize
	}

	#[inline(always)]
	pub fn count_equal(&self, slot: usize) -> usize {
		self.counts[slot] as usize
	}

	#[inline(always)]
	pub fn count_less_equal(&self, slot: usize) -> usize {
		self.count_less(slot) + self.count_equal(slot)
	}

	/// 1-based rank of the most recently inserted element at `slot`.
	///
	/// `First` breaks ties by insertion order, so the newest copy of a value
	/// ranks after every older equal element.
	#[inline(always)]
	pub fn rank(&self, slot: usize, method: RankMethod) -> f64 {
		let less = self.count_less(slot);
		let equal = self.count_equal(slot);
		tie_rank(less, equal, method)
	}
}

#[inline(always)]
fn tie_rank(less: usize, equal: usize, method: RankMethod) -> f64 {
	let min_rank = (less + 1) as f64;
	let max_rank = (less + equal) as f64;
	match method {
		RankMethod::Min => min_rank,
		RankMethod::Max | RankMethod::First => max_rank,
		RankMethod::Average => 0.5 * (min_rank + max_rank),
	}
}

/// Value-level multiset over a fixed universe.
#[derive(Debug, Clone)]
pub struct RankedMultiset<T> {
	domain: ValueDomain<T>,
	tree: OrderStatTree,
}

impl<T: RankValue> RankedMultiset<T> {
	pub fn with_universe(universe: &[T]) -> Self {
		let domain = ValueDomain::from_values(universe);
		let tree = OrderStatTree::with_slots(domain.len());
		Self { domain, tree }
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.tree.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.tree.is_empty()
	}

	/// Panics if `v` is NaN or outside the universe.
	pub fn insert(&mut self, v: T) {
		match self.domain.slot(v) {
			Some(slot) => self.tree.insert(slot),
			None => panic!("order_stat: inserting {v:?} outside the value universe"),
		}
	}

	/// Panics if `v` is not currently held.
	pub fn evict(&mut self, v: T) {
		match self.domain.slot(v) {
			Some(slot) => self.tree.evict(slot),
			None => panic!("order_stat: evicting {v:?} outside the value universe"),
		}
	}

	pub fn count_less(&self, v: T) -> usize {
		self.tree.count_less(self.domain.lower_bound(v))
	}

	pub fn count_less_equal(&self, v: T) -> usize {
		match self.domain.slot(v) {
			Some(slot) => self.tree.count_less_equal(slot),
			None => self.count_less(v),
		}
	}

	/// Rank `v` would receive among the held elements; for a held value this
	/// is the rank of its newest copy.
	pub fn rank_query(&self, v: T, method: RankMethod) -> f64 {
		if v.is_nan() {
			return f64::NAN;
		}
		let less = self.count_less(v);
		let equal = self.count_less_equal(v) - less;
		tie_rank(less, equal, method)
	}
}
