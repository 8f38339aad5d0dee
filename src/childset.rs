//! A node's children, as a bounded-fanout, sorted-by-symbol collection.
//!
//! Most nodes have few children and are stored as a flat sorted `Vec`. Once
//! a collection grows past [`FANOUT`] entries it is split into an internal
//! index — a sorted separator list plus a trailing bucket — the same way a
//! B-tree page splits. The two shapes are unified behind one type so that
//! `Node` never has to know which one it's holding.

use smallvec::SmallVec;

use crate::node::Node;
use crate::symbol::SymbolId;

/// Above this many direct entries, a flat bucket splits into an internal
/// index. Chosen to keep a linear scan/insert within a bucket cheap while
/// bounding how deep the index nests for any realistic vocabulary size.
const FANOUT: usize = 128;

/// One symbol and the node reached by following it.
#[derive(Debug)]
pub struct Entry {
	pub symbol: SymbolId,
	pub node: Node,
}

/// A node's children: either a flat bucket, or an index over several
/// buckets.
///
/// Invariant maintained by every mutation: for an `Internal { seps, last }`,
/// `seps` is sorted ascending by separator, every symbol reachable through
/// `seps[i].1` is `<= seps[i].0`, every symbol reachable through `last` is
/// greater than every separator, and every symbol reachable through
/// `seps[i].1` is greater than `seps[i - 1].0` (no gaps, no overlap).
#[derive(Debug)]
pub enum ChildSet {
	Leaf(SmallVec<[Entry; 4]>),
	Internal {
		seps: Vec<(SymbolId, ChildSet)>,
		last: Box<ChildSet>,
	},
}

impl ChildSet {
	pub fn new() -> Self {
		ChildSet::Leaf(SmallVec::new())
	}

	/// Swaps `self` out for an empty leaf, returning what was there. Used by
	/// [`Node::add_tail`] to take ownership of a just-split collection
	/// before rewrapping it one level deeper.
	pub fn take(&mut self) -> ChildSet {
		std::mem::replace(self, ChildSet::new())
	}

	/// Builds the two-bucket index that results from `left` (already
	/// containing every symbol `<= separator`) outgrowing a single bucket,
	/// with `right` holding the overflow.
	pub fn wrap(separator: SymbolId, left: ChildSet, right: ChildSet) -> ChildSet {
		ChildSet::Internal {
			seps: vec![(separator, left)],
			last: Box::new(right),
		}
	}

	/// Looks up the child for `symbol`, without creating it.
	pub fn get(&self, symbol: SymbolId) -> Option<&Node> {
		match self {
			ChildSet::Leaf(entries) => entries
				.binary_search_by_key(&symbol, |e| e.symbol)
				.ok()
				.map(|i| &entries[i].node),
			ChildSet::Internal { seps, last } => self.bucket_for(seps, last, symbol).get(symbol),
		}
	}

	/// Records `freq` occurrences of an n-gram whose next symbol is
	/// `symbol` and whose remaining suffix (after `symbol`) is `rest`,
	/// creating the child for `symbol` if this is the first time it's been
	/// seen. If this collection's own bucket overflows past [`FANOUT`] as a
	/// result, it is split in place (keeping the lower half) and
	/// `Some((separator, right_half))` is returned for the caller to absorb
	/// — into its own index if it has one, or by wrapping both halves in a
	/// fresh [`ChildSet::Internal`] if this was the top-level collection.
	pub fn add(&mut self, symbol: SymbolId, rest: &[SymbolId], freq: u64) -> Option<(SymbolId, ChildSet)> {
		match self {
			ChildSet::Leaf(entries) => {
				match entries.binary_search_by_key(&symbol, |e| e.symbol) {
					Ok(i) => entries[i].node.add_tail(rest, freq),
					Err(i) => {
						let mut node = Node::new();
						node.add_tail(rest, freq);
						entries.insert(i, Entry { symbol, node });
					}
				}
				(entries.len() > FANOUT).then(|| self.split())
			}
			ChildSet::Internal { seps, last } => {
				let idx = seps.partition_point(|(s, _)| *s < symbol);
				let slot: &mut ChildSet = if idx < seps.len() { &mut seps[idx].1 } else { last.as_mut() };
				if let Some((sep, right)) = slot.add(symbol, rest, freq) {
					if idx < seps.len() {
						// `slot` (seps[idx].1) split; it keeps the lower
						// part and is now bounded by the new, smaller
						// `sep`. The old bound becomes the key for the
						// freshly split-off upper half, inserted right
						// after.
						let old_bound = seps[idx].0;
						seps[idx].0 = sep;
						seps.insert(idx + 1, (old_bound, right));
					} else {
						// `last` split; its lower half becomes a new
						// explicit entry keyed by `sep`, and the upper
						// half becomes the new `last`.
						let old_last = std::mem::replace(last.as_mut(), right);
						seps.push((sep, old_last));
					}
				}
				(seps.len() > FANOUT).then(|| self.split())
			}
		}
	}

	/// Splits `self` in place, keeping the lower half, and returns the
	/// separator between the two halves together with the upper half.
	fn split(&mut self) -> (SymbolId, ChildSet) {
		match self {
			ChildSet::Leaf(entries) => {
				let mid = entries.len() / 2;
				let right: SmallVec<[Entry; 4]> = entries.drain(mid..).collect();
				let separator = entries.last().expect("left half non-empty after split").symbol;
				(separator, ChildSet::Leaf(right))
			}
			ChildSet::Internal { seps, last } => {
				let mid = seps.len() / 2;
				let mut tail = seps.split_off(mid);
				let (separator, new_left_last) = tail.remove(0);
				let right_last = std::mem::replace(last.as_mut(), new_left_last);
				(separator, ChildSet::Internal { seps: tail, last: Box::new(right_last) })
			}
		}
	}

	fn bucket_for<'a>(&'a self, seps: &'a [(SymbolId, ChildSet)], last: &'a ChildSet, symbol: SymbolId) -> &'a ChildSet {
		let idx = seps.partition_point(|(s, _)| *s < symbol);
		if idx < seps.len() {
			&seps[idx].1
		} else {
			last
		}
	}

	/// All (symbol, child) pairs reachable through this collection, in
	/// ascending symbol order. Materialized eagerly: child collections are
	/// small enough in practice (bounded by [`FANOUT`] per level) that this
	/// is simpler than a custom lazy iterator, and it's only ever called
	/// over one node's immediate children.
	pub fn iter(&self) -> impl Iterator<Item = (SymbolId, u64)> + '_ {
		self.entries().into_iter().map(|(s, n)| (s, n.count()))
	}

	pub fn entries(&self) -> Vec<(SymbolId, &Node)> {
		let mut out = Vec::new();
		self.collect_into(&mut out);
		out
	}

	fn collect_into<'a>(&'a self, out: &mut Vec<(SymbolId, &'a Node)>) {
		match self {
			ChildSet::Leaf(entries) => out.extend(entries.iter().map(|e| (e.symbol, &e.node))),
			ChildSet::Internal { seps, last } => {
				for (_, child) in seps {
					child.collect_into(out);
				}
				last.collect_into(out);
			}
		}
	}

	pub fn len(&self) -> usize {
		match self {
			ChildSet::Leaf(entries) => entries.len(),
			ChildSet::Internal { seps, last } => seps.iter().map(|(_, c)| c.len()).sum::<usize>() + last.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for ChildSet {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;

	#[test]
	fn flat_insert_and_lookup() {
		let mut set = ChildSet::new();
		for i in 0..10u32 {
			if let Some((sep, right)) = set.add(i, &[], 1) {
				set = ChildSet::wrap(sep, set.take(), right);
			}
		}
		for i in 0..10u32 {
			assert_eq!(set.get(i).unwrap().count(), 1);
		}
		assert!(set.get(10).is_none());
	}

	#[test]
	fn split_on_overflow_preserves_all_entries() {
		let mut root = Node::new();
		for i in 0..500u32 {
			root.add_tail(&[i], 1);
		}
		for i in 0..500u32 {
			assert_eq!(
				root.find(&[i]).map(|n| n.count()),
				Some(1),
				"symbol {i} lost after split"
			);
		}
		assert_eq!(root.children().len(), 500);
	}

	#[test]
	fn split_keeps_ascending_order_for_iteration() {
		let mut root = Node::new();
		let mut order: Vec<u32> = (0..300).collect();
		// insert out of order to exercise mid-vec inserts, not just appends.
		order.reverse();
		for i in &order {
			root.add_tail(&[*i], 1);
		}
		let collected: Vec<u32> = root.children().entries().into_iter().map(|(s, _)| s).collect();
		let mut expected: Vec<u32> = (0..300).collect();
		expected.sort_unstable();
		assert_eq!(collected, expected);
	}

	#[test]
	fn repeated_symbol_accumulates_instead_of_duplicating() {
		let mut root = Node::new();
		root.add_tail(&[7], 3);
		root.add_tail(&[7], 4);
		assert_eq!(root.find(&[7]).unwrap().count(), 7);
		assert_eq!(root.children().len(), 1);
	}
}
