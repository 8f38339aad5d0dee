//! The in-memory entropy trie: one direction's root, its per-depth
//! normalization statistics, and its dirty flag.

use std::cell::{Cell, RefCell};

use hashbrown::HashSet;
use tracing::{debug, trace};

use crate::node::Node;
use crate::normalization::NormEntry;
use crate::symbol::SymbolId;

/// A depth-bounded prefix tree over symbol sequences, tracking occurrence
/// counts and the entropy statistics derived from them.
///
/// `Trie` is single-threaded and synchronous by design: there is no
/// locking because there is no concurrent access to guard against.
#[derive(Debug)]
pub struct Trie {
	root: Node,
	// Indexed directly by depth; slot 0 (the root) is never written, see
	// the module-level note in `normalization`.
	normalization: RefCell<Vec<NormEntry>>,
	dirty: Cell<bool>,
	terminals: HashSet<SymbolId>,
	max_ngram_length: usize,
}

impl Trie {
	/// Builds an empty trie. `terminals` identifies the symbol ids treated
	/// as sentence boundaries for entropy purposes; `max_ngram_length`
	/// bounds how deep the normalization vector needs to grow (it is not
	/// otherwise enforced — inserting a longer ngram simply grows deeper
	/// nodes than the normalization vector was sized for, which
	/// `update_stats` handles by growing it to fit).
	pub fn new(terminals: HashSet<SymbolId>, max_ngram_length: usize) -> Self {
		trace!(max_ngram_length, "constructing entropy trie");
		Trie {
			root: Node::new(),
			normalization: RefCell::new(vec![NormEntry::default(); max_ngram_length + 1]),
			dirty: Cell::new(false),
			terminals,
			max_ngram_length,
		}
	}

	/// Records `freq` occurrences of `ids`. A no-op if `freq == 0`.
	pub fn add_ngram(&mut self, ids: &[SymbolId], freq: u64) {
		if freq == 0 {
			return;
		}
		self.root.add_tail(ids, freq);
		self.dirty.set(true);
	}

	/// The occurrence count of `ids`, or 0 if the path is absent. Never
	/// triggers recomputation.
	pub fn query_count(&self, ids: &[SymbolId]) -> u64 {
		self.root.find(ids).map(Node::count).unwrap_or(0)
	}

	/// The Shannon entropy of `ids`'s successor distribution, or `NaN` if
	/// the path is absent or the node has no children.
	pub fn query_entropy(&self, ids: &[SymbolId]) -> f64 {
		match self.root.find(ids) {
			Some(node) => node.entropy(&self.terminals),
			None => f64::NAN,
		}
	}

	/// The entropy variation of `ids` against its parent prefix.
	pub fn query_ev(&self, ids: &[SymbolId]) -> f64 {
		if ids.is_empty() {
			return f64::NAN;
		}
		let Some(node) = self.root.find(ids) else {
			return f64::NAN;
		};
		// the path to `node` exists, so every prefix of it — including the
		// immediate parent — was created along the way.
		let parent = self
			.root
			.find(&ids[..ids.len() - 1])
			.expect("parent of an existing node must exist");
		let node_h = node.entropy(&self.terminals);
		let parent_h = parent.entropy(&self.terminals);
		if node_h == 0.0 && parent_h == 0.0 {
			return f64::NAN;
		}
		node_h - parent_h
	}

	/// The length-normalized autonomy z-score of `ids`. Triggers
	/// `update_stats` first if the trie is dirty.
	pub fn query_autonomy(&self, ids: &[SymbolId]) -> f64 {
		if self.dirty.get() {
			self.update_stats();
		}
		let ev = self.query_ev(ids);
		if ev.is_nan() {
			return f64::NAN;
		}
		let depth = ids.len();
		let normalization = self.normalization.borrow();
		match normalization.get(depth) {
			Some(entry) => entry.z_score(ev),
			None => f64::NAN,
		}
	}

	/// Recomputes the per-depth normalization statistics by a depth-first
	/// walk of the whole trie. A no-op if the trie is already clean.
	pub fn update_stats(&self) {
		if !self.dirty.get() {
			return;
		}
		debug!("update_stats: entering");
		{
			let mut normalization = self.normalization.borrow_mut();
			normalization.clear();
			normalization.resize(self.max_ngram_length + 1, NormEntry::default());
			Self::update_stats_rec(&self.root, &self.terminals, f64::NAN, 0, true, &mut normalization);
		}
		self.dirty.set(false);
		debug!(
			depth = self.normalization.borrow().len(),
			"update_stats: leaving"
		);
	}

	fn update_stats_rec(
		node: &Node,
		terminals: &HashSet<SymbolId>,
		parent_entropy: f64,
		depth: usize,
		is_root: bool,
		normalization: &mut Vec<NormEntry>,
	) {
		let entropy = node.entropy(terminals);
		if !is_root && !entropy.is_nan() && (entropy != 0.0 || parent_entropy != 0.0) {
			let ev = entropy - parent_entropy;
			if depth >= normalization.len() {
				normalization.resize(depth + 1, NormEntry::default());
			}
			normalization[depth].update(ev);
		}
		for (_, child) in node.children().entries() {
			Self::update_stats_rec(child, terminals, entropy, depth + 1, false, normalization);
		}
	}

	/// Drops every node and marks the trie dirty again (normalization
	/// statistics no longer describe anything meaningful until the next
	/// `update_stats`).
	pub fn clear(&mut self) {
		debug!("clearing trie");
		self.root = Node::new();
		self.normalization
			.replace(vec![NormEntry::default(); self.max_ngram_length + 1]);
		self.dirty.set(true);
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty.get()
	}

	pub fn root(&self) -> &Node {
		&self.root
	}
}
