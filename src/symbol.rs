//! Interning of opaque byte-string tokens into small, stable [`SymbolId`]s.
//!
//! The trie itself never sees a token: every path through it is a sequence
//! of ids handed out by a [`SymbolTable`]. This keeps the trie's contract
//! opaque to the token's own shape — it doesn't care whether a "token" is
//! a UTF-8 word, a single byte, or anything else the tokenization pipeline
//! upstream decided to emit.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// An unsigned, densely-allocated identifier for an interned token.
///
/// Two distinct tokens are guaranteed to intern to distinct ids; no other
/// ordering relationship between a token's bytes and its id is implied or
/// relied upon anywhere in this crate.
pub type SymbolId = u32;

/// The start-of-sentence sentinel, encoded as the UTF-8 bytes of U+E02B.
pub const SENTENCE_START: &str = "\u{E02B}";
/// The end-of-sentence sentinel, encoded as the UTF-8 bytes of U+E02D.
pub const SENTENCE_END: &str = "\u{E02D}";

/// Whether `token` is one of the two sentence sentinels. The persistent
/// backend has no symbol table to consult, so it identifies terminals
/// structurally, by byte content, rather than through an interned id set.
pub fn is_terminal_bytes(token: &[u8]) -> bool {
	token == SENTENCE_START.as_bytes() || token == SENTENCE_END.as_bytes()
}

/// Builds the terminal-id set a [`crate::trie::Trie`] needs, by interning
/// the two sentence sentinels into `table` (creating them if this is the
/// first trie built against it).
pub fn default_terminals(table: &mut SymbolTable) -> hashbrown::HashSet<SymbolId> {
	[table.intern(SENTENCE_START.as_bytes()), table.intern(SENTENCE_END.as_bytes())]
		.into_iter()
		.collect()
}

/// A bidirectional token <-> id table, plus the set of ids considered
/// terminal (sentence boundaries, by default) for entropy purposes.
///
/// `Serialize`/`Deserialize` let an embedding caller snapshot an in-memory
/// facade's vocabulary to its own storage and restore it later; the live
/// trie data structure itself is not serialized this way — that's a
/// caller choosing to checkpoint the vocabulary mapping on its own terms,
/// not a way of sharing a single running trie across processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
	by_token: HashMap<Vec<u8>, SymbolId>,
	by_id: Vec<Vec<u8>>,
}

impl SymbolTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the id for `token`, interning it if this is the first time it
	/// has been seen.
	pub fn intern(&mut self, token: &[u8]) -> SymbolId {
		if let Some(&id) = self.by_token.get(token) {
			return id;
		}
		let id = self.by_id.len() as SymbolId;
		self.by_token.insert(token.to_vec(), id);
		self.by_id.push(token.to_vec());
		id
	}

	/// Looks up the id for `token` without creating it.
	pub fn lookup(&self, token: &[u8]) -> Option<SymbolId> {
		self.by_token.get(token).copied()
	}

	/// Recovers the original bytes for a previously-interned id.
	pub fn resolve(&self, id: SymbolId) -> Option<&[u8]> {
		self.by_id.get(id as usize).map(|v| v.as_slice())
	}

	/// The number of distinct tokens interned so far.
	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}
}
