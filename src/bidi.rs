//! The bidirectional storage facade: a forward trie and a backward
//! trie (over reversed sequences) sharing one symbol table, combined into
//! direction-agnostic statistics.

use tracing::{debug, trace};

use crate::config::TrieConfig;
use crate::error::Result;
use crate::symbol::{default_terminals, SymbolId, SymbolTable};
use crate::trie::Trie;

#[cfg(feature = "kv-rocksdb")]
use crate::kv::{ConfigStore, PersistentTrie};

/// Either realization of one direction's trie, dispatched on dynamically
/// so the facade's code doesn't need to know which backend it's driving.
enum Backend {
	Memory(Trie),
	#[cfg(feature = "kv-rocksdb")]
	Persistent(PersistentTrie),
}

impl Backend {
	fn add_ngram(&mut self, ids: &[SymbolId], tokens: &[&[u8]], freq: u64) -> Result<()> {
		match self {
			Backend::Memory(trie) => {
				trie.add_ngram(ids, freq);
				Ok(())
			}
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.add_ngram(tokens, freq),
		}
	}

	fn query_count(&self, ids: &[SymbolId], tokens: &[&[u8]]) -> Result<u64> {
		match self {
			Backend::Memory(trie) => Ok(trie.query_count(ids)),
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.query_count(tokens),
		}
	}

	fn query_entropy(&self, ids: &[SymbolId], tokens: &[&[u8]]) -> Result<f64> {
		match self {
			Backend::Memory(trie) => Ok(trie.query_entropy(ids)),
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.query_entropy(tokens),
		}
	}

	fn query_ev(&self, ids: &[SymbolId], tokens: &[&[u8]]) -> Result<f64> {
		match self {
			Backend::Memory(trie) => Ok(trie.query_ev(ids)),
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.query_ev(tokens),
		}
	}

	fn query_autonomy(&self, ids: &[SymbolId], tokens: &[&[u8]]) -> Result<f64> {
		match self {
			Backend::Memory(trie) => Ok(trie.query_autonomy(ids)),
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.query_autonomy(tokens),
		}
	}

	fn update_stats(&self) -> Result<()> {
		match self {
			Backend::Memory(trie) => {
				trie.update_stats();
				Ok(())
			}
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.update_stats(),
		}
	}

	fn clear(&mut self) -> Result<()> {
		match self {
			Backend::Memory(trie) => {
				trie.clear();
				Ok(())
			}
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.clear(),
		}
	}

	/// Releases the backend. A no-op for the in-memory variant, which has
	/// nothing to flush or close.
	fn close(self) -> Result<()> {
		match self {
			Backend::Memory(_) => Ok(()),
			#[cfg(feature = "kv-rocksdb")]
			Backend::Persistent(store) => store.close(),
		}
	}
}

/// The forward/backward trie pair, plus the shared symbol table, that
/// callers outside this crate are expected to hold onto.
pub struct BidirectionalStorage {
	forward: Backend,
	backward: Backend,
	symbols: SymbolTable,
	terminals: hashbrown::HashSet<SymbolId>,
	config: TrieConfig,
	#[cfg(feature = "kv-rocksdb")]
	config_store: Option<ConfigStore>,
}

impl BidirectionalStorage {
	/// Builds a facade from `config`, choosing the in-memory or persistent
	/// backend according to [`TrieConfig::storage_root`].
	///
	/// For the persistent backend, a `config/` store under the storage root
	/// remembers the default n-gram length across a close/reopen: if
	/// one was already persisted there, it overrides whatever `config`
	/// supplied, so a reopened store behaves the same way it did when it
	/// was last closed without the caller having to remember and re-supply
	/// the setting.
	pub fn new(mut config: TrieConfig) -> Result<Self> {
		let mut symbols = SymbolTable::new();
		let terminals = default_terminals(&mut symbols);
		#[cfg(feature = "kv-rocksdb")]
		let mut config_store = None;
		let (forward, backward) = match &config.storage_root {
			None => (
				Backend::Memory(Trie::new(terminals.clone(), config.default_ngram_length)),
				Backend::Memory(Trie::new(terminals.clone(), config.default_ngram_length)),
			),
			#[cfg(feature = "kv-rocksdb")]
			Some(root) => {
				trace!(?root, "opening persistent bidirectional storage");
				let store = ConfigStore::open(root.join("config"))?;
				match store.default_ngram_length()? {
					Some(persisted) => config.default_ngram_length = persisted,
					None => store.set_default_ngram_length(config.default_ngram_length)?,
				}
				config_store = Some(store);
				(
					Backend::Persistent(PersistentTrie::open(root.join("fwd"))?),
					Backend::Persistent(PersistentTrie::open(root.join("bwd"))?),
				)
			}
			#[cfg(not(feature = "kv-rocksdb"))]
			Some(_) => {
				return Err(crate::error::Error::Storage(
					"a storage root was configured but this crate was built without the `kv-rocksdb` feature".into(),
				))
			}
		};
		Ok(BidirectionalStorage {
			forward,
			backward,
			symbols,
			terminals,
			config,
			#[cfg(feature = "kv-rocksdb")]
			config_store,
		})
	}

	pub fn symbols(&self) -> &SymbolTable {
		&self.symbols
	}

	/// Interns `tokens` (creating ids for any not seen before) and returns
	/// them as an id sequence.
	fn intern_all(&mut self, tokens: &[&[u8]]) -> Vec<SymbolId> {
		tokens.iter().map(|t| self.symbols.intern(t)).collect()
	}

	/// Looks up `tokens` without interning; `None` if any token is unknown
	/// (an absent path).
	fn lookup_all(&self, tokens: &[&[u8]]) -> Option<Vec<SymbolId>> {
		tokens.iter().map(|t| self.symbols.lookup(t)).collect()
	}

	/// Tokenizes `sentence` into n-gram windows of up to `ngram_length` ids
	/// (the facade default if `None`) starting at every position except
	/// the last, bracketed by the start/end sentence sentinels, and
	/// records `freq` occurrences of each window in both tries. The
	/// backward trie is fed by windowing the independently reversed
	/// sequence, not by reversing each forward window.
	pub fn add_sentence(&mut self, sentence: &[&[u8]], freq: u64, ngram_length: Option<usize>) -> Result<()> {
		let ngram_length = ngram_length.unwrap_or(self.config.default_ngram_length).max(1);
		let mut bracketed: Vec<&[u8]> = Vec::with_capacity(sentence.len() + 2);
		let start_token = self.config.terminals.0.clone();
		let end_token = self.config.terminals.1.clone();
		bracketed.push(&start_token);
		bracketed.extend_from_slice(sentence);
		bracketed.push(&end_token);

		let forward_ids = self.intern_all(&bracketed);
		let backward_ids: Vec<SymbolId> = forward_ids.iter().rev().copied().collect();

		for (start, end) in windows(forward_ids.len(), ngram_length) {
			let window_ids = &forward_ids[start..end];
			let window_tokens: Vec<&[u8]> =
				window_ids.iter().map(|id| self.symbols.resolve(*id).expect("just interned")).collect();
			self.forward.add_ngram(window_ids, &window_tokens, freq)?;
		}
		for (start, end) in windows(backward_ids.len(), ngram_length) {
			let window_ids = &backward_ids[start..end];
			let window_tokens: Vec<&[u8]> =
				window_ids.iter().map(|id| self.symbols.resolve(*id).expect("just interned")).collect();
			self.backward.add_ngram(window_ids, &window_tokens, freq)?;
		}
		Ok(())
	}

	/// Records `freq` occurrences of a single, already-delimited ngram
	/// into both tries (reversed for the backward one).
	pub fn add_ngram(&mut self, tokens: &[&[u8]], freq: u64) -> Result<()> {
		let ids = self.intern_all(tokens);
		self.forward.add_ngram(&ids, tokens, freq)?;
		let reversed_ids: Vec<SymbolId> = ids.iter().rev().copied().collect();
		let reversed_tokens: Vec<&[u8]> = tokens.iter().rev().copied().collect();
		self.backward.add_ngram(&reversed_ids, &reversed_tokens, freq)
	}

	/// The forward trie's occurrence count for `tokens`, or 0 if absent.
	pub fn query_count(&self, tokens: &[&[u8]]) -> Result<u64> {
		match self.lookup_all(tokens) {
			Some(ids) => self.forward.query_count(&ids, tokens),
			None => Ok(0),
		}
	}

	/// The arithmetic mean of the forward and (reversed) backward
	/// entropies, propagating `NaN` from either side.
	pub fn query_entropy(&self, tokens: &[&[u8]]) -> Result<f64> {
		self.combine(tokens, |backend, ids, toks| backend.query_entropy(ids, toks))
	}

	/// The arithmetic mean of the forward and (reversed) backward entropy
	/// variations, propagating `NaN` from either side.
	pub fn query_ev(&self, tokens: &[&[u8]]) -> Result<f64> {
		self.combine(tokens, |backend, ids, toks| backend.query_ev(ids, toks))
	}

	/// The arithmetic mean of the forward and (reversed) backward
	/// autonomy z-scores, propagating `NaN` from either side.
	pub fn query_autonomy(&self, tokens: &[&[u8]]) -> Result<f64> {
		self.combine(tokens, |backend, ids, toks| backend.query_autonomy(ids, toks))
	}

	fn combine(
		&self,
		tokens: &[&[u8]],
		query: impl Fn(&Backend, &[SymbolId], &[&[u8]]) -> Result<f64>,
	) -> Result<f64> {
		let Some(ids) = self.lookup_all(tokens) else {
			return Ok(f64::NAN);
		};
		let forward_value = query(&self.forward, &ids, tokens)?;
		let reversed_ids: Vec<SymbolId> = ids.iter().rev().copied().collect();
		let reversed_tokens: Vec<&[u8]> = tokens.iter().rev().copied().collect();
		let backward_value = query(&self.backward, &reversed_ids, &reversed_tokens)?;
		Ok((forward_value + backward_value) / 2.0)
	}

	/// Recomputes normalization statistics on both tries.
	pub fn update_stats(&self) -> Result<()> {
		self.forward.update_stats()?;
		self.backward.update_stats()
	}

	/// Clears both tries. The symbol table is left intact: vocabulary
	/// identity is not part of what `clear` resets.
	pub fn clear(&mut self) -> Result<()> {
		self.forward.clear()?;
		self.backward.clear()
	}

	pub fn terminals(&self) -> &hashbrown::HashSet<SymbolId> {
		&self.terminals
	}

	/// Releases both tries and the config store (persistent variant only).
	/// A no-op for the in-memory backend beyond dropping `self`.
	pub fn close(self) -> Result<()> {
		debug!(persistent = self.config.storage_root.is_some(), "closing bidirectional storage");
		self.forward.close()?;
		self.backward.close()?;
		#[cfg(feature = "kv-rocksdb")]
		if let Some(store) = self.config_store {
			store.close()?;
		}
		Ok(())
	}
}

/// The `(start, end)` bounds of every window of up to `ngram_length`
/// tokens starting at each position in a sequence of length `len`,
/// excluding the final position (a start position there would only ever
/// produce the sequence's own trailing sentinel as a standalone unigram).
fn windows(len: usize, ngram_length: usize) -> impl Iterator<Item = (usize, usize)> {
	(0..len.saturating_sub(1)).map(move |start| {
		let end = (start + ngram_length).min(len);
		(start, end)
	})
}

#[cfg(test)]
mod window_tests {
	use test_log::test;

	use super::*;

	#[test]
	fn windows_stop_one_short_of_the_final_position() {
		// sequence length 5, ngram_length 3: starts 0..=3, never 4.
		assert_eq!(windows(5, 3).collect::<Vec<_>>(), vec![(0, 3), (1, 4), (2, 5), (3, 5)]);
	}

	#[test]
	fn window_longer_than_sequence_is_capped() {
		assert_eq!(windows(3, 10).collect::<Vec<_>>(), vec![(0, 3), (1, 3)]);
	}

	#[test]
	fn empty_and_singleton_sequences_yield_no_windows() {
		assert_eq!(windows(0, 3).collect::<Vec<_>>(), vec![]);
		assert_eq!(windows(1, 3).collect::<Vec<_>>(), vec![]);
	}
}
