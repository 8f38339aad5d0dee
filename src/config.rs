//! Configuration for the storage facade, supplied directly by the
//! embedding caller — this crate parses no CLI arguments and reads no
//! environment variables itself.

use std::path::PathBuf;

/// The n-gram length used by [`crate::bidi::BidirectionalStorage::add_sentence`]
/// when a caller doesn't override it per call.
pub const DEFAULT_NGRAM_LENGTH: usize = 5;

/// Construction parameters for a [`crate::trie::Trie`] pair or a
/// [`crate::bidi::BidirectionalStorage`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrieConfig {
	/// Root directory for the persistent backend's `fwd/`, `bwd/`, and
	/// `config/` subdirectories. `None` selects the in-memory backend.
	pub storage_root: Option<PathBuf>,
	/// The default n-gram window length for `add_sentence`.
	pub default_ngram_length: usize,
	/// The sentence-boundary sentinel tokens, as raw bytes, in the order
	/// (start, end). Defaults to the two Private Use Area sentinels in
	/// [`crate::symbol`].
	pub terminals: (Vec<u8>, Vec<u8>),
}

impl TrieConfig {
	/// An in-memory configuration with the default n-gram length and the
	/// standard sentence sentinels.
	pub fn in_memory() -> Self {
		TrieConfig {
			storage_root: None,
			default_ngram_length: DEFAULT_NGRAM_LENGTH,
			terminals: (
				crate::symbol::SENTENCE_START.as_bytes().to_vec(),
				crate::symbol::SENTENCE_END.as_bytes().to_vec(),
			),
		}
	}

	/// A persistent configuration rooted at `path`, otherwise matching
	/// [`TrieConfig::in_memory`].
	pub fn persistent(path: impl Into<PathBuf>) -> Self {
		TrieConfig {
			storage_root: Some(path.into()),
			..Self::in_memory()
		}
	}

	pub fn with_ngram_length(mut self, len: usize) -> Self {
		self.default_ngram_length = len;
		self
	}
}

impl Default for TrieConfig {
	fn default() -> Self {
		Self::in_memory()
	}
}
