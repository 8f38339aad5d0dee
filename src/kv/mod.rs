//! The persistent realization of the entropy trie: the same contract
//! as [`crate::trie::Trie`], backed by an ordered key-value store instead
//! of an in-memory node arena.
//!
//! Every public method here is synchronous — `rocksdb`'s API has no
//! suspension points, and this crate's single-threaded execution model
//! doesn't need any.

#![cfg(feature = "kv-rocksdb")]

pub mod keycodec;

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, trace};

use crate::entropy::shannon_entropy;
use crate::error::{Error, Result};
use crate::symbol::is_terminal_bytes;

/// A single direction's persistent entropy trie.
pub struct PersistentTrie {
	db: DB,
}

/// A write batch that tracks whether it has already been committed and
/// whether it was opened read-only, mirroring the teacher's closed/
/// read-only transaction guards at the much smaller scale this backend
/// actually needs: one atomic commit per logical operation, never reused
/// afterward.
struct Batch {
	inner: WriteBatch,
	finished: bool,
	readonly: bool,
}

impl Batch {
	fn new() -> Self {
		Batch { inner: WriteBatch::default(), finished: false, readonly: false }
	}

	#[cfg(test)]
	fn readonly() -> Self {
		Batch { inner: WriteBatch::default(), finished: false, readonly: true }
	}

	fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
		if self.finished {
			return Err(Error::TxFinished);
		}
		if self.readonly {
			return Err(Error::TxReadonly);
		}
		self.inner.put(key, value);
		Ok(())
	}

	fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<()> {
		if self.finished {
			return Err(Error::TxFinished);
		}
		if self.readonly {
			return Err(Error::TxReadonly);
		}
		self.inner.delete(key);
		Ok(())
	}

	/// Commits the batch atomically against `db`. Once committed, the
	/// batch is consumed; a second `commit` call is rejected rather than
	/// silently rewriting the same keys.
	fn commit(self, db: &DB) -> Result<()> {
		if self.finished {
			return Err(Error::TxFinished);
		}
		db.write(self.inner).map_err(|e| Error::Storage(e.to_string()))
	}
}

/// The key holding the persisted default n-gram length under a
/// [`ConfigStore`]'s `config/` directory.
const DEFAULT_NGRAM_LENGTH_KEY: &[u8] = b"default_ngram_length";

/// The small persistent store backing a bidirectional facade's `config/`
/// subdirectory: today just the default n-gram length, so that
/// reopening a store recovers it without the caller re-supplying it.
pub struct ConfigStore {
	db: DB,
}

impl ConfigStore {
	/// Opens the store rooted at `path`, creating it if absent.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		trace!(?path, "opening config store");
		let mut opts = Options::default();
		opts.create_if_missing(true);
		let db = DB::open(&opts, path).map_err(|e| Error::Storage(e.to_string()))?;
		Ok(ConfigStore { db })
	}

	/// The persisted default n-gram length, or `None` if this store has
	/// never had one written (a freshly created store).
	pub fn default_ngram_length(&self) -> Result<Option<usize>> {
		match self.db.get(DEFAULT_NGRAM_LENGTH_KEY).map_err(|e| Error::Storage(e.to_string()))? {
			Some(bytes) => {
				let arr: [u8; 8] = bytes
					.as_slice()
					.try_into()
					.map_err(|_| Error::CorruptRecord { expected: 8, actual: bytes.len() })?;
				Ok(Some(u64::from_le_bytes(arr) as usize))
			}
			None => Ok(None),
		}
	}

	pub fn set_default_ngram_length(&self, len: usize) -> Result<()> {
		self.db
			.put(DEFAULT_NGRAM_LENGTH_KEY, (len as u64).to_le_bytes())
			.map_err(|e| Error::Storage(e.to_string()))
	}

	/// Flushes and releases the underlying database handle.
	pub fn close(self) -> Result<()> {
		debug!("closing config store");
		self.db.flush().map_err(|e| Error::Storage(e.to_string()))
	}
}

impl PersistentTrie {
	/// Opens the store rooted at `path`, creating it (and any missing
	/// parent directories RocksDB itself needs) if absent.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		trace!(?path, "opening persistent trie store");
		let mut opts = Options::default();
		opts.create_if_missing(true);
		let db = DB::open(&opts, path).map_err(|e| Error::Storage(e.to_string()))?;
		Ok(PersistentTrie { db })
	}

	/// Records `freq` occurrences of the ngram whose tokens are `tokens`,
	/// as a single atomic write batch covering every prefix node touched
	/// (root included), so the sum-of-children-counts invariant holds even
	/// across a crash partway through.
	pub fn add_ngram(&self, tokens: &[&[u8]], freq: u64) -> Result<()> {
		if freq == 0 {
			return Ok(());
		}
		let freq = u32::try_from(freq).map_err(|_| Error::InvariantViolation("freq overflows u32".into()))?;
		let mut batch = Batch::new();
		let mut path = Vec::new();
		for depth in 0..=tokens.len() {
			let key = keycodec::node_key(depth, &path)?;
			let (count, _entropy) = match self.db.get(&key).map_err(|e| Error::Storage(e.to_string()))? {
				Some(bytes) => keycodec::decode_node_record(&bytes)?,
				None => (0, f32::NAN),
			};
			let new_count = count.checked_add(freq).ok_or_else(|| Error::InvariantViolation("node count overflows u32".into()))?;
			// invalidate: a node along the insertion path always had one of
			// its immediate children's counts change (or is itself new).
			batch.put(&key, keycodec::encode_node_record(new_count, f32::NAN))?;
			if depth < tokens.len() {
				path.extend_from_slice(&keycodec::encode_path(std::iter::once(tokens[depth]))?);
			}
		}
		batch.put(keycodec::DIRTY_KEY, [1u8])?;
		batch.commit(&self.db)
	}

	/// The occurrence count of `tokens`, or 0 if the path is absent.
	pub fn query_count(&self, tokens: &[&[u8]]) -> Result<u64> {
		let path = keycodec::encode_path(tokens.iter().copied())?;
		let key = keycodec::node_key(tokens.len(), &path)?;
		match self.db.get(&key).map_err(|e| Error::Storage(e.to_string()))? {
			Some(bytes) => Ok(keycodec::decode_node_record(&bytes)?.0 as u64),
			None => Ok(0),
		}
	}

	/// The entropy of `tokens`'s successor distribution, recomputing and
	/// writing back the cached value if it was stale.
	pub fn query_entropy(&self, tokens: &[&[u8]]) -> Result<f64> {
		let path = keycodec::encode_path(tokens.iter().copied())?;
		let key = keycodec::node_key(tokens.len(), &path)?;
		let Some(bytes) = self.db.get(&key).map_err(|e| Error::Storage(e.to_string()))? else {
			return Ok(f64::NAN);
		};
		let (count, cached) = keycodec::decode_node_record(&bytes)?;
		if !cached.is_nan() {
			return Ok(cached as f64);
		}
		let entropy = self.recompute_entropy(tokens.len(), &path, count as u64)?;
		if !entropy.is_nan() {
			self.db
				.put(&key, keycodec::encode_node_record(count, entropy as f32))
				.map_err(|e| Error::Storage(e.to_string()))?;
		}
		Ok(entropy)
	}

	fn recompute_entropy(&self, depth: usize, path: &[u8], count: u64) -> Result<f64> {
		let (lower, upper) = keycodec::child_range(depth, path)?;
		let iter = self.db.iterator(IteratorMode::From(&lower, Direction::Forward));
		let mut children = Vec::new();
		for item in iter {
			let (key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
			if key.as_ref() >= upper.as_slice() {
				break;
			}
			let (child_count, _) = keycodec::decode_node_record(&value)?;
			// the child's token is everything after `path` and its leading
			// separator byte.
			let token = &key[1 + path.len() + 1..];
			children.push((is_terminal_bytes(token), child_count as u64));
		}
		Ok(shannon_entropy(count, children.into_iter()))
	}

	/// The entropy variation of `tokens` against its parent prefix.
	pub fn query_ev(&self, tokens: &[&[u8]]) -> Result<f64> {
		if tokens.is_empty() {
			return Ok(f64::NAN);
		}
		let node_h = self.query_entropy(tokens)?;
		let parent_h = self.query_entropy(&tokens[..tokens.len() - 1])?;
		if node_h == 0.0 && parent_h == 0.0 {
			return Ok(f64::NAN);
		}
		Ok(node_h - parent_h)
	}

	/// The length-normalized autonomy z-score of `tokens`, recomputing
	/// normalization statistics first if the store is dirty.
	pub fn query_autonomy(&self, tokens: &[&[u8]]) -> Result<f64> {
		if self.is_dirty()? {
			self.update_stats()?;
		}
		let ev = self.query_ev(tokens)?;
		if ev.is_nan() {
			return Ok(f64::NAN);
		}
		let key = keycodec::normalization_key(tokens.len())?;
		let Some(bytes) = self.db.get(key).map_err(|e| Error::Storage(e.to_string()))? else {
			return Ok(f64::NAN);
		};
		let (mean, stdev) = keycodec::decode_norm_record(&bytes)?;
		if stdev == 0.0 {
			return Ok(f64::NAN);
		}
		Ok((ev - mean as f64) / stdev as f64)
	}

	pub fn is_dirty(&self) -> Result<bool> {
		Ok(self.db.get(keycodec::DIRTY_KEY).map_err(|e| Error::Storage(e.to_string()))?.is_some())
	}

	/// Recomputes per-depth normalization statistics with a depth-first
	/// walk driven by range scans, then clears the dirty flag. A no-op if
	/// the store is already clean.
	pub fn update_stats(&self) -> Result<()> {
		if !self.is_dirty()? {
			return Ok(());
		}
		debug!("update_stats: entering");
		let mut accumulators: hashbrown::HashMap<usize, crate::normalization::NormEntry> = hashbrown::HashMap::new();
		self.update_stats_rec(0, &[], f64::NAN, true, &mut accumulators)?;
		let mut batch = Batch::new();
		for (depth, entry) in &accumulators {
			let key = keycodec::normalization_key(*depth)?;
			batch.put(key, keycodec::encode_norm_record(entry.mean() as f32, entry.stdev() as f32))?;
		}
		batch.delete(keycodec::DIRTY_KEY)?;
		batch.commit(&self.db)?;
		debug!(depths = accumulators.len(), "update_stats: leaving");
		self.db.compact_range::<&[u8], &[u8]>(None, None);
		Ok(())
	}

	fn update_stats_rec(
		&self,
		depth: usize,
		path: &[u8],
		parent_entropy: f64,
		is_root: bool,
		accumulators: &mut hashbrown::HashMap<usize, crate::normalization::NormEntry>,
	) -> Result<()> {
		let key = keycodec::node_key(depth, path)?;
		let bytes = self.db.get(&key).map_err(|e| Error::Storage(e.to_string()))?.ok_or_else(|| {
			Error::InvariantViolation(format!("node at depth {depth} vanished mid-walk"))
		})?;
		let (count, _) = keycodec::decode_node_record(&bytes)?;
		let entropy = self.recompute_entropy(depth, path, count as u64)?;
		self.db
			.put(&key, keycodec::encode_node_record(count, entropy as f32))
			.map_err(|e| Error::Storage(e.to_string()))?;

		if !is_root && !entropy.is_nan() && (entropy != 0.0 || parent_entropy != 0.0) {
			let ev = entropy - parent_entropy;
			accumulators.entry(depth).or_default().update(ev);
		}

		let (lower, upper) = keycodec::child_range(depth, path)?;
		let iter = self.db.iterator(IteratorMode::From(&lower, Direction::Forward));
		let mut child_paths = Vec::new();
		for item in iter {
			let (key, _) = item.map_err(|e| Error::Storage(e.to_string()))?;
			if key.as_ref() >= upper.as_slice() {
				break;
			}
			child_paths.push(key[1..].to_vec());
		}
		for child_path in child_paths {
			self.update_stats_rec(depth + 1, &child_path, entropy, false, accumulators)?;
		}
		Ok(())
	}

	/// Drops every stored node and normalization record, leaving the store
	/// dirty. Implemented by dropping and recreating the column family's
	/// backing files is unnecessary here: a full-range delete suffices.
	pub fn clear(&self) -> Result<()> {
		debug!("clearing persistent trie");
		let mut batch = Batch::new();
		let iter = self.db.iterator(IteratorMode::Start);
		for item in iter {
			let (key, _) = item.map_err(|e| Error::Storage(e.to_string()))?;
			batch.delete(&key)?;
		}
		batch.put(keycodec::DIRTY_KEY, [1u8])?;
		batch.commit(&self.db)
	}

	/// Flushes and releases the underlying database handle.
	pub fn close(self) -> Result<()> {
		debug!("closing persistent trie store");
		self.db.flush().map_err(|e| Error::Storage(e.to_string()))?;
		Ok(())
	}
}
