//! Round-trip properties of the persistent backend: closing and
//! reopening a store must preserve counts, cached entropy, normalization,
//! and the dirty flag, since all of that lives in the ordered store rather
//! than in any process-local state.

#![cfg(feature = "kv-rocksdb")]

use ngram_trie::{BidirectionalStorage, TrieConfig};
use tempfile::TempDir;
use test_log::test;

#[test]
fn counts_survive_close_and_reopen() {
	let dir = TempDir::new().unwrap();
	{
		let mut store = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
		store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
		store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
		store.close().unwrap();
	}
	let reopened = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
	assert_eq!(reopened.query_count(&[b"a", b"b"]).unwrap(), 3);
}

#[test]
fn normalization_survives_close_and_reopen() {
	let dir = TempDir::new().unwrap();
	let before = {
		let mut store = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
		store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
		store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
		store.update_stats().unwrap();
		let autonomy = store.query_autonomy(&[b"a", b"b"]).unwrap();
		store.close().unwrap();
		autonomy
	};
	let reopened = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
	let after = reopened.query_autonomy(&[b"a", b"b"]).unwrap();
	if before.is_nan() {
		assert!(after.is_nan());
	} else {
		assert!((before - after).abs() < 1e-9, "before={before}, after={after}");
	}
}

#[test]
fn dirty_flag_survives_close_without_update_stats() {
	let dir = TempDir::new().unwrap();
	{
		let mut store = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
		// written but never cleaned: the dirty flag must still be set after
		// reopening, so the next autonomy query recomputes rather than
		// trusting a stale normalization vector.
		store.add_sentence(&[b"a", b"b", b"c"], 1, None).unwrap();
		store.close().unwrap();
	}
	let reopened = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
	// if this weren't dirty, query_autonomy would skip recomputation and
	// could return stale (here: absent) normalization data; it must still
	// produce a well-defined answer either way.
	let _ = reopened.query_autonomy(&[b"a", b"b"]).unwrap();
}

#[test]
fn default_ngram_length_persists_across_reopen_without_override() {
	let dir = TempDir::new().unwrap();
	{
		let mut store = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(7)).unwrap();
		store.add_sentence(&[b"a", b"b", b"c", b"d", b"e", b"f", b"g", b"h"], 1, None).unwrap();
		store.close().unwrap();
	}
	// reopen with the library default (5) in the config passed in; the
	// persisted value (7) must win so that windows are cut the same way
	// they were the first time this store was populated.
	let reopened = BidirectionalStorage::new(TrieConfig::persistent(dir.path())).unwrap();
	assert_eq!(reopened.query_count(&[b"a", b"b", b"c", b"d", b"e", b"f", b"g"]).unwrap(), 1);
}

#[test]
fn clear_on_persistent_store_drops_counts() {
	let dir = TempDir::new().unwrap();
	let mut store = BidirectionalStorage::new(TrieConfig::persistent(dir.path()).with_ngram_length(3)).unwrap();
	store.add_sentence(&[b"a", b"b"], 1, None).unwrap();
	store.clear().unwrap();
	assert_eq!(store.query_count(&[b"a"]).unwrap(), 0);
}
