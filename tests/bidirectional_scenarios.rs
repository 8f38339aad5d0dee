//! End-to-end scenarios against [`ngram_trie::BidirectionalStorage`], run
//! through the public token-facing API rather than against the internal
//! `SymbolId` representation.
//!
//! `query_entropy`/`query_ev`/`query_autonomy` here average the forward and
//! backward tries, so exact values are covered at the single-`Trie` level
//! (see `src/trie.rs`'s unit tests); these scenarios check the properties
//! the facade itself is responsible for: NaN propagation, forward-only
//! counts, and lazy recomputation.

use ngram_trie::{BidirectionalStorage, TrieConfig};
use test_log::test;

fn storage() -> BidirectionalStorage {
	BidirectionalStorage::new(TrieConfig::in_memory().with_ngram_length(3)).unwrap()
}

#[test]
fn prefix_count_after_one_sentence() {
	let mut store = storage();
	store.add_sentence(&[b"a", b"b", b"c", b"d"], 1, None).unwrap();
	assert_eq!(store.query_count(&[b"a", b"b"]).unwrap(), 1);
}

#[test]
fn count_accumulates_across_sentences() {
	let mut store = storage();
	store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
	store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
	assert_eq!(store.query_count(&[b"a", b"b"]).unwrap(), 3);
}

#[test]
fn entropy_over_two_successor_tokens_is_finite_and_nonnegative() {
	let mut store = storage();
	store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
	store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
	let h = store.query_entropy(&[b"a", b"b"]).unwrap();
	assert!(h.is_finite() && h >= 0.0, "got {h}");
}

#[test]
fn ev_of_a_terminal_only_leaf_is_finite() {
	let mut store = storage();
	store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
	store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
	let ev = store.query_ev(&[b"a", b"b", b"c"]).unwrap();
	assert!(ev.is_finite(), "got {ev}");
}

#[test]
fn entropy_of_an_unseen_token_is_nan() {
	let store = storage();
	assert!(store.query_entropy(&[b"x"]).unwrap().is_nan());
}

#[test]
fn ev_of_an_empty_sequence_is_nan() {
	let store = storage();
	assert!(store.query_ev(&[]).unwrap().is_nan());
}

#[test]
fn clear_drops_every_count() {
	let mut store = storage();
	store.add_sentence(&[b"a"], 1, None).unwrap();
	store.clear().unwrap();
	assert_eq!(store.query_count(&[b"a"]).unwrap(), 0);
}

#[test]
fn query_count_is_forward_only_not_averaged() {
	// the facade's query_count returns the forward trie's count, not an
	// average of forward and backward.
	let mut store = storage();
	store.add_ngram(&[b"a", b"b", b"c"], 5).unwrap();
	assert_eq!(store.query_count(&[b"a", b"b", b"c"]).unwrap(), 5);
}

#[test]
fn repeated_update_stats_is_a_no_op_on_a_clean_store() {
	let mut store = storage();
	store.add_sentence(&[b"a", b"b", b"c"], 2, None).unwrap();
	store.add_sentence(&[b"a", b"b", b"d"], 1, None).unwrap();
	store.update_stats().unwrap();
	let before = store.query_autonomy(&[b"a", b"b"]).unwrap();
	store.update_stats().unwrap();
	let after = store.query_autonomy(&[b"a", b"b"]).unwrap();
	if before.is_nan() {
		assert!(after.is_nan());
	} else {
		assert!((before - after).abs() < 1e-12);
	}
}

#[test]
fn ngram_length_override_widens_a_single_call() {
	let mut store = storage();
	// the facade is configured with length 3; override to 10 for this call.
	store.add_sentence(&[b"a", b"b", b"c", b"d", b"e"], 1, Some(10)).unwrap();
	assert_eq!(store.query_count(&[b"a", b"b", b"c", b"d", b"e"]).unwrap(), 1);
}

#[test]
fn new_tokens_are_interned_and_resolvable() {
	let mut store = storage();
	store.add_sentence(&[b"hello", b"world"], 1, None).unwrap();
	let id = store.symbols().lookup(b"hello").expect("interned by add_sentence");
	assert_eq!(store.symbols().resolve(id), Some(b"hello".as_slice()));
}
