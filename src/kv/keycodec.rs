//! Byte-level key and record layout for the persistent backend.
//!
//! Everything here operates on raw token bytes, not [`crate::symbol::SymbolId`]s:
//! the persistent representation is a separate, independently addressable
//! view of the same contract, and has no need for the in-memory symbol
//! table once a caller has resolved a path's tokens.

use crate::error::{Error, Result};

/// Fixed width of an encoded node record: `count` (4 bytes) + `entropy` (4
/// bytes).
pub const NODE_RECORD_LEN: usize = 8;

/// Reserved first byte for normalization and dirty-flag keys. No node key
/// collides with this, because node depths are bounded to 0..=255 and a
/// depth byte of 0xFF would require 255 levels of nesting *and* happen to
/// be the reserved marker — ruled out by [`NgramTooLong`](Error::NgramTooLong).
const RESERVED_PREFIX: u8 = 0xFF;

/// The key marking the trie dirty when present. Shares its byte pattern
/// with the depth-0 normalization key, which is never written: depth 0 is
/// the root, and `update_stats` never folds an observation in at the root,
/// so that slot is permanently free for reuse here.
pub const DIRTY_KEY: [u8; 2] = [RESERVED_PREFIX, 0x00];

/// Encodes the path to a node at `depth` as the 0x00-separated
/// concatenation of its tokens' bytes. `depth` is always `path.len()`; it
/// is taken separately so callers can build this once per ngram and reuse
/// prefixes for each depth along it.
pub fn encode_path<'a>(tokens: impl Iterator<Item = &'a [u8]>) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	for token in tokens {
		if token.contains(&0x00) {
			return Err(Error::ReservedByteInToken);
		}
		buf.push(0x00);
		buf.extend_from_slice(token);
	}
	Ok(buf)
}

/// The storage key for the node at `depth` reached by `path` (as produced
/// by [`encode_path`]).
pub fn node_key(depth: usize, path: &[u8]) -> Result<Vec<u8>> {
	let depth_byte = depth_byte(depth)?;
	let mut key = Vec::with_capacity(1 + path.len());
	key.push(depth_byte);
	key.extend_from_slice(path);
	Ok(key)
}

/// The half-open `[lower, upper)` key range covering exactly the direct
/// children of the node at `depth` whose path is `parent_path` — a single
/// ordered range scan.
pub fn child_range(depth: usize, parent_path: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
	let child_depth_byte = depth_byte(depth + 1)?;
	let mut lower = Vec::with_capacity(2 + parent_path.len());
	lower.push(child_depth_byte);
	lower.extend_from_slice(parent_path);
	lower.push(0x00);
	let mut upper = lower.clone();
	*upper.last_mut().expect("lower always ends with the separator byte") = 0x01;
	Ok((lower, upper))
}

/// The per-depth normalization record key.
pub fn normalization_key(depth: usize) -> Result<[u8; 2]> {
	Ok([RESERVED_PREFIX, depth_byte(depth)?])
}

fn depth_byte(depth: usize) -> Result<u8> {
	u8::try_from(depth).map_err(|_| Error::NgramTooLong(depth))
}

/// Packs `(count, entropy)` into the fixed-width record format.
pub fn encode_node_record(count: u32, entropy: f32) -> [u8; NODE_RECORD_LEN] {
	let mut buf = [0u8; NODE_RECORD_LEN];
	buf[0..4].copy_from_slice(&count.to_le_bytes());
	buf[4..8].copy_from_slice(&entropy.to_le_bytes());
	buf
}

/// Unpacks a node record, rejecting anything not exactly
/// [`NODE_RECORD_LEN`] bytes wide.
pub fn decode_node_record(bytes: &[u8]) -> Result<(u32, f32)> {
	if bytes.len() != NODE_RECORD_LEN {
		return Err(Error::CorruptRecord {
			expected: NODE_RECORD_LEN,
			actual: bytes.len(),
		});
	}
	let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
	let entropy = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
	Ok((count, entropy))
}

/// Packs a `(mean, stdev)` normalization record.
pub fn encode_norm_record(mean: f32, stdev: f32) -> [u8; 8] {
	let mut buf = [0u8; 8];
	buf[0..4].copy_from_slice(&mean.to_le_bytes());
	buf[4..8].copy_from_slice(&stdev.to_le_bytes());
	buf
}

/// Unpacks a `(mean, stdev)` normalization record.
pub fn decode_norm_record(bytes: &[u8]) -> Result<(f32, f32)> {
	if bytes.len() != 8 {
		return Err(Error::CorruptRecord { expected: 8, actual: bytes.len() });
	}
	let mean = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
	let stdev = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
	Ok((mean, stdev))
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;

	#[test]
	fn root_key_is_single_zero_byte() {
		let path = encode_path(std::iter::empty()).unwrap();
		assert_eq!(node_key(0, &path).unwrap(), vec![0u8]);
	}

	#[test]
	fn path_encoding_separates_tokens() {
		let path = encode_path([b"a".as_slice(), b"bc".as_slice()].into_iter()).unwrap();
		assert_eq!(path, vec![0x00, b'a', 0x00, b'b', b'c']);
	}

	#[test]
	fn reserved_byte_in_token_is_rejected() {
		let err = encode_path([b"a\x00b".as_slice()].into_iter()).unwrap_err();
		assert!(matches!(err, Error::ReservedByteInToken));
	}

	#[test]
	fn child_range_brackets_all_children_of_one_parent() {
		let parent_path = encode_path([b"a".as_slice()].into_iter()).unwrap();
		let (lower, upper) = child_range(1, &parent_path).unwrap();
		let child_path = encode_path([b"a".as_slice(), b"zzzz".as_slice()].into_iter()).unwrap();
		let child_key = node_key(2, &child_path).unwrap();
		assert!(child_key.as_slice() >= lower.as_slice());
		assert!(child_key.as_slice() < upper.as_slice());

		// a sibling of "a" (e.g. "b") at depth 1 must fall outside the range.
		let sibling_path = encode_path([b"b".as_slice()].into_iter()).unwrap();
		let sibling_key = node_key(1, &sibling_path).unwrap();
		assert!(sibling_key.as_slice() < lower.as_slice() || sibling_key.as_slice() >= upper.as_slice());
	}

	#[test]
	fn node_record_round_trips() {
		let bytes = encode_node_record(42, 1.5);
		assert_eq!(decode_node_record(&bytes).unwrap(), (42, 1.5));
	}

	#[test]
	fn corrupt_record_is_rejected() {
		let err = decode_node_record(&[0u8; 4]).unwrap_err();
		assert!(matches!(err, Error::CorruptRecord { expected: 8, actual: 4 }));
	}

	#[test]
	fn dirty_key_reuses_depth_zero_normalization_slot() {
		assert_eq!(normalization_key(0).unwrap(), DIRTY_KEY);
	}
}
