use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a trie or its backing store can fail.
///
/// Absent-path and undefined-statistic outcomes are *not* represented here:
/// those surface as `0` or `NaN` return values, never as an `Err`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The persistent backend could not be opened, read, or written.
	#[error("storage error: {0}")]
	Storage(String),

	/// A debug invariant (sum-of-counts, monotonic key order, record width)
	/// did not hold where a release build can still detect and report it.
	#[error("invariant violation: {0}")]
	InvariantViolation(String),

	/// An operation was attempted on a transaction/batch that already
	/// committed or rolled back.
	#[error("transaction already finished")]
	TxFinished,

	/// A write was attempted through a read-only transaction/batch.
	#[error("transaction is read-only")]
	TxReadonly,

	/// A stored node record did not have the expected fixed width.
	#[error("corrupt node record: expected {expected} bytes, got {actual}")]
	CorruptRecord { expected: usize, actual: usize },

	/// A token contained a byte that the key encoding reserves as a separator.
	#[error("token contains a reserved 0x00 byte")]
	ReservedByteInToken,

	/// The n-gram exceeds the single-byte depth prefix used by the persistent
	/// key encoding (255).
	#[error("ngram length {0} exceeds the maximum encodable depth (255)")]
	NgramTooLong(usize),
}

impl From<String> for Error {
	fn from(s: String) -> Self {
		Error::Storage(s)
	}
}
