//! The pure Shannon-entropy formula shared by both child-collection
//! backends. Factored out so the in-memory and persistent representations
//! — which disagree on how a "child" is identified (a
//! [`crate::symbol::SymbolId`] versus a raw token byte-string) — still
//! compute the exact same number from the exact same counts.

/// The entropy of a node's successor distribution: `NaN` if `count == 0`
/// or no child has a positive count, otherwise the information-theoretic
/// entropy with terminal successors folded into a single bounded term.
///
/// `children` yields, for each child with a positive count, whether it is
/// terminal and its count.
pub(crate) fn shannon_entropy(count: u64, children: impl Iterator<Item = (bool, u64)>) -> f64 {
	if count == 0 {
		return f64::NAN;
	}
	let count_f = count as f64;
	let mut entropy = 0.0f64;
	let mut has_positive_child = false;
	#[cfg(debug_assertions)]
	let mut sum = 0u64;
	for (is_terminal, child_count) in children {
		if child_count == 0 {
			continue;
		}
		has_positive_child = true;
		#[cfg(debug_assertions)]
		{
			sum += child_count;
		}
		let p = child_count as f64 / count_f;
		if is_terminal {
			entropy += p * count_f.log2();
		} else {
			entropy -= p * p.log2();
		}
	}
	if !has_positive_child {
		return f64::NAN;
	}
	#[cfg(debug_assertions)]
	debug_assert!(
		sum <= count,
		"children sum to {sum}, which exceeds the node count {count}"
	);
	debug_assert!(entropy >= -1e-9, "entropy must be non-negative, got {entropy}");
	entropy.max(0.0)
}
