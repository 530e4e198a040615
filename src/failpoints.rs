//! Single-shot failure injection for integration tests, gated by
//! `IT_ENABLE_FAILPOINTS` (spec §6, §8 scenario 6). A filename armed here
//! raises once, immediately after its claim commits and before any
//! external call, then disarms itself.

use std::sync::OnceLock;

use dashmap::DashSet;

pub const ROLLBACK_AFTER_CLAIM: &str = "IT_FAILPOINT_TX_ROLLBACK_AFTER_CLAIM";

fn armed() -> &'static DashSet<String> {
	static ARMED: OnceLock<DashSet<String>> = OnceLock::new();
	ARMED.get_or_init(DashSet::new)
}

/// Arm `file_name` to fail exactly once on its next claim.
pub fn arm(file_name: &str) {
	armed().insert(file_name.to_string());
}

/// If `file_name` is armed, disarm it and return `true`. Single-shot: a
/// second call for the same name returns `false`.
pub fn fire_if_armed(file_name: &str) -> bool {
	armed().remove(file_name).is_some()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fires_exactly_once() {
		arm("r/a.xlsx");
		assert!(fire_if_armed("r/a.xlsx"));
		assert!(!fire_if_armed("r/a.xlsx"));
	}
}
