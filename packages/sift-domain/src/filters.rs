use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Thresholds a scan applies to every successful evaluation. Immutable once a session exists.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanFilters {
	/// Inclusive lower bound on the evaluator score, in 0.0-1.0.
	pub min_score: f64,
	/// Inclusive upper bound on the evaluator-reported constraint value.
	pub max_constraint: f64,
	/// Optional cap on the number of matches kept for the whole scan.
	pub limit: Option<u32>,
}
impl ScanFilters {
	pub fn new(
		min_score: f64,
		max_constraint: f64,
		limit: Option<u32>,
		max_limit: u32,
	) -> Result<Self> {
		if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
			return Err(Error::InvalidFilters {
				message: "min_score must be in the range 0.0-1.0.".to_string(),
			});
		}
		if !max_constraint.is_finite() || max_constraint <= 0.0 {
			return Err(Error::InvalidFilters {
				message: "max_constraint must be a finite number greater than zero.".to_string(),
			});
		}

		match limit {
			Some(0) => {
				return Err(Error::InvalidFilters {
					message: "limit must be greater than zero when set.".to_string(),
				});
			},
			Some(limit) if limit > max_limit => {
				return Err(Error::InvalidFilters {
					message: format!("limit must be {max_limit} or less."),
				});
			},
			_ => {},
		}

		Ok(Self { min_score, max_constraint, limit })
	}

	/// A missing constraint passes; the evaluator may not report one for every item.
	pub fn accepts(&self, score: f64, constraint: Option<f64>) -> bool {
		if !score.is_finite() || score < self.min_score {
			return false;
		}

		match constraint {
			Some(value) => value.is_finite() && value <= self.max_constraint,
			None => true,
		}
	}

	/// Matches that may still be appended given `found` already kept. `None` means unbounded.
	pub fn remaining(&self, found: usize) -> Option<usize> {
		self.limit.map(|limit| (limit as usize).saturating_sub(found))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn boundaries_are_inclusive() {
		let filters = ScanFilters::new(0.9, 100.0, None, 10).expect("valid filters");

		assert!(filters.accepts(0.9, Some(100.0)));
		assert!(!filters.accepts(0.899, Some(1.0)));
		assert!(!filters.accepts(0.95, Some(100.5)));
		assert!(filters.accepts(0.95, None));
		assert!(!filters.accepts(f64::NAN, None));
	}

	#[test]
	fn remaining_saturates_at_zero() {
		let filters = ScanFilters::new(0.5, 1.0, Some(2), 10).expect("valid filters");

		assert_eq!(filters.remaining(0), Some(2));
		assert_eq!(filters.remaining(5), Some(0));
		assert_eq!(ScanFilters::new(0.5, 1.0, None, 10).expect("valid").remaining(5), None);
	}
}
