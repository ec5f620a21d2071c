use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::{BatchPlan, Error, Result, ScanFilters};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
	Pending,
	Running,
	Complete,
	Failed,
	/// Never persisted. Reported for a record read after its `expires_at`.
	Expired,
}
impl ScanStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Running => "running",
			Self::Complete => "complete",
			Self::Failed => "failed",
			Self::Expired => "expired",
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Complete | Self::Failed | Self::Expired)
	}

	fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Pending, Self::Running)
				| (Self::Running, Self::Complete)
				| (Self::Running, Self::Failed)
		)
	}
}

impl fmt::Display for ScanStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
	pub item_id: String,
	pub score: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub constraint: Option<f64>,
	pub matched_attributes: Value,
	#[serde(with = "crate::time_serde")]
	pub evaluated_at: OffsetDateTime,
}

/// What the executor observed over one slice, before it is folded into the session.
#[derive(Debug, Default)]
pub struct BatchOutcome {
	pub attempted: usize,
	/// Accepted records in candidate order. The session truncates them to the result cap.
	pub matches: Vec<ResultRecord>,
	/// Items never evaluated: soft deadline passed or result cap already reached.
	pub skipped: usize,
	pub failed: usize,
	pub timed_out: usize,
	pub elapsed_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
	pub batch: usize,
	pub processed_in_batch: usize,
	pub found_in_batch: usize,
	pub skipped_in_batch: usize,
	pub failed_in_batch: usize,
	pub timed_out_in_batch: usize,
	pub cumulative_found: usize,
	pub percentage: f64,
	pub elapsed_ms: u64,
}

/// The unit of resumable work. Everything a later invocation needs lives in this record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
	pub id: String,
	pub status: ScanStatus,
	pub filters: ScanFilters,
	pub cursor: usize,
	pub total_items: usize,
	pub batch_size: usize,
	pub total_batches: usize,
	pub current_batch_index: usize,
	pub matches: Vec<ResultRecord>,
	/// Candidate ids as listed when the scan started.
	pub candidates: Vec<String>,
	pub version: u64,
	#[serde(default, with = "crate::time_serde::option")]
	pub lease_until: Option<OffsetDateTime>,
	#[serde(default)]
	pub last_batch: Option<BatchSummary>,
	#[serde(default)]
	pub failure: Option<String>,
	pub ttl_seconds: u64,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub expires_at: OffsetDateTime,
}
impl ScanSession {
	pub fn new(
		id: String,
		filters: ScanFilters,
		candidates: Vec<String>,
		batch_size: usize,
		ttl_seconds: u64,
		now: OffsetDateTime,
	) -> Result<Self> {
		let plan = BatchPlan::new(candidates.len(), batch_size)?;

		Ok(Self {
			id,
			status: ScanStatus::Pending,
			filters,
			cursor: 0,
			total_items: plan.total_items,
			batch_size: plan.batch_size,
			total_batches: plan.total_batches,
			current_batch_index: 0,
			matches: Vec::new(),
			candidates,
			version: 0,
			lease_until: None,
			last_batch: None,
			failure: None,
			ttl_seconds,
			created_at: now,
			updated_at: now,
			expires_at: now + ttl(ttl_seconds),
		})
	}

	pub fn plan(&self) -> BatchPlan {
		BatchPlan {
			total_items: self.total_items,
			batch_size: self.batch_size,
			total_batches: self.total_batches,
		}
	}

	pub fn transition(&mut self, next: ScanStatus) -> Result<()> {
		if !self.status.can_transition_to(next) {
			return Err(Error::InvalidTransition { from: self.status, to: next });
		}

		self.status = next;

		Ok(())
	}

	/// Moves a session with nothing left to scan straight to `complete`.
	pub fn complete_if_exhausted(&mut self) -> Result<()> {
		if self.status == ScanStatus::Running && !self.has_more() {
			self.transition(ScanStatus::Complete)?;
		}

		Ok(())
	}

	pub fn next_slice(&self) -> Range<usize> {
		self.plan().slice(self.cursor)
	}

	pub fn pending_items(&self) -> &[String] {
		&self.candidates[self.next_slice()]
	}

	pub fn remaining_capacity(&self) -> Option<usize> {
		self.filters.remaining(self.matches.len())
	}

	pub fn has_more(&self) -> bool {
		self.cursor < self.total_items
	}

	pub fn is_complete(&self) -> bool {
		self.status == ScanStatus::Complete
	}

	/// Share of the candidate list already covered, rounded to one decimal.
	pub fn percentage(&self) -> f64 {
		if self.total_items == 0 {
			return 100.0;
		}

		let ratio = self.cursor as f64 / self.total_items as f64;

		(ratio * 1_000.0).round() / 10.0
	}

	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	pub fn lease_active(&self, now: OffsetDateTime) -> bool {
		self.lease_until.map(|until| until > now).unwrap_or(false)
	}

	/// Takes the continuation lease and bumps the optimistic-concurrency version.
	pub fn claim(&mut self, now: OffsetDateTime, lease: Duration) -> Result<()> {
		if self.status != ScanStatus::Running {
			return Err(Error::Inconsistent {
				message: format!("only running scans can be claimed, this one is {}", self.status),
			});
		}

		let lease_until = now.checked_add(lease).ok_or_else(|| Error::Inconsistent {
			message: format!("lease of {lease} ends outside the representable time range"),
		})?;

		self.version += 1;
		self.lease_until = Some(lease_until);

		self.touch(now);

		Ok(())
	}

	pub fn release(&mut self) {
		self.lease_until = None;
	}

	pub fn touch(&mut self, now: OffsetDateTime) {
		self.updated_at = now;
		self.expires_at = now + ttl(self.ttl_seconds);
	}

	/// Folds one executed slice into the session and advances the cursor past all of it.
	pub fn record_batch(
		&mut self,
		outcome: BatchOutcome,
		now: OffsetDateTime,
	) -> Result<BatchSummary> {
		if self.status != ScanStatus::Running {
			return Err(Error::Inconsistent {
				message: format!("cannot record a batch on a {} scan", self.status),
			});
		}

		let slice = self.next_slice();

		if slice.is_empty() {
			return Err(Error::Inconsistent {
				message: "no items left to record a batch for".to_string(),
			});
		}
		if outcome.attempted != slice.len() {
			return Err(Error::Inconsistent {
				message: format!(
					"batch attempted {} items but the slice holds {}",
					outcome.attempted,
					slice.len()
				),
			});
		}

		let keep = self.remaining_capacity().unwrap_or(usize::MAX);
		let before = self.matches.len();

		self.matches.extend(outcome.matches.into_iter().take(keep));

		self.cursor = slice.end;
		self.current_batch_index += 1;

		if !self.has_more() {
			self.transition(ScanStatus::Complete)?;
		}

		let summary = BatchSummary {
			batch: self.current_batch_index,
			processed_in_batch: outcome.attempted,
			found_in_batch: self.matches.len() - before,
			skipped_in_batch: outcome.skipped,
			failed_in_batch: outcome.failed,
			timed_out_in_batch: outcome.timed_out,
			cumulative_found: self.matches.len(),
			percentage: self.percentage(),
			elapsed_ms: outcome.elapsed_ms,
		};

		self.last_batch = Some(summary.clone());

		self.touch(now);

		Ok(summary)
	}

	pub fn fail(&mut self, reason: impl Into<String>, now: OffsetDateTime) -> Result<()> {
		self.transition(ScanStatus::Failed)?;

		self.failure = Some(reason.into());
		self.lease_until = None;

		self.touch(now);

		Ok(())
	}

	/// Checks the invariants a decoded record must satisfy before a batch may run on it.
	pub fn check_consistency(&self) -> Result<()> {
		let inconsistent = |message: String| Err(Error::Inconsistent { message });

		if self.candidates.len() != self.total_items {
			return inconsistent(format!(
				"candidate snapshot holds {} items but total_items is {}",
				self.candidates.len(),
				self.total_items
			));
		}
		if self.cursor > self.total_items {
			return inconsistent(format!(
				"cursor {} is past total_items {}",
				self.cursor, self.total_items
			));
		}
		if self.batch_size == 0 || self.total_batches != self.total_items.div_ceil(self.batch_size)
		{
			return inconsistent("batch plan does not match total_items".to_string());
		}
		if self.current_batch_index > self.total_batches {
			return inconsistent(format!(
				"batch index {} exceeds total_batches {}",
				self.current_batch_index, self.total_batches
			));
		}

		Ok(())
	}
}

// Ten years; keeps `now + ttl` far from the `OffsetDateTime` range limit.
/// Ten years. Longer session TTLs are clamped to this.
pub const MAX_TTL_SECONDS: u64 = 315_360_000;

fn ttl(seconds: u64) -> Duration {
	Duration::seconds(seconds.min(MAX_TTL_SECONDS) as i64)
}
