use std::time::Duration;

use futures::{StreamExt, stream};
use time::OffsetDateTime;
use tokio::time::Instant;

use sift_domain::{BatchOutcome, ResultRecord, ScanFilters, ScanSession};

use crate::{Evaluation, ScanService};

/// Time an invocation may still spend on item evaluation.
#[derive(Clone, Copy, Debug)]
pub struct BatchBudget {
	deadline: Instant,
	item_timeout: Duration,
}
impl BatchBudget {
	/// Soft deadline at `started + invocation_limit - persist_margin`.
	pub fn new(started: Instant, scan: &sift_config::Scan) -> Self {
		Self {
			deadline: started + Duration::from_millis(scan.soft_deadline_ms()),
			item_timeout: Duration::from_millis(scan.item_timeout_ms),
		}
	}

	/// The timeout for an item starting at `now`, or `None` once the deadline has passed.
	pub fn item_timeout(&self, now: Instant) -> Option<Duration> {
		let remaining = self.deadline.saturating_duration_since(now);

		if remaining.is_zero() {
			return None;
		}

		Some(remaining.min(self.item_timeout))
	}
}

/// Why a single item produced nothing. Absorbed by the executor; never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ItemEvaluationError {
	#[error("timed out after {0} ms")]
	Timeout(u128),
	#[error("provider failed: {0}")]
	Provider(#[from] sift_providers::Error),
	#[error("incomplete evaluation: {0}")]
	Partial(&'static str),
}

enum ItemOutcome {
	Matched(ResultRecord),
	Rejected,
	Skipped,
	Failed,
	TimedOut,
}

impl ScanService {
	/// Evaluates the next slice of `session` without touching the session itself.
	pub(crate) async fn run_batch(&self, session: &ScanSession, started: Instant) -> BatchOutcome {
		let items = session.pending_items();
		let batch_started = Instant::now();

		if session.remaining_capacity() == Some(0) {
			tracing::debug!(
				scan_id = %session.id,
				items = items.len(),
				"Result cap reached. Advancing without evaluation."
			);

			return BatchOutcome { attempted: items.len(), skipped: items.len(), ..Default::default() };
		}

		let budget = BatchBudget::new(started, &self.cfg.scan);
		let filters = session.filters;
		let concurrency = (self.cfg.scan.concurrency as usize).max(1);
		// Collected up front: a stream closure over borrowed ids makes callers' futures non-`Send`.
		let evaluations = items
			.iter()
			.map(|item_id| self.evaluate_item(&session.id, item_id, &filters, &budget))
			.collect::<Vec<_>>();
		let outcomes: Vec<ItemOutcome> =
			stream::iter(evaluations).buffered(concurrency).collect().await;
		let mut outcome = BatchOutcome { attempted: outcomes.len(), ..Default::default() };

		for item in outcomes {
			match item {
				ItemOutcome::Matched(record) => outcome.matches.push(record),
				ItemOutcome::Rejected => {},
				ItemOutcome::Skipped => outcome.skipped += 1,
				ItemOutcome::Failed => outcome.failed += 1,
				ItemOutcome::TimedOut => outcome.timed_out += 1,
			}
		}

		outcome.elapsed_ms = batch_started.elapsed().as_millis() as u64;

		if outcome.skipped > 0 {
			tracing::warn!(
				scan_id = %session.id,
				skipped = outcome.skipped,
				"Soft deadline reached. Remaining items were skipped."
			);
		}

		outcome
	}

	async fn evaluate_item(
		&self,
		scan_id: &str,
		item_id: &str,
		filters: &ScanFilters,
		budget: &BatchBudget,
	) -> ItemOutcome {
		let Some(limit) = budget.item_timeout(Instant::now()) else {
			return ItemOutcome::Skipped;
		};
		let result = match tokio::time::timeout(limit, self.fetch_and_evaluate(item_id)).await {
			Ok(result) => result,
			Err(_) => Err(ItemEvaluationError::Timeout(limit.as_millis())),
		};

		match result {
			Ok(record) if filters.accepts(record.score, record.constraint) => {
				ItemOutcome::Matched(record)
			},
			Ok(_) => ItemOutcome::Rejected,
			Err(err) => {
				tracing::warn!(scan_id, item_id, error = %err, "Item evaluation skipped.");

				match err {
					ItemEvaluationError::Timeout(_) => ItemOutcome::TimedOut,
					_ => ItemOutcome::Failed,
				}
			},
		}
	}

	async fn fetch_and_evaluate(&self, item_id: &str) -> Result<ResultRecord, ItemEvaluationError> {
		let providers = &self.cfg.providers;
		let series = self.providers.candidates.item_series(&providers.candidates, item_id).await?;
		let evaluation =
			self.providers.evaluator.evaluate(&providers.evaluator, item_id, &series).await?;

		into_record(item_id, evaluation)
	}
}

fn into_record(item_id: &str, evaluation: Evaluation) -> Result<ResultRecord, ItemEvaluationError> {
	let Some(score) = evaluation.score else {
		return Err(ItemEvaluationError::Partial("missing score"));
	};

	if !score.is_finite() {
		return Err(ItemEvaluationError::Partial("score is not finite"));
	}

	let Some(matched_attributes) = evaluation.matched_attributes else {
		return Err(ItemEvaluationError::Partial("missing matched_attributes"));
	};

	Ok(ResultRecord {
		item_id: item_id.to_string(),
		score,
		constraint: evaluation.constraint,
		matched_attributes,
		evaluated_at: OffsetDateTime::now_utc(),
	})
}
