use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use sift_domain::{BatchSummary, Progress, ScanFilters, ScanSession, ScanStatus};

use crate::{Error, Result, ScanService};

/// Thresholds omitted here fall back to the configured `[filters]` defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StartScanRequest {
	pub min_score: Option<f64>,
	pub max_constraint: Option<f64>,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartScanResponse {
	pub success: bool,
	pub scan_id: String,
	pub message: String,
	pub progress: Progress,
	pub batch: usize,
	pub total_batches: usize,
	pub has_more: bool,
	pub summary: Option<BatchSummary>,
}

impl ScanService {
	/// Creates a scan, runs its first batch inline, and persists it.
	pub async fn start_scan(&self, req: StartScanRequest) -> Result<StartScanResponse> {
		let started = Instant::now();
		let defaults = &self.cfg.filters;
		let filters = ScanFilters::new(
			req.min_score.unwrap_or(defaults.min_score),
			req.max_constraint.unwrap_or(defaults.max_constraint),
			req.limit,
			self.cfg.scan.max_limit,
		)?;
		let candidates = self
			.providers
			.candidates
			.candidate_list(&self.cfg.providers.candidates)
			.await
			.map_err(|err| {
				tracing::error!(error = %err, "Candidate list is unavailable.");

				Error::from(err)
			})?;
		let mut session = ScanSession::new(
			Uuid::new_v4().to_string(),
			filters,
			candidates,
			self.cfg.scan.batch_size as usize,
			self.cfg.storage.session_ttl_seconds,
			OffsetDateTime::now_utc(),
		)?;

		session.transition(ScanStatus::Running)?;
		session.complete_if_exhausted()?;

		let summary = if session.has_more() {
			let outcome = self.run_batch(&session, started).await;

			Some(session.record_batch(outcome, OffsetDateTime::now_utc())?)
		} else {
			None
		};

		if !self.repo.create(&session).await? {
			return Err(Error::Storage {
				message: format!("Scan id {} is already taken.", session.id),
			});
		}

		tracing::info!(
			scan_id = %session.id,
			total_items = session.total_items,
			total_batches = session.total_batches,
			found = session.matches.len(),
			status = %session.status,
			"Scan started."
		);

		Ok(StartScanResponse {
			success: true,
			scan_id: session.id.clone(),
			message: start_message(&session),
			progress: Progress::from_session(&session, self.cfg.scan.progress_recent_limit as usize),
			batch: session.current_batch_index,
			total_batches: session.total_batches,
			has_more: session.has_more(),
			summary,
		})
	}
}

fn start_message(session: &ScanSession) -> String {
	if session.total_items == 0 {
		return "No candidates to scan.".to_string();
	}
	if session.is_complete() {
		return format!(
			"Scan finished in one batch: {} items scanned, {} found.",
			session.cursor,
			session.matches.len()
		);
	}

	format!(
		"Batch 1/{} done, {} found. Continue to scan the remaining {} items.",
		session.total_batches,
		session.matches.len(),
		session.total_items - session.cursor
	)
}
