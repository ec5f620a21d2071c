use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;

use sift_domain::{BatchSummary, Progress, ScanSession, ScanStatus};
use sift_storage::StoredSession;

use crate::{Error, Result, ScanService};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinueScanRequest {
	pub scan_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinueScanResponse {
	pub success: bool,
	pub scan_id: String,
	pub message: String,
	pub progress: Progress,
	pub batch: usize,
	pub total_batches: usize,
	pub has_more: bool,
	pub is_complete: bool,
	pub summary: Option<BatchSummary>,
}

impl ScanService {
	/// Runs the next batch of an existing scan.
	///
	/// The session is claimed with a compare-and-swap before any work starts and committed with a
	/// second one against the claimed bytes; losing either race yields `Error::Busy` and leaves the
	/// stored record untouched.
	pub async fn continue_scan(&self, req: ContinueScanRequest) -> Result<ContinueScanResponse> {
		let started = Instant::now();
		let stored = self.load_live(&req.scan_id).await?;
		let session = &stored.session;

		if session.status.is_terminal() {
			tracing::debug!(scan_id = %session.id, status = %session.status, "Scan already finished.");

			// A failed scan reports no batch, matching the call that failed it.
			let summary =
				session.last_batch.clone().filter(|_| session.status != ScanStatus::Failed);

			return Ok(self.continue_response(session, summary));
		}
		if let Err(err) = session.check_consistency() {
			return self.fail_inconsistent(&stored, err).await;
		}

		let now = OffsetDateTime::now_utc();

		if let Some(until) = session.lease_until.filter(|until| *until > now) {
			tracing::warn!(scan_id = %session.id, %until, "Scan is leased by another caller.");

			return Err(Error::Busy {
				message: format!("Scan {} is being continued by another caller.", session.id),
				retry_after_secs: (until - now).whole_seconds().max(1) as u64,
			});
		}

		let mut claimed = session.clone();

		claimed.claim(now, self.lease())?;

		let Some(claimed_stored) = self.repo.replace(&stored, &claimed).await? else {
			return Err(busy(&claimed.id));
		};
		let mut next = claimed.clone();
		let summary = if next.has_more() {
			let outcome = self.run_batch(&claimed, started).await;

			Some(next.record_batch(outcome, OffsetDateTime::now_utc())?)
		} else {
			next.complete_if_exhausted()?;

			None
		};

		next.release();

		let Some(committed) = self.repo.replace(&claimed_stored, &next).await? else {
			tracing::warn!(
				scan_id = %next.id,
				version = next.version,
				"Lease lost before commit. Batch discarded."
			);

			return Err(busy(&next.id));
		};

		tracing::info!(
			scan_id = %committed.session.id,
			batch = committed.session.current_batch_index,
			total_batches = committed.session.total_batches,
			found = committed.session.matches.len(),
			version = committed.session.version,
			status = %committed.session.status,
			"Scan batch committed."
		);

		Ok(self.continue_response(&committed.session, summary))
	}

	async fn fail_inconsistent(
		&self,
		stored: &StoredSession,
		err: sift_domain::Error,
	) -> Result<ContinueScanResponse> {
		let mut failed = stored.session.clone();

		tracing::error!(scan_id = %failed.id, error = %err, "Scan record is inconsistent.");

		failed.fail(err.to_string(), OffsetDateTime::now_utc())?;

		let Some(committed) = self.repo.replace(stored, &failed).await? else {
			return Err(busy(&failed.id));
		};

		Ok(self.continue_response(&committed.session, None))
	}

	fn lease(&self) -> time::Duration {
		time::Duration::milliseconds(
			i64::try_from(self.cfg.scan.invocation_limit_ms).unwrap_or(i64::MAX),
		)
	}

	fn continue_response(
		&self,
		session: &ScanSession,
		summary: Option<BatchSummary>,
	) -> ContinueScanResponse {
		let progress =
			Progress::from_session(session, self.cfg.scan.progress_recent_limit as usize);

		ContinueScanResponse {
			success: true,
			scan_id: session.id.clone(),
			message: progress.detail.clone(),
			progress,
			batch: session.current_batch_index,
			total_batches: session.total_batches,
			has_more: session.has_more() && !session.status.is_terminal(),
			is_complete: session.is_complete(),
			summary,
		}
	}
}

fn busy(scan_id: &str) -> Error {
	tracing::warn!(scan_id, "Scan changed concurrently.");

	Error::Busy {
		message: format!("Scan {scan_id} changed while this call was running."),
		retry_after_secs: 1,
	}
}
