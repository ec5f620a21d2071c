use std::time::Duration;

use sift_service::{ResultsResponse, StartScanRequest};

use crate::{Error, Result, client::ScanClient};

const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
	Complete,
	/// The retry budget ran out. The scan stays resumable until its TTL expires.
	Exhausted,
}

#[derive(Debug)]
pub struct PollReport {
	pub scan_id: String,
	pub outcome: PollOutcome,
	/// Continuation calls made, successful or not.
	pub attempts: u32,
	/// Matches at the time polling stopped. `None` if they could not be fetched.
	pub results: Option<ResultsResponse>,
}

#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
	pub min_delay: Duration,
	pub max_attempts: u32,
	pub busy_backoff: Duration,
	pub max_backoff: Duration,
}
impl From<&sift_config::Poller> for PollSettings {
	fn from(cfg: &sift_config::Poller) -> Self {
		Self {
			min_delay: Duration::from_millis(cfg.min_delay_ms),
			max_attempts: cfg.max_attempts,
			busy_backoff: Duration::from_millis(cfg.busy_backoff_ms),
			max_backoff: Duration::from_millis(cfg.max_backoff_ms),
		}
	}
}

/// Drives a scan by calling `continue_scan` until it completes or the budget runs out.
pub struct Poller<C> {
	client: C,
	settings: PollSettings,
}
impl<C> Poller<C>
where
	C: ScanClient,
{
	pub fn new(client: C, cfg: &sift_config::Poller) -> Self {
		Self::with_settings(client, PollSettings::from(cfg))
	}

	pub fn with_settings(client: C, settings: PollSettings) -> Self {
		Self { client, settings }
	}

	pub async fn start(&self, req: StartScanRequest) -> Result<PollReport> {
		let started = self.client.start(&req).await?;

		tracing::info!(
			scan_id = %started.scan_id,
			total_batches = started.total_batches,
			found = started.progress.found,
			"{}",
			started.message
		);

		self.drive(started.scan_id, started.has_more).await
	}

	pub async fn resume(&self, scan_id: String) -> Result<PollReport> {
		tracing::info!(%scan_id, "Resuming scan.");

		self.drive(scan_id, true).await
	}

	async fn drive(&self, scan_id: String, mut has_more: bool) -> Result<PollReport> {
		let mut attempts = 0;
		let mut failures = 0;
		let mut delay = self.settings.min_delay;

		while has_more {
			if attempts >= self.settings.max_attempts {
				let results = self.fetch_results(&scan_id).await;

				return Ok(PollReport { scan_id, outcome: PollOutcome::Exhausted, attempts, results });
			}

			tokio::time::sleep(delay).await;

			attempts += 1;

			match self.client.continue_scan(&scan_id).await {
				Ok(res) => {
					failures = 0;
					delay = self.settings.min_delay;
					has_more = res.has_more && !res.is_complete;

					tracing::info!(
						%scan_id,
						batch = res.batch,
						total_batches = res.total_batches,
						percentage = res.progress.percentage,
						found = res.progress.found,
						"{}",
						res.message
					);
				},
				Err(err) if err.is_retryable() => {
					failures += 1;
					delay = retry_delay(&self.settings, failures, &err);

					tracing::warn!(%scan_id, attempts, error = %err, ?delay, "Continuation failed. Backing off.");
				},
				Err(err) => {
					tracing::error!(%scan_id, error = %err, "Scan cannot be continued.");

					return Err(err);
				},
			}
		}

		let results = self.fetch_results(&scan_id).await;

		Ok(PollReport { scan_id, outcome: PollOutcome::Complete, attempts, results })
	}

	async fn fetch_results(&self, scan_id: &str) -> Option<ResultsResponse> {
		match self.client.results(scan_id).await {
			Ok(results) => Some(results),
			Err(err) => {
				tracing::warn!(%scan_id, error = %err, "Failed to fetch results.");

				None
			},
		}
	}
}

/// `busy_backoff * 2^(failures - 1)`, capped at `max_backoff`.
pub fn backoff_for_failure(settings: &PollSettings, failures: u32) -> Duration {
	let exp = failures.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
	let base = settings.busy_backoff.saturating_mul(1 << exp);

	base.min(settings.max_backoff)
}

/// Backoff for a retryable failure. A server `Retry-After` wins over the cap.
pub fn retry_delay(settings: &PollSettings, failures: u32, err: &Error) -> Duration {
	let delay = backoff_for_failure(settings, failures);

	match err {
		Error::Busy { retry_after_secs: Some(secs), .. } => delay.max(Duration::from_secs(*secs)),
		_ => delay,
	}
}
