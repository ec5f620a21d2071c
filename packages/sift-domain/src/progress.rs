use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{ResultRecord, ScanSession, ScanStatus};

pub const PROGRESS_KIND: &str = "scan";

/// Read-only view of a session as polled by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
	#[serde(rename = "type")]
	pub kind: String,
	pub scan_id: String,
	pub current: usize,
	pub total: usize,
	pub status: ScanStatus,
	pub detail: String,
	pub percentage: f64,
	pub found: usize,
	pub batch: usize,
	pub total_batches: usize,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	/// The latest matches, oldest first.
	#[serde(default)]
	pub recent: Vec<ResultRecord>,
}
impl Progress {
	pub fn from_session(session: &ScanSession, recent_limit: usize) -> Self {
		let skip = session.matches.len().saturating_sub(recent_limit);

		Self {
			kind: PROGRESS_KIND.to_string(),
			scan_id: session.id.clone(),
			current: session.cursor,
			total: session.total_items,
			status: session.status,
			detail: detail(session),
			percentage: session.percentage(),
			found: session.matches.len(),
			batch: session.current_batch_index,
			total_batches: session.total_batches,
			updated_at: session.updated_at,
			recent: session.matches[skip..].to_vec(),
		}
	}
}

fn detail(session: &ScanSession) -> String {
	let found = session.matches.len();

	match session.status {
		ScanStatus::Pending => format!(
			"Preparing to scan {} items in {} batches.",
			session.total_items, session.total_batches
		),
		ScanStatus::Running => format!(
			"Batch {}/{} done, {}/{} items scanned, {found} found so far (waiting for the next batch).",
			session.current_batch_index,
			session.total_batches,
			session.cursor,
			session.total_items,
		),
		ScanStatus::Complete => {
			format!("Scan complete: {} items scanned, {found} found.", session.cursor)
		},
		ScanStatus::Failed => format!(
			"Scan failed after {}/{} items: {}",
			session.cursor,
			session.total_items,
			session.failure.as_deref().unwrap_or("unknown error")
		),
		ScanStatus::Expired => "Scan expired.".to_string(),
	}
}
