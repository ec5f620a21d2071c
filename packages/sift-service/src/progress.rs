use serde::{Deserialize, Serialize};

use sift_domain::Progress;

use crate::{Result, ScanService};

#[derive(Clone, Debug, Deserialize)]
pub struct ProgressRequest {
	pub scan_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
	pub success: bool,
	pub progress: Progress,
}

impl ScanService {
	/// Read-only snapshot. Never writes and never runs a batch.
	pub async fn get_progress(&self, req: ProgressRequest) -> Result<ProgressResponse> {
		let stored = self.load_live(&req.scan_id).await?;

		Ok(ProgressResponse {
			success: true,
			progress: Progress::from_session(
				&stored.session,
				self.cfg.scan.progress_recent_limit as usize,
			),
		})
	}
}
