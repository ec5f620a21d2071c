use serde::{Deserialize, Serialize};

use sift_domain::{ResultRecord, ScanStatus};

use crate::{Result, ScanService};

#[derive(Clone, Debug, Deserialize)]
pub struct ResultsRequest {
	pub scan_id: String,
}

/// Every match kept so far. Partial while the scan is still running.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
	pub success: bool,
	pub scan_id: String,
	pub status: ScanStatus,
	pub is_complete: bool,
	pub total_scanned: usize,
	pub found: usize,
	pub matches: Vec<ResultRecord>,
}

impl ScanService {
	pub async fn get_results(&self, req: ResultsRequest) -> Result<ResultsResponse> {
		let session = self.load_live(&req.scan_id).await?.session;

		Ok(ResultsResponse {
			success: true,
			scan_id: session.id.clone(),
			status: session.status,
			is_complete: session.is_complete(),
			total_scanned: session.cursor,
			found: session.matches.len(),
			matches: session.matches,
		})
	}
}
