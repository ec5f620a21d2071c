pub mod batch;
pub mod continue_scan;
pub mod progress;
pub mod results;
pub mod start;

mod error;

pub use batch::{BatchBudget, ItemEvaluationError};
pub use continue_scan::{ContinueScanRequest, ContinueScanResponse};
pub use error::{Error, Result};
pub use progress::{ProgressRequest, ProgressResponse};
pub use results::{ResultsRequest, ResultsResponse};
pub use sift_providers::{BoxFuture, CandidateProvider, Evaluation, Evaluator};
pub use start::{StartScanRequest, StartScanResponse};

use std::sync::Arc;

use time::OffsetDateTime;

use sift_config::Config;
use sift_providers::DefaultProviders;
use sift_storage::{KvStore, SessionRepository, StoredSession};

const MAX_SCAN_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct Providers {
	pub candidates: Arc<dyn CandidateProvider>,
	pub evaluator: Arc<dyn Evaluator>,
}
impl Providers {
	pub fn new(candidates: Arc<dyn CandidateProvider>, evaluator: Arc<dyn Evaluator>) -> Self {
		Self { candidates, evaluator }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { candidates: provider.clone(), evaluator: provider }
	}
}

/// Stateless scan operations. All cross-call state lives behind `repo`.
pub struct ScanService {
	pub cfg: Config,
	pub repo: SessionRepository,
	pub providers: Providers,
}
impl ScanService {
	pub fn new(cfg: Config, store: Arc<dyn KvStore>) -> Self {
		Self::with_providers(cfg, store, Providers::default())
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn KvStore>, providers: Providers) -> Self {
		let repo = SessionRepository::new(store, cfg.storage.key_prefix.clone());

		Self { cfg, repo, providers }
	}

	/// Loads a session that exists and has not outlived its TTL.
	pub(crate) async fn load_live(&self, scan_id: &str) -> Result<StoredSession> {
		let scan_id = validate_scan_id(scan_id)?;
		let Some(stored) = self.repo.load(scan_id).await? else {
			return Err(not_found(scan_id));
		};

		if stored.session.is_expired(OffsetDateTime::now_utc()) {
			tracing::debug!(scan_id, "Scan record outlived its TTL.");

			return Err(not_found(scan_id));
		}

		Ok(stored)
	}
}

fn validate_scan_id(scan_id: &str) -> Result<&str> {
	let scan_id = scan_id.trim();

	if scan_id.is_empty() {
		return Err(Error::InvalidRequest { message: "scan_id must not be empty.".to_string() });
	}
	if scan_id.len() > MAX_SCAN_ID_LEN {
		return Err(Error::InvalidRequest {
			message: format!("scan_id must be at most {MAX_SCAN_ID_LEN} characters."),
		});
	}

	Ok(scan_id)
}

fn not_found(scan_id: &str) -> Error {
	Error::NotFound { message: format!("Scan {scan_id} does not exist or has expired.") }
}
