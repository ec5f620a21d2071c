use std::sync::Arc;

use sift_service::ScanService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ScanService>,
}
impl AppState {
	pub async fn new(config: sift_config::Config) -> color_eyre::Result<Self> {
		let store = sift_storage::connect(&config.storage).await?;

		tracing::info!(
			backend = %config.storage.backend,
			batch_size = config.scan.batch_size,
			invocation_limit_ms = config.scan.invocation_limit_ms,
			"Scan service ready."
		);

		Ok(Self::from_service(ScanService::new(config, store)))
	}

	pub fn from_service(service: ScanService) -> Self {
		Self { service: Arc::new(service) }
	}
}
