pub mod kv;
pub mod memory;
pub mod redis_store;
pub mod repository;
pub mod upstash;

mod error;

pub use error::Error;
pub use kv::{BoxFuture, KvStore};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use repository::{SessionRepository, StoredSession};
pub use upstash::UpstashStore;

use std::sync::Arc;

use sift_config::StorageBackend;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Builds the configured backend.
pub async fn connect(cfg: &sift_config::Storage) -> Result<Arc<dyn KvStore>> {
	let backend = cfg.backend_kind().map_err(|err| Error::InvalidArgument(err.to_string()))?;
	let store: Arc<dyn KvStore> = match backend {
		StorageBackend::Memory => {
			tracing::warn!("Using the in-memory store. Sessions do not survive a restart.");

			Arc::new(MemoryStore::new())
		},
		StorageBackend::Redis => {
			let redis = cfg.redis.as_ref().ok_or_else(|| {
				Error::InvalidArgument("storage.redis is not configured.".to_string())
			})?;

			Arc::new(RedisStore::connect(&redis.url).await?)
		},
		StorageBackend::Upstash => {
			let upstash = cfg.upstash.as_ref().ok_or_else(|| {
				Error::InvalidArgument("storage.upstash is not configured.".to_string())
			})?;

			Arc::new(UpstashStore::new(upstash)?)
		},
	};

	Ok(store)
}
