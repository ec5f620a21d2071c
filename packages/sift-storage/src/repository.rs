use std::{sync::Arc, time::Duration};

use sift_domain::ScanSession;

use crate::{Error, KvStore, Result};

/// A session together with the exact bytes it was decoded from.
///
/// The bytes are the compare-and-swap token for the next write.
#[derive(Clone, Debug)]
pub struct StoredSession {
	pub session: ScanSession,
	raw: Vec<u8>,
}
impl StoredSession {
	pub fn raw(&self) -> &[u8] {
		&self.raw
	}
}

/// Typed access to scan sessions. Every write is conditional on what the caller last read.
#[derive(Clone)]
pub struct SessionRepository {
	store: Arc<dyn KvStore>,
	key_prefix: String,
}
impl SessionRepository {
	pub fn new(store: Arc<dyn KvStore>, key_prefix: impl Into<String>) -> Self {
		Self { store, key_prefix: key_prefix.into() }
	}

	pub fn key(&self, scan_id: &str) -> String {
		format!("{}scan:{scan_id}", self.key_prefix)
	}

	pub async fn load(&self, scan_id: &str) -> Result<Option<StoredSession>> {
		let key = self.key(scan_id);
		let Some(raw) = self.store.get(&key).await? else {
			return Ok(None);
		};
		let session: ScanSession = serde_json::from_slice(&raw)
			.map_err(|err| Error::Corrupt { key: key.clone(), message: err.to_string() })?;

		if session.id != scan_id {
			return Err(Error::Corrupt {
				key,
				message: format!("record holds scan {} instead", session.id),
			});
		}

		Ok(Some(StoredSession { session, raw }))
	}

	/// Writes a new session. Returns `false` if the key already exists.
	pub async fn create(&self, session: &ScanSession) -> Result<bool> {
		let raw = serde_json::to_vec(session)?;

		self.store.compare_and_swap(&self.key(&session.id), None, &raw, ttl(session)).await
	}

	/// Replaces `current` with `next`. Returns `None` if the record changed since it was read.
	pub async fn replace(
		&self,
		current: &StoredSession,
		next: &ScanSession,
	) -> Result<Option<StoredSession>> {
		let raw = serde_json::to_vec(next)?;
		let written = self
			.store
			.compare_and_swap(&self.key(&next.id), Some(&current.raw), &raw, ttl(next))
			.await?;

		if !written {
			tracing::debug!(scan_id = %next.id, "Session changed since it was read.");

			return Ok(None);
		}

		Ok(Some(StoredSession { session: next.clone(), raw }))
	}
}

fn ttl(session: &ScanSession) -> Duration {
	Duration::from_secs(session.ttl_seconds.min(sift_domain::MAX_TTL_SECONDS))
}
