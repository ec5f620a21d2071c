use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard},
	time::Duration,
};

use tokio::time::Instant;

use crate::{BoxFuture, KvStore, Result, kv::MAX_TTL};

struct Entry {
	value: Vec<u8>,
	expires_at: Instant,
}

/// Process-local store for tests and single-process development.
///
/// Uses the tokio clock so paused-time tests can drive expiry.
#[derive(Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, Entry>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Live keys, after dropping the expired ones.
	pub fn len(&self) -> usize {
		let mut entries = self.lock();

		purge_expired(&mut entries, Instant::now());

		entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn read(&self, key: &str) -> Option<Vec<u8>> {
		let mut entries = self.lock();
		let now = Instant::now();

		match entries.get(key) {
			Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}

	fn write(&self, key: &str, expected: Option<Option<&[u8]>>, value: &[u8], ttl: Duration) -> bool {
		let mut entries = self.lock();
		let now = Instant::now();
		let current = entries.get(key).filter(|entry| entry.expires_at > now).map(|entry| entry.value.as_slice());

		if let Some(expected) = expected
			&& current != expected
		{
			return false;
		}

		let expires_at = now + ttl.min(MAX_TTL);

		entries.insert(key.to_string(), Entry { value: value.to_vec(), expires_at });

		true
	}
}

impl KvStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
		Box::pin(async move { Ok(self.read(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a [u8], ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.write(key, None, value, ttl);

			Ok(())
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a [u8]>,
		value: &'a [u8],
		ttl: Duration,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.write(key, Some(expected), value, ttl)) })
	}
}

fn purge_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
	entries.retain(|_, entry| entry.expires_at > now);
}
