use std::time::Duration;

use redis::{AsyncCommands, Script, aio::ConnectionManager};

use crate::{
	BoxFuture, KvStore, Result,
	kv::{self, COMPARE_AND_SWAP_SCRIPT},
};

/// Redis-backed store. The compare-and-swap runs as one Lua script so it is atomic server-side.
#[derive(Clone)]
pub struct RedisStore {
	conn: ConnectionManager,
	cas_script: Script,
}
impl RedisStore {
	pub async fn connect(url: &str) -> Result<Self> {
		let client = redis::Client::open(url)?;
		let conn = ConnectionManager::new(client).await?;

		tracing::info!("Connected to Redis.");

		Ok(Self { conn, cas_script: Script::new(COMPARE_AND_SWAP_SCRIPT) })
	}
}

impl KvStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let value: Option<Vec<u8>> = conn.get(key).await?;

			Ok(value)
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a [u8], ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut conn = self.conn.clone();

			conn.set_ex::<_, _, ()>(key, value, kv::ttl_seconds(ttl)).await?;

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
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let (flag, expected) = match expected {
				Some(bytes) => ("1", bytes),
				None => ("0", &[][..]),
			};
			let written: i64 = self
				.cas_script
				.key(key)
				.arg(flag)
				.arg(expected)
				.arg(value)
				.arg(kv::ttl_seconds(ttl))
				.invoke_async(&mut conn)
				.await?;

			Ok(written == 1)
		})
	}
}
