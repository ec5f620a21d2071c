use std::{future::Future, pin::Pin, time::Duration};

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compare-and-swap guarded write. `KEYS[1]` is the record; `ARGV[1]` is `1` when `ARGV[2]` holds
/// the expected bytes and `0` when the key must be absent; `ARGV[3]` is the new value and
/// `ARGV[4]` the TTL in seconds. Returns 1 on write, 0 on mismatch.
pub(crate) const COMPARE_AND_SWAP_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])

if ARGV[1] == '0' then
	if current then
		return 0
	end
elseif (not current) or current ~= ARGV[2] then
	return 0
end

redis.call('SET', KEYS[1], ARGV[3], 'EX', ARGV[4])

return 1
"#;

/// Durable key-value store with per-key time-to-live.
///
/// Expiry is the only deletion path: nothing in the scan protocol removes a key explicitly.
pub trait KvStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

	fn set<'a>(&'a self, key: &'a str, value: &'a [u8], ttl: Duration) -> BoxFuture<'a, Result<()>>;

	/// Writes `value` only if the stored bytes equal `expected`, or the key is absent when
	/// `expected` is `None`. Returns whether the write happened.
	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a [u8]>,
		value: &'a [u8],
		ttl: Duration,
	) -> BoxFuture<'a, Result<bool>>;
}

pub(crate) const MAX_TTL: Duration = Duration::from_secs(sift_domain::MAX_TTL_SECONDS);

/// Redis rejects `EX 0`; sub-second TTLs round up to one second.
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
	ttl.as_secs().clamp(1, sift_domain::MAX_TTL_SECONDS)
}
