use std::time::Duration;

use reqwest::{Client, header::AUTHORIZATION};
use serde_json::Value;

use crate::{
	BoxFuture, Error, KvStore, Result,
	kv::{self, COMPARE_AND_SWAP_SCRIPT},
};

/// Store over the Upstash Redis REST API. Each command is one JSON-array POST.
///
/// Values travel as JSON strings, so they must be valid UTF-8.
pub struct UpstashStore {
	client: Client,
	url: String,
	token: String,
}
impl UpstashStore {
	pub fn new(cfg: &sift_config::Upstash) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client, url: cfg.url.clone(), token: cfg.token.clone() })
	}

	async fn command(&self, args: Vec<Value>) -> Result<Value> {
		let res = self
			.client
			.post(&self.url)
			.header(AUTHORIZATION, format!("Bearer {}", self.token))
			.json(&args)
			.send()
			.await?;
		let status = res.status();
		let body: Value = res.json().await?;

		if !status.is_success() && body.get("error").is_none() {
			return Err(Error::Backend(format!("Upstash returned HTTP {status}.")));
		}

		parse_command_response(body)
	}
}

impl KvStore for UpstashStore {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
		Box::pin(async move {
			match self.command(vec!["GET".into(), key.into()]).await? {
				Value::Null => Ok(None),
				Value::String(text) => Ok(Some(text.into_bytes())),
				other => Err(Error::Backend(format!("GET returned a non-string value: {other}"))),
			}
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a [u8], ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let value = utf8(value)?;

			self.command(vec![
				"SET".into(),
				key.into(),
				value.into(),
				"EX".into(),
				kv::ttl_seconds(ttl).to_string().into(),
			])
			.await?;

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
			let (flag, expected) = match expected {
				Some(bytes) => ("1", utf8(bytes)?),
				None => ("0", ""),
			};
			let result = self
				.command(vec![
					"EVAL".into(),
					COMPARE_AND_SWAP_SCRIPT.into(),
					"1".into(),
					key.into(),
					flag.into(),
					expected.into(),
					utf8(value)?.into(),
					kv::ttl_seconds(ttl).to_string().into(),
				])
				.await?;

			Ok(result.as_i64() == Some(1))
		})
	}
}

/// Unwraps an Upstash `{"result": ...}` envelope, mapping `{"error": ...}` to a backend error.
pub fn parse_command_response(body: Value) -> Result<Value> {
	let Value::Object(mut map) = body else {
		return Err(Error::Backend("Upstash response is not a JSON object.".to_string()));
	};

	if let Some(error) = map.remove("error") {
		let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());

		return Err(Error::Backend(message));
	}

	map.remove("result")
		.ok_or_else(|| Error::Backend("Upstash response is missing result.".to_string()))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
	std::str::from_utf8(bytes).map_err(|err| {
		Error::InvalidArgument(format!("Upstash values must be valid UTF-8: {err}."))
	})
}
