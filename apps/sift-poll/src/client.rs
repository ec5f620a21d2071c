use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header::RETRY_AFTER};
use serde_json::Value;

use sift_service::{
	BoxFuture, ContinueScanRequest, ContinueScanResponse, ResultsResponse, StartScanRequest,
	StartScanResponse,
};

use crate::{Error, Result};

/// The scan operations as seen from the consumer side.
pub trait ScanClient
where
	Self: Send + Sync,
{
	fn start<'a>(&'a self, req: &'a StartScanRequest) -> BoxFuture<'a, Result<StartScanResponse>>;

	fn continue_scan<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<ContinueScanResponse>>;

	fn results<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<ResultsResponse>>;
}

pub struct HttpScanClient {
	client: Client,
	api_base: String,
}
impl HttpScanClient {
	pub fn new(cfg: &sift_config::Poller) -> Result<Self> {
		let client =
			Client::builder().timeout(Duration::from_millis(cfg.request_timeout_ms)).build()?;

		Ok(Self { client, api_base: cfg.api_base.clone() })
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.api_base)
	}
}

impl ScanClient for HttpScanClient {
	fn start<'a>(&'a self, req: &'a StartScanRequest) -> BoxFuture<'a, Result<StartScanResponse>> {
		Box::pin(async move {
			let res = self.client.post(self.url("/v1/scans")).json(req).send().await?;

			decode(res).await
		})
	}

	fn continue_scan<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<ContinueScanResponse>> {
		Box::pin(async move {
			let body = ContinueScanRequest { scan_id: scan_id.to_string() };
			let res = self.client.post(self.url("/v1/scans/continue")).json(&body).send().await?;

			decode(res).await
		})
	}

	fn results<'a>(&'a self, scan_id: &'a str) -> BoxFuture<'a, Result<ResultsResponse>> {
		Box::pin(async move {
			let res = self
				.client
				.get(self.url("/v1/scans/results"))
				.query(&[("scan_id", scan_id)])
				.send()
				.await?;

			decode(res).await
		})
	}
}

async fn decode<T>(res: Response) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	let status = res.status();

	if status.is_success() {
		return Ok(res.json().await?);
	}

	let retry_after_secs = res
		.headers()
		.get(RETRY_AFTER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse().ok());
	let body = res.bytes().await?;

	Err(error_from_body(status, retry_after_secs, &body))
}

/// Maps the `{success:false, error_code, message}` envelope onto a client error.
pub fn error_from_body(status: StatusCode, retry_after_secs: Option<u64>, body: &[u8]) -> Error {
	let json: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
	let error_code = json
		.get("error_code")
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
	let message = json
		.get("message")
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

	match status {
		StatusCode::CONFLICT => Error::Busy { message, retry_after_secs },
		StatusCode::NOT_FOUND => Error::NotFound { message },
		status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
			Error::Unavailable { error_code, message }
		},
		_ => Error::Rejected { error_code, message },
	}
}
