use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub scan: Scan,
	#[serde(default)]
	pub filters: FilterDefaults,
	pub providers: Providers,
	#[serde(default)]
	pub poller: Poller,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// One of "memory", "redis", or "upstash".
	pub backend: String,
	#[serde(default = "default_key_prefix")]
	pub key_prefix: String,
	/// Refreshed on every write; the only cancellation mechanism for abandoned scans.
	#[serde(default = "default_session_ttl_seconds")]
	pub session_ttl_seconds: u64,
	pub redis: Option<Redis>,
	pub upstash: Option<Upstash>,
}

#[derive(Debug, Deserialize)]
pub struct Redis {
	pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Upstash {
	/// REST endpoint, e.g. "https://eu1-example.upstash.io".
	pub url: String,
	pub token: String,
	#[serde(default = "default_upstash_timeout_ms")]
	pub timeout_ms: u64,
}

/// Batch sizing and the latency budget of one invocation.
///
/// `batch_size` and `item_timeout_ms` bound the worst-case batch latency; `validate` rejects
/// combinations that cannot fit inside `invocation_limit_ms - persist_margin_ms`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scan {
	pub batch_size: u32,
	pub item_timeout_ms: u64,
	pub invocation_limit_ms: u64,
	pub persist_margin_ms: u64,
	pub concurrency: u32,
	pub max_limit: u32,
	pub progress_recent_limit: u32,
}
impl Default for Scan {
	fn default() -> Self {
		Self {
			batch_size: 50,
			item_timeout_ms: 10_000,
			invocation_limit_ms: 300_000,
			persist_margin_ms: 5_000,
			concurrency: 4,
			max_limit: 1_000,
			progress_recent_limit: 10,
		}
	}
}

/// Applied when a start request omits a threshold.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
	pub min_score: f64,
	pub max_constraint: f64,
}
impl Default for FilterDefaults {
	fn default() -> Self {
		Self { min_score: 0.93, max_constraint: 100.0 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub candidates: CandidateProviderConfig,
	pub evaluator: EvaluatorConfig,
}

#[derive(Debug, Deserialize)]
pub struct CandidateProviderConfig {
	/// One of "http" or "file".
	pub source: String,
	pub api_base: Option<String>,
	pub api_key: Option<String>,
	#[serde(default = "default_list_path")]
	pub list_path: String,
	/// Must contain the `{id}` placeholder.
	#[serde(default = "default_series_path")]
	pub series_path: String,
	pub file: Option<PathBuf>,
	pub series_dir: Option<PathBuf>,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluatorConfig {
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Poller {
	pub api_base: String,
	pub min_delay_ms: u64,
	pub max_attempts: u32,
	pub busy_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub request_timeout_ms: u64,
}
impl Default for Poller {
	fn default() -> Self {
		Self {
			api_base: "http://127.0.0.1:8080".to_string(),
			min_delay_ms: 1_500,
			max_attempts: 200,
			busy_backoff_ms: 500,
			max_backoff_ms: 30_000,
			request_timeout_ms: 330_000,
		}
	}
}

fn default_key_prefix() -> String {
	"sift:".to_string()
}

fn default_session_ttl_seconds() -> u64 {
	86_400
}

fn default_upstash_timeout_ms() -> u64 {
	5_000
}

fn default_list_path() -> String {
	"/candidates".to_string()
}

fn default_series_path() -> String {
	"/candidates/{id}/series".to_string()
}

fn default_provider_timeout_ms() -> u64 {
	15_000
}
