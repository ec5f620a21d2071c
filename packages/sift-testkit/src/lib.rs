//! In-process collaborators for exercising scans without a network or a real store.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value, json};

use sift_config::{
	CandidateProviderConfig, Config, EvaluatorConfig, FilterDefaults, Poller, Providers, Scan,
	Service, Storage,
};
use sift_providers::{BoxFuture, CandidateProvider, Error, Evaluation, Evaluator, Result};
use sift_storage::{KvStore, MemoryStore};

/// A memory-backed config with small, test-friendly timings.
pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "debug".to_string() },
		storage: Storage {
			backend: "memory".to_string(),
			key_prefix: "test:".to_string(),
			session_ttl_seconds: 3_600,
			redis: None,
			upstash: None,
		},
		scan: Scan {
			batch_size: 50,
			item_timeout_ms: 1_000,
			invocation_limit_ms: 60_000,
			persist_margin_ms: 1_000,
			concurrency: 4,
			max_limit: 1_000,
			progress_recent_limit: 10,
		},
		filters: FilterDefaults { min_score: 0.9, max_constraint: 100.0 },
		providers: Providers {
			candidates: CandidateProviderConfig {
				source: "http".to_string(),
				api_base: Some("http://127.0.0.1:1".to_string()),
				api_key: None,
				list_path: "/candidates".to_string(),
				series_path: "/candidates/{id}/series".to_string(),
				file: None,
				series_dir: None,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			evaluator: EvaluatorConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: None,
				path: "/evaluate".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		poller: Poller::default(),
	}
}

/// Ids `item-0000`, `item-0001`, ...
pub fn item_ids(count: usize) -> Vec<String> {
	(0..count).map(|idx| format!("item-{idx:04}")).collect()
}

/// A fixed candidate list. Series payloads echo the item id.
pub struct ScriptedCandidates {
	items: Vec<String>,
	unavailable: bool,
}
impl ScriptedCandidates {
	pub fn new(items: Vec<String>) -> Self {
		Self { items, unavailable: false }
	}

	/// Every list call fails, as if the upstream source were down.
	pub fn unavailable() -> Self {
		Self { items: Vec::new(), unavailable: true }
	}
}
impl CandidateProvider for ScriptedCandidates {
	fn candidate_list<'a>(
		&'a self,
		_cfg: &'a CandidateProviderConfig,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			if self.unavailable {
				return Err(Error::InvalidResponse {
					message: "Candidate source is unavailable.".to_string(),
				});
			}

			Ok(self.items.clone())
		})
	}

	fn item_series<'a>(
		&'a self,
		_cfg: &'a CandidateProviderConfig,
		item_id: &'a str,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(json!({ "item_id": item_id, "closes": [1.0, 1.1, 1.2] })) })
	}
}

/// How the scripted evaluator answers for one item.
#[derive(Clone, Debug)]
pub enum Behavior {
	Score { score: f64, constraint: Option<f64> },
	Fail,
	/// Never answers within any realistic timeout.
	Hang,
	/// Reports a score but no matched attributes.
	Partial,
	/// Answers with `score` after `delay`.
	Slow { delay: Duration, score: f64 },
}

#[derive(Clone)]
pub struct ScriptedEvaluator {
	default: Behavior,
	overrides: Arc<HashMap<String, Behavior>>,
	calls: Arc<Mutex<Vec<String>>>,
}
impl ScriptedEvaluator {
	pub fn new(default: Behavior) -> Self {
		Self { default, overrides: Arc::new(HashMap::new()), calls: Arc::new(Mutex::new(Vec::new())) }
	}

	/// Scores every item below any sensible threshold.
	pub fn rejecting() -> Self {
		Self::new(Behavior::Score { score: 0.1, constraint: None })
	}

	pub fn with(mut self, item_id: impl Into<String>, behavior: Behavior) -> Self {
		Arc::make_mut(&mut self.overrides).insert(item_id.into(), behavior);

		self
	}

	/// Item ids in the order evaluation started.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	fn behavior(&self, item_id: &str) -> Behavior {
		self.overrides.get(item_id).cloned().unwrap_or_else(|| self.default.clone())
	}
}
impl Evaluator for ScriptedEvaluator {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a EvaluatorConfig,
		item_id: &'a str,
		_series: &'a Value,
	) -> BoxFuture<'a, Result<Evaluation>> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(item_id.to_string());

		let behavior = self.behavior(item_id);

		Box::pin(async move {
			match behavior {
				Behavior::Score { score, constraint } => Ok(Evaluation::complete(
					score,
					constraint,
					json!({ "item_id": item_id, "window": 20 }),
				)),
				Behavior::Fail => Err(Error::InvalidResponse {
					message: format!("Evaluator rejected {item_id}."),
				}),
				Behavior::Hang => {
					tokio::time::sleep(Duration::from_secs(86_400)).await;

					Ok(Evaluation::default())
				},
				Behavior::Partial => Ok(Evaluation { score: Some(0.99), ..Default::default() }),
				Behavior::Slow { delay, score } => {
					tokio::time::sleep(delay).await;

					Ok(Evaluation::complete(score, None, json!({ "item_id": item_id })))
				},
			}
		})
	}
}

/// Memory store whose reads and writes can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyStore {
	inner: MemoryStore,
	fail_reads: AtomicBool,
	fail_writes: AtomicBool,
	writes: AtomicUsize,
}
impl FlakyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_reads(&self, fail: bool) {
		self.fail_reads.store(fail, Ordering::SeqCst);
	}

	pub fn fail_writes(&self, fail: bool) {
		self.fail_writes.store(fail, Ordering::SeqCst);
	}

	/// Writes that reached the inner store.
	pub fn write_count(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	fn outage(flag: &AtomicBool) -> sift_storage::Result<()> {
		if flag.load(Ordering::SeqCst) {
			return Err(sift_storage::Error::Backend("store is unreachable".to_string()));
		}

		Ok(())
	}
}
impl KvStore for FlakyStore {
	fn get<'a>(
		&'a self,
		key: &'a str,
	) -> sift_storage::BoxFuture<'a, sift_storage::Result<Option<Vec<u8>>>> {
		Box::pin(async move {
			Self::outage(&self.fail_reads)?;

			self.inner.get(key).await
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		value: &'a [u8],
		ttl: Duration,
	) -> sift_storage::BoxFuture<'a, sift_storage::Result<()>> {
		Box::pin(async move {
			Self::outage(&self.fail_writes)?;
			self.inner.set(key, value, ttl).await?;
			self.writes.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<&'a [u8]>,
		value: &'a [u8],
		ttl: Duration,
	) -> sift_storage::BoxFuture<'a, sift_storage::Result<bool>> {
		Box::pin(async move {
			Self::outage(&self.fail_writes)?;

			let written = self.inner.compare_and_swap(key, expected, value, ttl).await?;

			if written {
				self.writes.fetch_add(1, Ordering::SeqCst);
			}

			Ok(written)
		})
	}
}
