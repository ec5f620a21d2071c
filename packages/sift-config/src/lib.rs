mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	CandidateProviderConfig, Config, EvaluatorConfig, FilterDefaults, Poller, Providers, Redis,
	Scan, Service, Storage, Upstash,
};

use std::{fs, path::Path};

/// Ten years.
pub const MAX_SESSION_TTL_SECONDS: u64 = 315_360_000;
/// One hour.
pub const MAX_INVOCATION_LIMIT_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
	Memory,
	Redis,
	Upstash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
	Http,
	File,
}

impl Storage {
	pub fn backend_kind(&self) -> Result<StorageBackend> {
		match self.backend.as_str() {
			"memory" => Ok(StorageBackend::Memory),
			"redis" => Ok(StorageBackend::Redis),
			"upstash" => Ok(StorageBackend::Upstash),
			other => Err(Error::UnknownVariant {
				field: "storage.backend",
				expected: "memory, redis, or upstash",
				value: other.to_string(),
			}),
		}
	}
}

impl CandidateProviderConfig {
	pub fn source_kind(&self) -> Result<CandidateSource> {
		match self.source.as_str() {
			"http" => Ok(CandidateSource::Http),
			"file" => Ok(CandidateSource::File),
			other => Err(Error::UnknownVariant {
				field: "providers.candidates.source",
				expected: "http or file",
				value: other.to_string(),
			}),
		}
	}
}

impl Scan {
	/// Latest point, relative to invocation start, at which item evaluation may still run.
	pub fn soft_deadline_ms(&self) -> u64 {
		self.invocation_limit_ms.saturating_sub(self.persist_margin_ms)
	}

	/// Wall-clock cost of a batch in which every item hits its timeout.
	pub fn worst_case_batch_ms(&self) -> u64 {
		let waves = self.batch_size.div_ceil(self.concurrency.max(1));

		u64::from(waves).saturating_mul(self.item_timeout_ms)
	}
}

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	validate_storage(cfg)?;
	validate_scan(cfg)?;

	if !cfg.filters.min_score.is_finite() || !(0.0..=1.0).contains(&cfg.filters.min_score) {
		return Err(Error::Validation {
			message: "filters.min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.filters.max_constraint.is_finite() || cfg.filters.max_constraint <= 0.0 {
		return Err(Error::Validation {
			message: "filters.max_constraint must be a finite number greater than zero."
				.to_string(),
		});
	}

	validate_providers(cfg)?;

	if cfg.poller.max_attempts == 0 {
		return Err(Error::Validation {
			message: "poller.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.poller.busy_backoff_ms > cfg.poller.max_backoff_ms {
		return Err(Error::Validation {
			message: "poller.busy_backoff_ms must not exceed poller.max_backoff_ms.".to_string(),
		});
	}

	Ok(())
}

fn validate_storage(cfg: &Config) -> Result<()> {
	let storage = &cfg.storage;

	if storage.session_ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "storage.session_ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if storage.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
		return Err(Error::Validation {
			message: format!(
				"storage.session_ttl_seconds must be {MAX_SESSION_TTL_SECONDS} or less."
			),
		});
	}
	if storage.key_prefix.chars().any(char::is_whitespace) {
		return Err(Error::Validation {
			message: "storage.key_prefix must not contain whitespace.".to_string(),
		});
	}

	match storage.backend_kind()? {
		StorageBackend::Memory => {},
		StorageBackend::Redis => {
			let configured =
				storage.redis.as_ref().map(|redis| !redis.url.trim().is_empty()).unwrap_or(false);

			if !configured {
				return Err(Error::Validation {
					message: "storage.redis.url is required when storage.backend is redis."
						.to_string(),
				});
			}
		},
		StorageBackend::Upstash => {
			let Some(upstash) = storage.upstash.as_ref() else {
				return Err(Error::Validation {
					message: "storage.upstash is required when storage.backend is upstash."
						.to_string(),
				});
			};

			for (label, value) in
				[("storage.upstash.url", &upstash.url), ("storage.upstash.token", &upstash.token)]
			{
				if value.trim().is_empty() {
					return Err(Error::Validation { message: format!("{label} must be non-empty.") });
				}
			}
		},
	}

	Ok(())
}

fn validate_scan(cfg: &Config) -> Result<()> {
	let scan = &cfg.scan;

	for (label, value) in [
		("scan.batch_size", u64::from(scan.batch_size)),
		("scan.item_timeout_ms", scan.item_timeout_ms),
		("scan.invocation_limit_ms", scan.invocation_limit_ms),
		("scan.concurrency", u64::from(scan.concurrency)),
		("scan.max_limit", u64::from(scan.max_limit)),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if scan.invocation_limit_ms > MAX_INVOCATION_LIMIT_MS {
		return Err(Error::Validation {
			message: format!("scan.invocation_limit_ms must be {MAX_INVOCATION_LIMIT_MS} or less."),
		});
	}
	if scan.concurrency > 64 {
		return Err(Error::Validation {
			message: "scan.concurrency must be 64 or less.".to_string(),
		});
	}
	if scan.persist_margin_ms >= scan.invocation_limit_ms {
		return Err(Error::Validation {
			message: "scan.persist_margin_ms must be less than scan.invocation_limit_ms."
				.to_string(),
		});
	}
	if scan.worst_case_batch_ms() > scan.soft_deadline_ms() {
		return Err(Error::Validation {
			message: format!(
				"scan.batch_size x scan.item_timeout_ms / scan.concurrency ({} ms) must fit within scan.invocation_limit_ms - scan.persist_margin_ms ({} ms).",
				scan.worst_case_batch_ms(),
				scan.soft_deadline_ms(),
			),
		});
	}

	Ok(())
}

fn validate_providers(cfg: &Config) -> Result<()> {
	let candidates = &cfg.providers.candidates;

	match candidates.source_kind()? {
		CandidateSource::Http => {
			if candidates.api_base.is_none() {
				return Err(Error::Validation {
					message: "providers.candidates.api_base is required when source is http."
						.to_string(),
				});
			}
			if !candidates.series_path.contains("{id}") {
				return Err(Error::Validation {
					message: "providers.candidates.series_path must contain {id}.".to_string(),
				});
			}
		},
		CandidateSource::File => {
			if candidates.file.is_none() {
				return Err(Error::Validation {
					message: "providers.candidates.file is required when source is file."
						.to_string(),
				});
			}
		},
	}

	if cfg.providers.evaluator.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.evaluator.api_base must be non-empty.".to_string(),
		});
	}

	for (label, headers) in [
		("providers.candidates.default_headers", &candidates.default_headers),
		("providers.evaluator.default_headers", &cfg.providers.evaluator.default_headers),
	] {
		if headers.values().any(|value| !value.is_string()) {
			return Err(Error::Validation { message: format!("{label} values must be strings.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let candidates = &mut cfg.providers.candidates;

	if candidates.api_base.as_deref().map(|base| base.trim().is_empty()).unwrap_or(false) {
		candidates.api_base = None;
	}
	if candidates.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		candidates.api_key = None;
	}
	if candidates.series_dir.as_deref().map(|dir| dir.as_os_str().is_empty()).unwrap_or(false) {
		candidates.series_dir = None;
	}
	if let Some(base) = candidates.api_base.as_mut() {
		trim_trailing_slash(base);
	}

	let evaluator = &mut cfg.providers.evaluator;

	if evaluator.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		evaluator.api_key = None;
	}

	trim_trailing_slash(&mut evaluator.api_base);
	trim_trailing_slash(&mut cfg.poller.api_base);

	if let Some(upstash) = cfg.storage.upstash.as_mut() {
		trim_trailing_slash(&mut upstash.url);
	}
}

fn trim_trailing_slash(value: &mut String) {
	while value.ends_with('/') {
		value.pop();
	}
}
