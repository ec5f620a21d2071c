use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use sift_config::{CandidateProviderConfig, CandidateSource};

use crate::{Error, Result};

/// The ordered candidate identifiers, as the configured source lists them.
pub async fn list(cfg: &CandidateProviderConfig) -> Result<Vec<String>> {
	let json = match source(cfg)? {
		CandidateSource::Http => {
			let url = format!("{}{}", api_base(cfg)?, cfg.list_path);

			get_json(cfg, &url).await?
		},
		CandidateSource::File => {
			let path = cfg.file.as_ref().ok_or_else(|| Error::InvalidConfig {
				message: "providers.candidates.file is required for the file source.".to_string(),
			})?;

			read_json(path).await?
		},
	};

	parse_candidate_list(json)
}

/// The raw time series for one item. The file source yields `null` without a series directory.
pub async fn series(cfg: &CandidateProviderConfig, item_id: &str) -> Result<Value> {
	match source(cfg)? {
		CandidateSource::Http => {
			let url = format!("{}{}", api_base(cfg)?, series_path(&cfg.series_path, item_id));

			get_json(cfg, &url).await
		},
		CandidateSource::File => match cfg.series_dir.as_ref() {
			Some(dir) => read_json(&dir.join(format!("{item_id}.json"))).await,
			None => Ok(Value::Null),
		},
	}
}

/// Accepts `{"items": [...]}` or a bare array; entries are strings or objects with `id`/`code`.
pub fn parse_candidate_list(json: Value) -> Result<Vec<String>> {
	let items = match json {
		Value::Array(items) => items,
		Value::Object(mut map) => match map.remove("items") {
			Some(Value::Array(items)) => items,
			_ => {
				return Err(Error::InvalidResponse {
					message: "Candidate list response is missing items array.".to_string(),
				});
			},
		},
		_ => {
			return Err(Error::InvalidResponse {
				message: "Candidate list response must be an array or an object.".to_string(),
			});
		},
	};
	let mut ids = Vec::with_capacity(items.len());

	for item in items {
		let id = match &item {
			Value::String(id) => Some(id.as_str()),
			Value::Object(map) => map.get("id").or_else(|| map.get("code")).and_then(Value::as_str),
			_ => None,
		};
		let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
			return Err(Error::InvalidResponse {
				message: format!("Candidate entry has no usable id: {item}."),
			});
		};

		ids.push(id.to_string());
	}

	Ok(ids)
}

fn series_path(template: &str, item_id: &str) -> String {
	template.replace("{id}", item_id)
}

fn source(cfg: &CandidateProviderConfig) -> Result<CandidateSource> {
	cfg.source_kind().map_err(|err| Error::InvalidConfig { message: err.to_string() })
}

fn api_base(cfg: &CandidateProviderConfig) -> Result<&str> {
	cfg.api_base.as_deref().ok_or_else(|| Error::InvalidConfig {
		message: "providers.candidates.api_base is required for the http source.".to_string(),
	})
}

async fn get_json(cfg: &CandidateProviderConfig, url: &str) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let res = client
		.get(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

async fn read_json(path: &std::path::Path) -> Result<Value> {
	let raw = tokio::fs::read(path)
		.await
		.map_err(|source| Error::ReadFile { path: path.to_path_buf(), source })?;

	Ok(serde_json::from_slice(&raw)?)
}
