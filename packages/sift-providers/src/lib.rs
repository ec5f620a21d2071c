pub mod candidates;
pub mod evaluator;

mod error;

pub use error::{Error, Result};
pub use evaluator::Evaluation;

use std::{future::Future, pin::Pin};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

use sift_config::{CandidateProviderConfig, EvaluatorConfig};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the ordered candidate list and of each item's raw series.
pub trait CandidateProvider
where
	Self: Send + Sync,
{
	fn candidate_list<'a>(
		&'a self,
		cfg: &'a CandidateProviderConfig,
	) -> BoxFuture<'a, Result<Vec<String>>>;

	fn item_series<'a>(
		&'a self,
		cfg: &'a CandidateProviderConfig,
		item_id: &'a str,
	) -> BoxFuture<'a, Result<Value>>;
}

/// Domain scoring function applied to one item's series.
pub trait Evaluator
where
	Self: Send + Sync,
{
	fn evaluate<'a>(
		&'a self,
		cfg: &'a EvaluatorConfig,
		item_id: &'a str,
		series: &'a Value,
	) -> BoxFuture<'a, Result<Evaluation>>;
}

/// Dispatches to the configured HTTP or file adapters.
pub struct DefaultProviders;

impl CandidateProvider for DefaultProviders {
	fn candidate_list<'a>(
		&'a self,
		cfg: &'a CandidateProviderConfig,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(candidates::list(cfg))
	}

	fn item_series<'a>(
		&'a self,
		cfg: &'a CandidateProviderConfig,
		item_id: &'a str,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(candidates::series(cfg, item_id))
	}
}

impl Evaluator for DefaultProviders {
	fn evaluate<'a>(
		&'a self,
		cfg: &'a EvaluatorConfig,
		item_id: &'a str,
		series: &'a Value,
	) -> BoxFuture<'a, Result<Evaluation>> {
		Box::pin(evaluator::evaluate(cfg, item_id, series))
	}
}

/// Bearer auth, when a key is set, plus the configured static headers.
pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
