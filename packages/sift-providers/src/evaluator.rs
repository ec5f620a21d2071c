use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use sift_config::EvaluatorConfig;

use crate::{Error, Result};

/// What the evaluator reported for one item. Any field may be missing; callers decide whether a
/// partial answer counts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
	pub score: Option<f64>,
	pub constraint: Option<f64>,
	pub matched_attributes: Option<Value>,
}
impl Evaluation {
	pub fn complete(score: f64, constraint: Option<f64>, matched_attributes: Value) -> Self {
		Self { score: Some(score), constraint, matched_attributes: Some(matched_attributes) }
	}
}

pub async fn evaluate(cfg: &EvaluatorConfig, item_id: &str, series: &Value) -> Result<Evaluation> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"item_id": item_id,
		"series": series,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_evaluation_response(json)
}

fn parse_evaluation_response(json: Value) -> Result<Evaluation> {
	let Value::Object(mut map) = json else {
		return Err(Error::InvalidResponse {
			message: "Evaluation response must be a JSON object.".to_string(),
		});
	};
	let score = map.get("score").and_then(Value::as_f64);
	let constraint = map.get("constraint").and_then(Value::as_f64);
	let matched_attributes = map.remove("matched_attributes").filter(|value| !value.is_null());

	Ok(Evaluation { score, constraint, matched_attributes })
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parses_full_evaluation() {
		let json = json!({ "score": 0.96, "constraint": 42.5, "matched_attributes": { "lag": 3 } });
		let parsed = parse_evaluation_response(json).expect("parse failed");

		assert_eq!(parsed, Evaluation::complete(0.96, Some(42.5), json!({ "lag": 3 })));
	}

	#[test]
	fn missing_fields_stay_missing() {
		let parsed =
			parse_evaluation_response(json!({ "score": "high", "matched_attributes": null }))
				.expect("parse failed");

		assert_eq!(parsed, Evaluation::default());
		assert!(parse_evaluation_response(json!([0.9])).is_err());
	}
}
