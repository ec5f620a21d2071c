pub mod client;
pub mod poller;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;

use sift_service::StartScanRequest;

use crate::{
	client::HttpScanClient,
	poller::{PollOutcome, Poller},
};

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Continue an existing scan instead of starting a new one.
	#[arg(long, value_name = "SCAN_ID")]
	pub resume: Option<String>,
	#[arg(long, value_name = "SCORE")]
	pub min_score: Option<f64>,
	#[arg(long, value_name = "VALUE")]
	pub max_constraint: Option<f64>,
	#[arg(long, value_name = "N")]
	pub limit: Option<u32>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;

	sift_cli::init_tracing(&config.service.log_level);

	let client = HttpScanClient::new(&config.poller)?;
	let poller = Poller::new(client, &config.poller);
	let report = match args.resume {
		Some(scan_id) => poller.resume(scan_id).await?,
		None => {
			let req = StartScanRequest {
				min_score: args.min_score,
				max_constraint: args.max_constraint,
				limit: args.limit,
			};

			poller.start(req).await?
		},
	};

	match report.outcome {
		PollOutcome::Complete => tracing::info!(scan_id = %report.scan_id, "Scan complete."),
		PollOutcome::Exhausted => tracing::warn!(
			scan_id = %report.scan_id,
			attempts = report.attempts,
			"Retry budget exhausted. Resume later with --resume."
		),
	}

	if let Some(results) = &report.results {
		println!("{}", serde_json::to_string_pretty(results)?);
	}

	Ok(())
}
