use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sift_poll::Args::parse();

	sift_poll::run(args).await
}
