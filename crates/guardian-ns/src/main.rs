use anyhow::Context as _;
use clap::Parser as _;
use guardian_ns::{setup_logging, App, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_file)?;

    App::run_until_completion(args)
        .await
        .context("the DNS server has stopped")
}
