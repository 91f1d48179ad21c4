use anyhow::Result;
use clap::Parser;
use physchat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    physchat::run(args).await
}
