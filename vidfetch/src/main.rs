use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod jobs;
mod media;
mod pipeline;
mod server;
mod sniff;
mod storage;
mod util;

#[tokio::main]
async fn main() -> Result<()> {
    util::logging::initialize_tracing();
    cli::Args::parse().run().await
}
