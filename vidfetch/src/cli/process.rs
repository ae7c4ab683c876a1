use anyhow::{Result, anyhow};
use clap::Parser;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::storage::VideoId;

#[derive(Parser, Debug)]
pub struct ProcessCommand {
    /// Video id, used in output file names
    #[arg(long)]
    pub id: String,

    /// Page URL hosting the player
    #[arg(long)]
    pub url: String,

    /// Show the browser window while sniffing
    #[arg(long)]
    pub headed: bool,
}

impl ProcessCommand {
    pub async fn run(self, mut config: Config) -> Result<()> {
        if self.headed {
            config.sniff.headless = false;
        }
        let id = VideoId::parse(&self.id)?;

        let pipeline = Pipeline::new(&config);
        let response = pipeline.process(&id, &self.url).await;

        println!("{}", serde_json::to_string_pretty(&response)?);

        if response.is_success() {
            Ok(())
        } else {
            Err(anyhow!("Processing {} failed", id))
        }
    }
}
