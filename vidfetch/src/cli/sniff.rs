use anyhow::{Result, anyhow};
use clap::Parser;

use crate::config::Config;
use crate::sniff::StreamSniffer;

#[derive(Parser, Debug)]
pub struct SniffCommand {
    /// Page URL hosting the player
    #[arg(long)]
    pub url: String,

    /// Show the browser window while sniffing
    #[arg(long)]
    pub headed: bool,
}

impl SniffCommand {
    pub async fn run(self, mut config: Config) -> Result<()> {
        if self.headed {
            config.sniff.headless = false;
        }

        let links = StreamSniffer::new(config.sniff).extract_links(&self.url).await;
        if links.is_empty() {
            return Err(anyhow!("No stream links found on {}", self.url));
        }

        for link in links {
            println!("{}", link);
        }
        Ok(())
    }
}
