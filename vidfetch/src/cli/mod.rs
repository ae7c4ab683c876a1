use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;

mod process;
mod serve;
mod sniff;

pub use process::ProcessCommand;
pub use serve::ServeCommand;
pub use sniff::SniffCommand;

#[derive(Parser, Debug)]
#[command(name = "vidfetch")]
#[command(about = "Find, download and compress HLS videos embedded in web pages")]
pub struct Args {
    /// Config file (defaults to config/vidfetch.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve(ServeCommand),
    /// Process a single video in the foreground and print the result
    Process(ProcessCommand),
    /// Print the stream links found on a page
    Sniff(SniffCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let command = self
            .command
            .unwrap_or(Command::Serve(ServeCommand::default()));

        match command {
            Command::Serve(cmd) => cmd.run(config).await,
            Command::Process(cmd) => cmd.run(config).await,
            Command::Sniff(cmd) => cmd.run(config).await,
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = Config::load(path)?;
    config
        .apply_env()
        .context("Invalid environment override")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let args = Args::try_parse_from(["vidfetch"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_process_args() {
        let args = Args::try_parse_from([
            "vidfetch",
            "process",
            "--id",
            "m1",
            "--url",
            "https://example.com/watch",
            "--config",
            "custom.yaml",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("custom.yaml")));
        match args.command {
            Some(Command::Process(cmd)) => {
                assert_eq!(cmd.id, "m1");
                assert_eq!(cmd.url, "https://example.com/watch");
                assert!(!cmd.headed);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let args = Args::try_parse_from(["vidfetch", "serve", "-p", "9000", "--headed"]).unwrap();
        match args.command {
            Some(Command::Serve(cmd)) => {
                assert_eq!(cmd.port, Some(9000));
                assert!(cmd.headed);
                assert!(cmd.host.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
