use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::jobs::JobStore;
use crate::pipeline::Pipeline;
use crate::server::AppState;

#[derive(Parser, Debug, Default)]
pub struct ServeCommand {
    /// Address to bind (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Show the browser window while sniffing
    #[arg(long)]
    pub headed: bool,

    /// Maximum number of videos processed at once
    #[arg(long)]
    pub max_jobs: Option<usize>,
}

impl ServeCommand {
    fn apply(&self, config: &mut Config) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.headed {
            config.sniff.headless = false;
        }
        if let Some(max_jobs) = self.max_jobs {
            config.jobs.max_concurrent_jobs = max_jobs;
        }
    }

    pub async fn run(self, mut config: Config) -> Result<()> {
        self.apply(&mut config);

        let ip: IpAddr = config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", config.server.host))?;
        let addr = SocketAddr::new(ip, config.server.port);

        let pipeline = Arc::new(Pipeline::new(&config));
        pipeline
            .store()
            .ensure_dirs()
            .await
            .context("Failed to create storage directories")?;

        let jobs = Arc::new(JobStore::new(config.jobs.max_concurrent_jobs));
        let state = AppState {
            pipeline,
            jobs: Arc::clone(&jobs),
        };

        info!(
            "[serve] Downloads: {}, tiktok: {}, max jobs: {}",
            config.storage.downloads_dir.display(),
            config.storage.tiktok_dir.display(),
            config.jobs.max_concurrent_jobs
        );

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut server = tokio::spawn(crate::server::run_server(listener, state, shutdown_rx));

        tokio::select! {
            signal = shutdown_signal() => signal?,
            result = &mut server => {
                jobs.close();
                result
                    .context("Server task failed")?
                    .context("Server error")?;
                bail!("Server stopped unexpectedly");
            }
        }

        info!("[serve] Shutting down...");
        let _ = shutdown_tx.send(true);

        jobs.close();
        server
            .await
            .context("Server task failed")?
            .context("Server error")?;

        info!("[serve] Done.");
        Ok(())
    }
}

/// Resolve on Ctrl+C, or SIGTERM when running under a container runtime.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}
