use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrome_browser::{
    ChromeBrowser, ChromeBrowserTab, ChromeLaunchOptions, NetworkRequestStream,
};
use tracing::{info, warn};

use crate::config::{SniffConfig, seconds};

use super::collector::LinkCollector;

/**
    Finds HLS playlist URLs by loading a page in Chrome and watching the
    requests its player makes.
*/
#[derive(Debug, Clone)]
pub struct StreamSniffer {
    config: SniffConfig,
}

impl StreamSniffer {
    pub fn new(config: SniffConfig) -> Self {
        Self { config }
    }

    /**
        Extract stream links from `url`, retrying with the next navigation
        timeout when an attempt fails or finds nothing.

        Returns an empty list when every attempt comes up empty.
    */
    pub async fn extract_links(&self, url: &str) -> Vec<String> {
        let timeouts = self.config.attempt_durations();
        retry_attempts(&timeouts, |attempt, timeout| {
            self.run_attempt(url, timeout, attempt)
        })
        .await
    }

    /// Launch Chrome with the configured window mode and proxy.
    async fn launch_browser(&self) -> Result<ChromeBrowser> {
        let config = &self.config;
        let mut options = ChromeLaunchOptions::default()
            .headless(config.headless)
            .devtools(false)
            .enable_gpu(config.headless);
        if let Some(proxy) = &config.proxy {
            info!("[sniff] Using proxy {}", proxy);
            options = options.proxy_server(proxy);
        }
        ChromeBrowser::new(options).await
    }

    async fn run_attempt(
        &self,
        url: &str,
        timeout: Duration,
        attempt: usize,
    ) -> Result<Vec<String>> {
        let mut collector = LinkCollector::new(&self.config.stream_pattern)?;

        let browser = self.launch_browser().await?;
        let tab = match browser.get_tab(0).await {
            Some(tab) => tab,
            None => {
                let _ = browser.close().await;
                return Err(anyhow!("No browser tab available"));
            }
        };

        // Subscribe before navigating so the first playlist request is not missed
        let mut requests = tab.network().requests();

        let result = self
            .drive_page(&tab, &mut requests, &mut collector, url, timeout, attempt)
            .await;

        let _ = tab.navigate("about:blank").await;
        let _ = browser.close().await;

        result.map(|()| collector.into_links())
    }

    async fn drive_page(
        &self,
        tab: &ChromeBrowserTab,
        requests: &mut NetworkRequestStream,
        collector: &mut LinkCollector,
        url: &str,
        timeout: Duration,
        attempt: usize,
    ) -> Result<()> {
        info!(
            "[sniff] Attempt {}: Navigating to {} with {}s timeout",
            attempt,
            url,
            timeout.as_secs_f64()
        );
        let navigation = tokio::time::timeout(timeout, tab.navigate(url));
        collect_while(requests, collector, navigation)
            .await
            .map_err(|_| anyhow!("Timeout navigating to URL: {}", url))??;

        collect_for(requests, collector, seconds(self.config.settle_delay)).await;

        let overlay_script = hide_overlay_script(&self.config.overlay_selector);
        collect_while(requests, collector, tab.eval_json(overlay_script, false)).await?;

        let has_button = collect_while(
            requests,
            collector,
            tab.eval_json(exists_script(&self.config.play_selector), false),
        )
        .await?;

        if has_button.as_bool().unwrap_or(false) {
            info!("[sniff] Attempt {}: Clicking play button...", attempt);
            let click = async {
                let element = tab.wait_for_selector(&self.config.play_selector).await?;
                element.click().await?;
                Ok::<(), anyhow::Error>(())
            };
            let clicked = collect_while(
                requests,
                collector,
                tokio::time::timeout(seconds(self.config.click_timeout), click),
            )
            .await;
            match clicked {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "[sniff] Attempt {}: Click failed: {}, continuing...",
                    attempt, e
                ),
                Err(_) => warn!(
                    "[sniff] Attempt {}: Timeout clicking play button, continuing...",
                    attempt
                ),
            }
        } else {
            info!("[sniff] Attempt {}: Play button not found", attempt);
        }

        collect_for(requests, collector, seconds(self.config.play_wait)).await;

        if !collector.is_empty() {
            info!(
                "[sniff] Attempt {}: Collected {} stream link(s)",
                attempt,
                collector.len()
            );
        }
        Ok(())
    }
}

/**
    Run one attempt per navigation timeout until one finds links.

    Failed and empty attempts are logged and followed by the next one;
    when every attempt comes up empty the result is empty.
*/
async fn retry_attempts<F, Fut>(timeouts: &[Duration], mut run: F) -> Vec<String>
where
    F: FnMut(usize, Duration) -> Fut,
    Fut: Future<Output = Result<Vec<String>>>,
{
    for (index, timeout) in timeouts.iter().enumerate() {
        let attempt = index + 1;
        if attempt > 1 {
            info!("[sniff] Retrying with extended timeout...");
        }

        match run(attempt, *timeout).await {
            Ok(links) if !links.is_empty() => return links,
            Ok(_) => info!("[sniff] Attempt {}: No stream links found", attempt),
            Err(e) => warn!("[sniff] Attempt {}: {}", attempt, e),
        }
    }

    Vec::new()
}

/**
    Drive `fut` to completion while recording every matching request the
    page makes in the meantime.
*/
async fn collect_while<F: Future>(
    requests: &mut NetworkRequestStream,
    collector: &mut LinkCollector,
    fut: F,
) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => return output,
            request = requests.next() => match request {
                Some(request) => {
                    let url = request.url().to_string();
                    if collector.observe(&url) {
                        info!("[sniff] Found stream link: {}", url);
                    }
                }
                // Stream closed, nothing more to collect
                None => return fut.await,
            },
        }
    }
}

async fn collect_for(
    requests: &mut NetworkRequestStream,
    collector: &mut LinkCollector,
    duration: Duration,
) {
    collect_while(requests, collector, tokio::time::sleep(duration)).await
}

fn hide_overlay_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            const overlay = document.querySelector({selector:?});
            if (overlay) {{
                overlay.style.pointerEvents = 'none';
                overlay.style.opacity = '0';
            }}
            return overlay !== null;
        }})()"#
    )
}

fn exists_script(selector: &str) -> String {
    format!("document.querySelector({selector:?}) !== null")
}
