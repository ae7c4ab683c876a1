use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::media::Transcoder;
use crate::sniff::StreamSniffer;
use crate::storage::{VideoId, VideoStore, remove_if_exists};

/// Result of a processing job, as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessResponse {
    Success { file: String, total_time: f64 },
    Error { message: String },
}

impl ProcessResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Stage at which a job gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFailure {
    Storage,
    NoStreams,
    Download,
    Compression,
}

impl ProcessFailure {
    pub fn message(self) -> &'static str {
        match self {
            ProcessFailure::Storage => "Storage unavailable. Check server logs for details.",
            ProcessFailure::NoStreams => "No m3u8 links found after retries.",
            ProcessFailure::Download => "Download failed. Check server logs for details.",
            ProcessFailure::Compression => "Compression failed. Check server logs for details.",
        }
    }
}

impl From<ProcessFailure> for ProcessResponse {
    fn from(failure: ProcessFailure) -> Self {
        ProcessResponse::error(failure.message())
    }
}

/**
    Sniff → download → compress, for a single video.
*/
#[derive(Debug, Clone)]
pub struct Pipeline {
    store: VideoStore,
    sniffer: StreamSniffer,
    transcoder: Transcoder,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            store: VideoStore::new(&config.storage),
            sniffer: StreamSniffer::new(config.sniff.clone()),
            transcoder: Transcoder::new(config.ffmpeg.clone()),
        }
    }

    pub fn store(&self) -> &VideoStore {
        &self.store
    }

    pub async fn process(&self, id: &VideoId, url: &str) -> ProcessResponse {
        let start = Instant::now();

        let result = self.run(id, url).await;

        let total_time = start.elapsed().as_secs_f64();
        info!("[pipeline] Total processing time: {:.2} seconds", total_time);

        match result {
            Ok(file) => {
                let (video_kbps, audio_kbps) = self.transcoder.output_bitrate();
                info!(
                    "[pipeline] Output video bitrate: ~{} kbps (video) + {} kbps (audio)",
                    video_kbps, audio_kbps
                );
                ProcessResponse::Success { file, total_time }
            }
            Err(failure) => {
                warn!("[pipeline] Job {} failed: {}", id, failure.message());
                failure.into()
            }
        }
    }

    async fn run(&self, id: &VideoId, url: &str) -> Result<String, ProcessFailure> {
        if let Err(e) = self.store.ensure_dirs().await {
            error!("[pipeline] Failed to create storage directories: {}", e);
            return Err(ProcessFailure::Storage);
        }

        let links = self.sniffer.extract_links(url).await;
        let Some(stream_url) = links.first() else {
            return Err(ProcessFailure::NoStreams);
        };

        self.fetch(id, stream_url).await
    }

    /// Download `stream_url` and compress it into the output file for `id`.
    async fn fetch(&self, id: &VideoId, stream_url: &str) -> Result<String, ProcessFailure> {
        let temp_path = self.store.temp_path(id);
        if self.transcoder.download(stream_url, &temp_path).await.is_err() {
            self.cleanup(&[&temp_path]).await;
            return Err(ProcessFailure::Download);
        }

        let output_path = self.store.output_path(id);
        match self.transcoder.compress(&temp_path, &output_path).await {
            Ok(report) => info!(
                "[pipeline] {}: {:.0}s of video, {:.2} MB -> {:.2} MB in {:.2}s",
                id,
                report.duration.as_secs_f64(),
                report.input_mb,
                report.output_mb,
                report.elapsed.as_secs_f64()
            ),
            Err(_) => {
                self.cleanup(&[&temp_path, &output_path]).await;
                return Err(ProcessFailure::Compression);
            }
        }

        Ok(output_path.display().to_string())
    }

    async fn cleanup(&self, paths: &[&std::path::Path]) {
        for path in paths {
            if let Err(e) = remove_if_exists(path).await {
                warn!("[pipeline] Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
