use std::ffi::OsString;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::FfmpegConfig;
use crate::storage::{file_size_mb, remove_if_exists};

use super::ffmpeg::{MediaError, command_line, run_tool};
use super::probe::probe_duration;

/// Summary of a finished compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub input_mb: f64,
    pub output_mb: f64,
    pub duration: Duration,
    pub elapsed: Duration,
}

/**
    Downloads HLS streams and compresses them by shelling out to the
    ffmpeg and ffprobe binaries.
*/
#[derive(Debug, Clone)]
pub struct Transcoder {
    config: FfmpegConfig,
}

impl Transcoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Nominal bitrate of compressed output as (video, audio) kbps.
    pub fn output_bitrate(&self) -> (u32, u32) {
        (self.config.video_bitrate, self.config.audio_bitrate)
    }

    fn download_args(&self, m3u8_url: &str, output: &Path) -> Vec<OsString> {
        let timeout_us = (self.config.network_timeout * 1_000_000.0).round() as u64;
        vec![
            "-y".into(),
            "-timeout".into(),
            timeout_us.to_string().into(),
            "-i".into(),
            m3u8_url.into(),
            "-c".into(),
            "copy".into(),
            output.as_os_str().to_os_string(),
        ]
    }

    fn compress_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-vcodec".into(),
            c.video_codec.as_str().into(),
            "-crf".into(),
            c.crf.to_string().into(),
            "-preset".into(),
            c.preset.as_str().into(),
            "-b:v".into(),
            format!("{}k", c.video_bitrate).into(),
            "-maxrate".into(),
            format!("{}k", c.video_bitrate).into(),
            "-bufsize".into(),
            format!("{}k", c.bufsize).into(),
            "-vf".into(),
            format!("scale=-2:{}", c.height).into(),
            "-acodec".into(),
            c.audio_codec.as_str().into(),
            "-ab".into(),
            format!("{}k", c.audio_bitrate).into(),
            "-movflags".into(),
            "+faststart".into(),
        ];
        if let Some(tune) = &c.tune {
            args.push("-tune".into());
            args.push(tune.as_str().into());
        }
        args.push("-threads".into());
        args.push(c.threads.to_string().into());
        args.push(output.as_os_str().to_os_string());
        args
    }

    /**
        Copy an HLS stream into a local file without re-encoding.
    */
    pub async fn download(&self, m3u8_url: &str, output: &Path) -> Result<(), MediaError> {
        let output = std::path::absolute(output)?;
        info!("[media] Downloading video to {} ...", output.display());

        match run_tool(&self.config.ffmpeg, self.download_args(m3u8_url, &output)).await {
            Ok(out) => {
                info!("[media] Download completed: {}", output.display());
                tracing::debug!(
                    "[media] ffmpeg stdout: {}",
                    String::from_utf8_lossy(&out.stdout)
                );
                Ok(())
            }
            Err(e) => {
                log_failure("Download", &e);
                Err(e)
            }
        }
    }

    /**
        Re-encode `input` into `output` using the configured encoder
        settings, deleting `input` once the encode succeeds.

        With `require_smaller` set, an output that is not smaller than
        the input is reported as [`MediaError::NotSmaller`]; the caller
        owns cleanup of `output` in that case.
    */
    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<CompressionReport, MediaError> {
        let input = std::path::absolute(input)?;
        let output = std::path::absolute(output)?;

        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            warn!("[media] Input file not found: {}", input.display());
            return Err(MediaError::MissingInput(input));
        }

        let input_mb = file_size_mb(&input).await?;
        info!("[media] Input file size: {:.2} MB", input_mb);

        let duration = match probe_duration(&self.config.ffprobe, &input).await {
            Ok(d) => d,
            Err(e) => {
                warn!("[media] Error probing duration: {}", e);
                warn!("[media] Skipping compression due to invalid input file");
                return Err(e);
            }
        };
        info!("[media] Video duration: {:.2} seconds", duration.as_secs_f64());

        let args = self.compress_args(&input, &output);
        info!(
            "[media] FFmpeg command: {}",
            command_line(&self.config.ffmpeg, &args)
        );

        let start = Instant::now();
        if let Err(e) = run_tool(&self.config.ffmpeg, &args).await {
            log_failure("Compression", &e);
            return Err(e);
        }
        let elapsed = start.elapsed();

        let output_mb = file_size_mb(&output).await?;
        info!("[media] Compression completed: {}", output.display());
        info!("[media] Output file size: {:.2} MB", output_mb);
        info!("[media] Compression time: {:.2} seconds", elapsed.as_secs_f64());

        remove_if_exists(&input).await?;

        if self.config.require_smaller && output_mb >= input_mb {
            warn!(
                "[media] Output file size ({:.2} MB) is not smaller than input ({:.2} MB)",
                output_mb, input_mb
            );
            return Err(MediaError::NotSmaller {
                input_mb,
                output_mb,
            });
        }

        Ok(CompressionReport {
            input_mb,
            output_mb,
            duration,
            elapsed,
        })
    }
}

fn log_failure(what: &str, error: &MediaError) {
    match error {
        MediaError::NonZeroExit { stdout, stderr, .. } => {
            tracing::error!("[media] {what} failed:\nStderr: {stderr}\nStdout: {stdout}");
        }
        other => tracing::error!("[media] Unexpected error during {what}: {other}"),
    }
}
