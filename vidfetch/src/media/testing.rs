use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::FfmpegConfig;

/// Write an executable `sh` script standing in for a media tool.
/// `$out` holds the last argument, which is the output path for ffmpeg.
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!("#!/bin/sh\nfor out; do :; done\n{body}\n");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// ffprobe that reports a 12.5 second file.
pub fn fake_ffprobe(dir: &Path) -> PathBuf {
    fake_tool(
        dir,
        "ffprobe",
        r#"echo '{"format": {"duration": "12.500000"}}'"#,
    )
}

/// Tools living in `dir`, with `ffmpeg_body` as the ffmpeg script.
pub fn fake_config(dir: &Path, ffmpeg_body: &str) -> FfmpegConfig {
    FfmpegConfig {
        ffmpeg: fake_tool(dir, "ffmpeg", ffmpeg_body),
        ffprobe: fake_ffprobe(dir),
        ..FfmpegConfig::default()
    }
}
