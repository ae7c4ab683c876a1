use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::ffmpeg::{MediaError, run_tool};

/**
    JSON structure for ffprobe format output
*/
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/**
    Probe a media file with ffprobe and return its container duration.

    Fails when ffprobe cannot run, rejects the file, or reports no
    usable duration (which is how truncated downloads usually show up).
*/
pub async fn probe_duration(ffprobe: &Path, path: &Path) -> Result<Duration, MediaError> {
    let args: Vec<OsString> = vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        path.as_os_str().to_os_string(),
    ];
    let output = run_tool(ffprobe, &args).await?;

    parse_duration(&output.stdout, path)
}

fn parse_duration(stdout: &[u8], path: &Path) -> Result<Duration, MediaError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| MediaError::NoDuration(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = br#"{"format": {"filename": "a.mp4", "duration": "93.500000", "size": "1024"}}"#;
        let duration = parse_duration(json, Path::new("a.mp4")).unwrap();
        assert_eq!(duration.as_millis(), 93500);
    }

    #[test]
    fn test_missing_duration() {
        let json = br#"{"format": {"filename": "a.mp4"}}"#;
        assert!(matches!(
            parse_duration(json, Path::new("a.mp4")),
            Err(MediaError::NoDuration(_))
        ));

        let json = br#"{"format": {"duration": "N/A"}}"#;
        assert!(matches!(
            parse_duration(json, Path::new("a.mp4")),
            Err(MediaError::NoDuration(_))
        ));
    }

    #[test]
    fn test_unrepresentable_duration() {
        for duration in ["1e20", "inf", "-5", "0"] {
            let json = format!(r#"{{"format": {{"duration": "{duration}"}}}}"#);
            assert!(
                matches!(
                    parse_duration(json.as_bytes(), Path::new("a.mp4")),
                    Err(MediaError::NoDuration(_))
                ),
                "duration {duration} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_output() {
        // ffprobe -v quiet prints "{}" for files it cannot open
        assert!(matches!(
            parse_duration(b"{}", Path::new("a.mp4")),
            Err(MediaError::NoDuration(_))
        ));
        assert!(matches!(
            parse_duration(b"", Path::new("a.mp4")),
            Err(MediaError::ProbeParse(_))
        ));
    }
}
