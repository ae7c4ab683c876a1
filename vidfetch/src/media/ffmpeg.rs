use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use thiserror::Error;
use tokio::process::Command;

/**
    Typed media error for structured error handling.
*/
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("failed to parse ffprobe output: {0}")]
    ProbeParse(#[from] serde_json::Error),
    #[error("no duration reported for {}", .0.display())]
    NoDuration(PathBuf),
    #[error("output ({output_mb:.2} MB) is not smaller than input ({input_mb:.2} MB)")]
    NotSmaller { input_mb: f64, output_mb: f64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

/**
    Run a media tool to completion, capturing its output.

    The child is killed if the returned future is dropped, so a cancelled
    request does not leave an orphaned transcode behind.
*/
pub async fn run_tool<I, S>(program: &Path, args: I) -> Result<Output, MediaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            program: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::NonZeroExit {
            program: name,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output)
}

/// Render an argument list the way it would be typed in a shell, for logs.
pub fn command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
