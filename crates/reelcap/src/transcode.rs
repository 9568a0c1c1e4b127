//! External transcode/mux step.
//!
//! Three fixed ffmpeg invocations: audio re-encode, video+audio mux, and
//! container repackaging. Each blocks until the tool exits; a non-zero exit
//! surfaces as [`AcquireError::Transcode`] carrying the tail of stderr.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::AcquireError;
use crate::config::TranscodeConfig;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Bytes of stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TranscodeOperation {
    TranscodeAudio,
    Mux,
    Repackage,
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `input` to the target audio codec, dropping any video.
    async fn transcode_audio(&self, input: &Path, output: &Path) -> Result<(), AcquireError>;

    /// Combine independently fetched video and audio without re-encoding.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), AcquireError>;

    /// Change container format only.
    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), AcquireError>;
}

/// ffmpeg-backed [`Transcoder`].
pub struct FfmpegTranscoder {
    config: TranscodeConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    /// Detect ffmpeg version.
    pub async fn version(&self) -> Option<String> {
        let output = command(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .ok()?;
        String::from_utf8(output.stdout)
            .ok()
            .and_then(|s| s.lines().next().map(|l| l.to_string()))
    }

    fn common_args() -> Vec<String> {
        ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
            .map(String::from)
            .to_vec()
    }

    pub fn transcode_audio_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::common_args();
        args.extend(["-i".to_string(), path_arg(input)]);
        args.push("-vn".to_string());
        args.extend(["-acodec".to_string(), self.config.audio_codec.clone()]);
        args.extend(["-b:a".to_string(), self.config.audio_bitrate.clone()]);
        args.push(path_arg(output));
        args
    }

    pub fn mux_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::common_args();
        args.extend(["-i".to_string(), path_arg(video)]);
        args.extend(["-i".to_string(), path_arg(audio)]);
        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        args.extend(["-map".to_string(), "1:a:0".to_string()]);
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(path_arg(output));
        args
    }

    pub fn repackage_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::common_args();
        args.extend(["-i".to_string(), path_arg(input)]);
        args.extend(["-c".to_string(), "copy".to_string()]);
        args.push(path_arg(output));
        args
    }

    async fn run(
        &self,
        operation: TranscodeOperation,
        args: Vec<String>,
        output: &Path,
    ) -> Result<(), AcquireError> {
        info!(%operation, output = %output.display(), "Running ffmpeg");
        debug!("FFmpeg args: {:?}", args);

        let child = command(&self.config.ffmpeg_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AcquireError::Spawn {
                program: self.config.ffmpeg_path.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    remove_partial(output).await;
                    return Err(AcquireError::timeout(operation.to_string(), limit));
                }
            },
            None => wait.await,
        }?;

        if result.status.success() {
            return Ok(());
        }

        remove_partial(output).await;
        Err(AcquireError::Transcode {
            operation,
            status: result.status.code(),
            stderr: stderr_tail(&result.stderr),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode_audio(&self, input: &Path, output: &Path) -> Result<(), AcquireError> {
        let args = self.transcode_audio_args(input, output);
        self.run(TranscodeOperation::TranscodeAudio, args, output)
            .await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), AcquireError> {
        let args = self.mux_args(video, audio, output);
        self.run(TranscodeOperation::Mux, args, output).await
    }

    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), AcquireError> {
        let args = self.repackage_args(input, output);
        self.run(TranscodeOperation::Repackage, args, output).await
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
fn command(program: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(path = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %output.display(), error = %e, "Failed to remove partial output"),
    }
}
