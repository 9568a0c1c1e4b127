//! Shared helpers for the engine integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reelcap_engine::{
    AcquireConfig, AcquireError, HttpConfig, ObservationConfig, TranscodeOperation, Transcoder,
};

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// HTTP settings that never route test traffic through a system proxy.
pub fn local_http_config() -> HttpConfig {
    HttpConfig {
        use_system_proxy: false,
        ..HttpConfig::default()
    }
}

/// Config with short observation timings and scratch files in `work_dir`.
pub fn test_config(work_dir: &Path) -> AcquireConfig {
    AcquireConfig {
        http: local_http_config(),
        observation: ObservationConfig {
            timeout: Duration::from_secs(5),
            settle_grace: Duration::from_millis(20),
            fixed_window: None,
        },
        work_dir: work_dir.to_path_buf(),
        ..AcquireConfig::default()
    }
}

/// Stand-in for ffmpeg that records each call and writes deterministic output.
///
/// `transcode_audio` prefixes the input with `mp3:`. `mux` joins video and
/// audio with `|`. `repackage` copies the input verbatim.
#[derive(Default)]
pub struct RecordingTranscoder {
    calls: Mutex<Vec<TranscodeOperation>>,
    fail_on: Option<TranscodeOperation>,
}

impl RecordingTranscoder {
    pub fn failing_on(operation: TranscodeOperation) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(operation),
        }
    }

    pub fn calls(&self) -> Vec<TranscodeOperation> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(
        &self,
        operation: TranscodeOperation,
        output: &Path,
        body: Vec<u8>,
    ) -> Result<(), AcquireError> {
        self.calls.lock().unwrap().push(operation);
        if self.fail_on == Some(operation) {
            // leave a truncated file behind, like an interrupted ffmpeg run
            tokio::fs::write(output, b"partial").await?;
            return Err(AcquireError::Transcode {
                operation,
                status: Some(1),
                stderr: "Invalid data found when processing input".to_owned(),
            });
        }
        tokio::fs::write(output, body).await?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn transcode_audio(&self, input: &Path, output: &Path) -> Result<(), AcquireError> {
        let mut body = b"mp3:".to_vec();
        body.extend(tokio::fs::read(input).await?);
        self.record(TranscodeOperation::TranscodeAudio, output, body)
            .await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), AcquireError> {
        let mut body = tokio::fs::read(video).await?;
        body.push(b'|');
        body.extend(tokio::fs::read(audio).await?);
        self.record(TranscodeOperation::Mux, output, body).await
    }

    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), AcquireError> {
        let body = tokio::fs::read(input).await?;
        self.record(TranscodeOperation::Repackage, output, body)
            .await
    }
}

/// Number of entries left in `dir`.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
