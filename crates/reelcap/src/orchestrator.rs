// Acquisition orchestrator: observe the page, pick a delivery format, fetch
// or reconstruct the media, and hand it to the transcoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::AcquireError;
use crate::capture::RequestSource;
use crate::classifier::{Selection, VideoCandidate};
use crate::config::AcquireConfig;
use crate::events::{AcquisitionEvent, AcquisitionState, AcquisitionStep, DeliveryFormat};
use crate::fetcher::{HttpFetcher, ResourceFetcher};
use crate::reconstruct::ManifestReconstructor;
use crate::scratch::ScratchSpace;
use crate::session::AcquisitionSession;
use crate::transcode::{FfmpegTranscoder, Transcoder};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub session_id: Uuid,
    pub output: PathBuf,
    pub format: DeliveryFormat,
    pub video_url: String,
    /// Only set for the direct branch.
    pub audio_url: Option<String>,
    /// Media bytes downloaded before transcoding.
    pub bytes: u64,
}

/// Drives one acquisition from entry page to final file.
pub struct Acquirer {
    source: Arc<dyn RequestSource>,
    fetcher: Arc<dyn ResourceFetcher>,
    transcoder: Arc<dyn Transcoder>,
    config: AcquireConfig,
    events: Option<mpsc::UnboundedSender<AcquisitionEvent>>,
}

impl Acquirer {
    pub fn new(
        source: Arc<dyn RequestSource>,
        fetcher: Arc<dyn ResourceFetcher>,
        transcoder: Arc<dyn Transcoder>,
        config: AcquireConfig,
    ) -> Self {
        Self {
            source,
            fetcher,
            transcoder,
            config,
            events: None,
        }
    }

    /// HTTP fetcher and ffmpeg transcoder built from `config`.
    pub fn from_config(
        source: Arc<dyn RequestSource>,
        config: AcquireConfig,
    ) -> Result<Self, AcquireError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
        let transcoder = Arc::new(FfmpegTranscoder::new(config.transcode.clone()));
        Ok(Self::new(source, fetcher, transcoder, config))
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AcquisitionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Acquire the media behind `entry_url` into `output`.
    ///
    /// Either `output` holds the finished file or an error is returned; all
    /// intermediate files are removed in both cases. Errors raised inside the
    /// pipeline are wrapped with the step they escaped from.
    #[instrument(skip(self, output, token), fields(output = %output.display()))]
    pub async fn acquire(
        &self,
        entry_url: &str,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<AcquisitionReport, AcquireError> {
        self.validate(entry_url, output).await?;

        let mut session = AcquisitionSession::new(entry_url);
        let scratch = ScratchSpace::new(
            &self.config.work_dir,
            session.id(),
            &self.config.transcode.audio_extension,
        );
        let mut tracker = StateTracker::new(self.events.as_ref());
        debug!(session = %session.id(), "Starting acquisition");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(AcquireError::Cancelled),
            result = self.run(&mut session, &scratch, output, &mut tracker, token) => result,
        };

        scratch.cleanup().await;

        match result {
            Ok(report) => {
                tracker.transition(AcquisitionState::Done);
                tracker.emit(AcquisitionEvent::Completed {
                    output: report.output.clone(),
                    format: report.format,
                });
                info!(
                    format = %report.format,
                    bytes = report.bytes,
                    "Acquisition complete"
                );
                Ok(report)
            }
            Err(e) => {
                if tracker.output_started {
                    remove_partial_output(output).await;
                }
                tracker.transition(AcquisitionState::Failed);
                Err(e)
            }
        }
    }

    async fn validate(&self, entry_url: &str, output: &Path) -> Result<(), AcquireError> {
        url::Url::parse(entry_url)
            .map_err(|e| {
                AcquireError::invalid_input(format!("invalid URL `{entry_url}`: {e}"))
            })?;

        let work_dir = &self.config.work_dir;
        if !tokio::fs::metadata(work_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(AcquireError::invalid_input(format!(
                "work directory {} does not exist",
                work_dir.display()
            )));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty())
            && !tokio::fs::try_exists(parent).await.unwrap_or(false)
        {
            return Err(AcquireError::invalid_input(format!(
                "output directory {} does not exist",
                parent.display()
            )));
        }

        Ok(())
    }

    async fn run(
        &self,
        session: &mut AcquisitionSession,
        scratch: &ScratchSpace,
        output: &Path,
        tracker: &mut StateTracker<'_>,
        token: &CancellationToken,
    ) -> Result<AcquisitionReport, AcquireError> {
        tracker.transition(AcquisitionState::Observing);
        self.observe(session, token)
            .await
            .map_err(|e| e.at_step(AcquisitionStep::Observe))?;

        let selection = session
            .resolve()
            .map_err(|e| e.at_step(AcquisitionStep::Classify))?;
        tracker.transition(AcquisitionState::Classified);
        info!(
            format = %selection.video.format(),
            video = selection.video.url(),
            audio = ?selection.audio,
            "Selected candidates"
        );

        let bytes = match &selection.video {
            VideoCandidate::Direct(video_url) => {
                self.acquire_direct(video_url, &selection, scratch, output, tracker)
                    .await?
            }
            VideoCandidate::Segmented(manifest_url) => {
                self.acquire_segmented(manifest_url, scratch, output, tracker)
                    .await?
            }
        };

        Ok(AcquisitionReport {
            session_id: session.id(),
            output: output.to_path_buf(),
            format: selection.video.format(),
            video_url: selection.video.url().to_owned(),
            audio_url: match selection.video {
                VideoCandidate::Direct(_) => selection.audio,
                VideoCandidate::Segmented(_) => None,
            },
            bytes,
        })
    }

    async fn observe(
        &self,
        session: &mut AcquisitionSession,
        token: &CancellationToken,
    ) -> Result<(), AcquireError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let capture = self.source.start(session.entry_url(), tx).await?;

        let listened = {
            let mut classifier = session.classifier().with_events(self.events.clone());
            let listened = classifier
                .listen(&mut rx, &self.config.observation, token)
                .await;
            capture.stop().await;
            classifier.drain(&mut rx);
            listened
        };

        let pools = session.pools();
        debug!(
            segmented = pools.segmented_video().len(),
            direct = pools.direct_video().len(),
            audio = pools.audio().is_some(),
            "Observation finished"
        );
        listened
    }

    async fn acquire_direct(
        &self,
        video_url: &str,
        selection: &Selection,
        scratch: &ScratchSpace,
        output: &Path,
        tracker: &mut StateTracker<'_>,
    ) -> Result<u64, AcquireError> {
        let audio_url = selection.audio.as_deref().ok_or_else(|| {
            AcquireError::NoAudioCandidateFound {
                video_url: video_url.to_owned(),
            }
            .at_step(AcquisitionStep::Classify)
        })?;
        tracker.transition(AcquisitionState::Acquiring);

        let video = async {
            self.fetcher
                .fetch_to_file(video_url, scratch.raw_video())
                .await
                .map_err(|e| e.at_step(AcquisitionStep::FetchVideo))
        };
        let audio = async {
            let bytes = self
                .fetcher
                .fetch_to_file(audio_url, scratch.raw_audio())
                .await
                .map_err(|e| e.at_step(AcquisitionStep::FetchAudio))?;
            self.transcoder
                .transcode_audio(scratch.raw_audio(), scratch.audio())
                .await
                .map_err(|e| e.at_step(AcquisitionStep::TranscodeAudio))?;
            Ok::<_, AcquireError>(bytes)
        };
        let (video_bytes, audio_bytes) = tokio::try_join!(video, audio)?;
        debug!(video_bytes, audio_bytes, "Fetched direct video and audio");

        tracker.transition(AcquisitionState::Muxing);
        tracker.output_started = true;
        self.transcoder
            .mux(scratch.raw_video(), scratch.audio(), output)
            .await
            .map_err(|e| e.at_step(AcquisitionStep::Mux))?;

        Ok(video_bytes + audio_bytes)
    }

    async fn acquire_segmented(
        &self,
        manifest_url: &str,
        scratch: &ScratchSpace,
        output: &Path,
        tracker: &mut StateTracker<'_>,
    ) -> Result<u64, AcquireError> {
        tracker.transition(AcquisitionState::Acquiring);

        let mut reconstructor =
            ManifestReconstructor::new(self.fetcher.clone(), self.config.manifest.clone());
        if let Some(events) = &self.events {
            reconstructor = reconstructor.with_events(events.clone());
        }
        let summary = reconstructor
            .reconstruct_to_file(manifest_url, scratch.concat())
            .await
            .map_err(|e| e.at_step(AcquisitionStep::Reconstruct))?;

        tracker.output_started = true;
        self.transcoder
            .repackage(scratch.concat(), output)
            .await
            .map_err(|e| e.at_step(AcquisitionStep::Repackage))?;

        Ok(summary.bytes)
    }
}

struct StateTracker<'a> {
    state: AcquisitionState,
    events: Option<&'a mpsc::UnboundedSender<AcquisitionEvent>>,
    /// The final transcode step has begun writing to the output path.
    output_started: bool,
}

impl<'a> StateTracker<'a> {
    fn new(events: Option<&'a mpsc::UnboundedSender<AcquisitionEvent>>) -> Self {
        Self {
            state: AcquisitionState::Idle,
            events,
            output_started: false,
        }
    }

    fn transition(&mut self, to: AcquisitionState) {
        let from = self.state;
        self.state = to;
        info!(%from, %to, "State changed");
        self.emit(AcquisitionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: AcquisitionEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }
}

async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(path = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %output.display(), error = %e, "Failed to remove partial output"),
    }
}
