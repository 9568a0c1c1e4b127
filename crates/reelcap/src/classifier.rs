// Request classifier: buckets observed request URLs into candidate pools and
// picks the authoritative video and audio once observation has settled.

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::AcquireError;
use crate::capture::ObservedRequest;
use crate::config::ObservationConfig;
use crate::events::{AcquisitionEvent, DeliveryFormat};

const AUDIO_SUFFIX: &str = "cmfa";
const DIRECT_VIDEO_SUFFIX: &str = "cmfv";
const SEGMENTED_VIDEO_SUFFIX: &str = "m3u8";

/// Role of an observed request, decided by exact, case-sensitive URL suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Audio,
    DirectVideo,
    SegmentedVideo,
}

impl RequestKind {
    /// Classify `url` by suffix. Query strings are not stripped, so a URL
    /// with one never matches.
    pub fn classify(url: &str) -> Option<Self> {
        if url.ends_with(AUDIO_SUFFIX) {
            Some(Self::Audio)
        } else if url.ends_with(DIRECT_VIDEO_SUFFIX) {
            Some(Self::DirectVideo)
        } else if url.ends_with(SEGMENTED_VIDEO_SUFFIX) {
            Some(Self::SegmentedVideo)
        } else {
            None
        }
    }
}

/// Candidate URLs in arrival order, one pool per delivery role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePools {
    segmented_video: Vec<String>,
    direct_video: Vec<String>,
    audio: Option<String>,
}

impl CandidatePools {
    /// Record one observed URL. Audio overwrites (last observation wins),
    /// video URLs are appended. Unmatched URLs are ignored.
    pub fn observe(&mut self, url: &str) -> Option<RequestKind> {
        let kind = RequestKind::classify(url)?;
        match kind {
            RequestKind::Audio => self.audio = Some(url.to_owned()),
            RequestKind::DirectVideo => self.direct_video.push(url.to_owned()),
            RequestKind::SegmentedVideo => self.segmented_video.push(url.to_owned()),
        }
        Some(kind)
    }

    pub fn segmented_video(&self) -> &[String] {
        &self.segmented_video
    }

    pub fn direct_video(&self) -> &[String] {
        &self.direct_video
    }

    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref()
    }

    /// Enough has been seen to run either acquisition branch.
    pub fn is_settled(&self) -> bool {
        !self.segmented_video.is_empty() || (!self.direct_video.is_empty() && self.audio.is_some())
    }

    /// Pick the authoritative candidates.
    ///
    /// A non-empty direct-video pool always beats the segmented pool, and
    /// within a pool the most recently observed URL wins.
    pub fn select(&self) -> Result<Selection, AcquireError> {
        let video = if let Some(url) = self.direct_video.last() {
            VideoCandidate::Direct(url.clone())
        } else if let Some(url) = self.segmented_video.last() {
            VideoCandidate::Segmented(url.clone())
        } else {
            return Err(AcquireError::NoVideoCandidateFound);
        };

        Ok(Selection {
            video,
            audio: self.audio.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCandidate {
    Direct(String),
    Segmented(String),
}

impl VideoCandidate {
    pub fn url(&self) -> &str {
        match self {
            Self::Direct(url) | Self::Segmented(url) => url,
        }
    }

    pub fn format(&self) -> DeliveryFormat {
        match self {
            Self::Direct(_) => DeliveryFormat::Direct,
            Self::Segmented(_) => DeliveryFormat::Segmented,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub video: VideoCandidate,
    /// May be empty; only the direct branch needs it.
    pub audio: Option<String>,
}

/// Single writer of a session's candidate pools while the page is observed.
pub struct RequestClassifier<'a> {
    pools: &'a mut CandidatePools,
    events: Option<mpsc::UnboundedSender<AcquisitionEvent>>,
}

impl<'a> RequestClassifier<'a> {
    pub fn new(pools: &'a mut CandidatePools) -> Self {
        Self { pools, events: None }
    }

    pub fn with_events(mut self, events: Option<mpsc::UnboundedSender<AcquisitionEvent>>) -> Self {
        self.events = events;
        self
    }

    pub fn observe(&mut self, url: &str) -> Option<RequestKind> {
        let kind = self.pools.observe(url);
        match kind {
            Some(kind) => {
                debug!(%kind, url, "Observed media request");
                if let Some(tx) = &self.events {
                    let _ = tx.send(AcquisitionEvent::RequestObserved {
                        kind,
                        url: url.to_owned(),
                    });
                }
            }
            None => trace!(url, "Ignored request"),
        }
        kind
    }

    /// Consume observed requests until classification settles.
    ///
    /// With `fixed_window` set, listens for exactly that long. Otherwise
    /// listens until [`CandidatePools::is_settled`] holds, then for
    /// `settle_grace` more, never past `timeout`. Returns early when the
    /// request stream ends. Hitting the timeout is not an error here; an
    /// empty selection fails later in [`CandidatePools::select`].
    pub async fn listen(
        &mut self,
        requests: &mut mpsc::UnboundedReceiver<ObservedRequest>,
        config: &ObservationConfig,
        token: &CancellationToken,
    ) -> Result<(), AcquireError> {
        if let Some(window) = config.fixed_window {
            return self.listen_fixed(requests, window, token).await;
        }

        let started = Instant::now();
        let deadline = started + config.timeout;
        let mut settled_at: Option<Instant> = None;

        loop {
            let wake = settled_at.map_or(deadline, |at| (at + config.settle_grace).min(deadline));

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(AcquireError::Cancelled),
                _ = sleep_until(wake) => {
                    if settled_at.is_none() {
                        warn!(timeout = ?config.timeout, "Observation timed out before classification settled");
                    }
                    return Ok(());
                }
                request = requests.recv() => match request {
                    Some(request) => {
                        self.observe(&request.url);
                        if settled_at.is_none() && self.pools.is_settled() {
                            info!(elapsed = ?started.elapsed(), "Classification settled");
                            settled_at = Some(Instant::now());
                        }
                    }
                    None => {
                        debug!("Request stream closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn listen_fixed(
        &mut self,
        requests: &mut mpsc::UnboundedReceiver<ObservedRequest>,
        window: std::time::Duration,
        token: &CancellationToken,
    ) -> Result<(), AcquireError> {
        let deadline = Instant::now() + window;
        let mut open = true;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(AcquireError::Cancelled),
                _ = sleep_until(deadline) => return Ok(()),
                request = requests.recv(), if open => match request {
                    Some(request) => {
                        self.observe(&request.url);
                    }
                    None => open = false,
                },
            }
        }
    }

    /// Take whatever is already queued without waiting.
    pub fn drain(&mut self, requests: &mut mpsc::UnboundedReceiver<ObservedRequest>) {
        while let Ok(request) = requests.try_recv() {
            self.observe(&request.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pools_from(urls: &[&str]) -> CandidatePools {
        let mut pools = CandidatePools::default();
        for url in urls {
            pools.observe(url);
        }
        pools
    }

    #[test]
    fn classify_by_exact_suffix() {
        assert_eq!(
            RequestKind::classify("https://v.example.com/a/audio.cmfa"),
            Some(RequestKind::Audio)
        );
        assert_eq!(
            RequestKind::classify("https://v.example.com/a/video.cmfv"),
            Some(RequestKind::DirectVideo)
        );
        assert_eq!(
            RequestKind::classify("https://v.example.com/a/index.m3u8"),
            Some(RequestKind::SegmentedVideo)
        );
        assert_eq!(RequestKind::classify("https://v.example.com/a/INDEX.M3U8"), None);
        assert_eq!(RequestKind::classify("https://v.example.com/a/index.m3u8?x=1"), None);
        assert_eq!(RequestKind::classify("https://v.example.com/app.js"), None);
    }

    #[test]
    fn pools_keep_arrival_order_and_only_matching_urls() {
        let pools = pools_from(&[
            "https://h/a.m3u8",
            "https://h/style.css",
            "https://h/1.cmfv",
            "https://h/b.m3u8",
            "https://h/2.cmfv",
        ]);

        assert_eq!(pools.segmented_video(), ["https://h/a.m3u8", "https://h/b.m3u8"]);
        assert_eq!(pools.direct_video(), ["https://h/1.cmfv", "https://h/2.cmfv"]);
        assert_eq!(pools.audio(), None);
    }

    #[test]
    fn audio_last_observation_wins() {
        let pools = pools_from(&["https://h/low.cmfa", "https://h/high.cmfa"]);
        assert_eq!(pools.audio(), Some("https://h/high.cmfa"));
    }

    #[test]
    fn direct_pool_beats_segmented_pool() {
        let pools = pools_from(&[
            "https://h/a.cmfv",
            "https://h/b.cmfv",
            "https://h/late.m3u8",
            "https://h/x.cmfa",
        ]);

        let selection = pools.select().unwrap();
        assert_eq!(selection.video, VideoCandidate::Direct("https://h/b.cmfv".to_owned()));
        assert_eq!(selection.audio.as_deref(), Some("https://h/x.cmfa"));
    }

    #[test]
    fn segmented_pool_picks_last_arrival() {
        let pools = pools_from(&["https://h/first.m3u8", "https://h/second.m3u8"]);
        let selection = pools.select().unwrap();
        assert_eq!(
            selection.video,
            VideoCandidate::Segmented("https://h/second.m3u8".to_owned())
        );
        assert_eq!(selection.video.format(), DeliveryFormat::Segmented);
        assert!(selection.audio.is_none());
    }

    #[test]
    fn no_video_candidate_fails_selection() {
        let pools = pools_from(&["https://h/only.cmfa", "https://h/page.html"]);
        assert!(matches!(
            pools.select(),
            Err(AcquireError::NoVideoCandidateFound)
        ));
    }

    #[test]
    fn settled_needs_manifest_or_direct_video_with_audio() {
        assert!(!pools_from(&["https://h/1.cmfv"]).is_settled());
        assert!(pools_from(&["https://h/1.cmfv", "https://h/1.cmfa"]).is_settled());
        assert!(pools_from(&["https://h/1.m3u8"]).is_settled());
    }

    #[tokio::test]
    async fn listen_returns_when_stream_closes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for url in ["https://h/1.cmfv", "https://h/1.cmfa"] {
            tx.send(ObservedRequest::new(url)).unwrap();
        }
        drop(tx);

        let mut pools = CandidatePools::default();
        let config = ObservationConfig {
            timeout: Duration::from_secs(30),
            settle_grace: Duration::from_secs(30),
            fixed_window: None,
        };
        RequestClassifier::new(&mut pools)
            .listen(&mut rx, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pools.direct_video().len(), 1);
        assert!(pools.audio().is_some());
    }

    #[tokio::test]
    async fn listen_stops_after_settle_grace() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ObservedRequest::new("https://h/index.m3u8")).unwrap();

        let mut pools = CandidatePools::default();
        let config = ObservationConfig {
            timeout: Duration::from_secs(30),
            settle_grace: Duration::from_millis(20),
            fixed_window: None,
        };
        let started = std::time::Instant::now();
        RequestClassifier::new(&mut pools)
            .listen(&mut rx, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(pools.segmented_video().len(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn settle_grace_admits_late_manifest_but_not_later_video() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ObservedRequest::new("https://h/a.m3u8")).unwrap();

        let mut pools = CandidatePools::default();
        let config = ObservationConfig {
            timeout: Duration::from_secs(30),
            settle_grace: Duration::from_millis(250),
            fixed_window: None,
        };
        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(ObservedRequest::new("https://h/b.m3u8")).unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = tx.send(ObservedRequest::new("https://h/late.cmfv"));
        });

        RequestClassifier::new(&mut pools)
            .listen(&mut rx, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pools.segmented_video(), ["https://h/a.m3u8", "https://h/b.m3u8"]);
        assert!(pools.direct_video().is_empty());
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn listen_times_out_without_candidates() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ObservedRequest>();

        let mut pools = CandidatePools::default();
        let config = ObservationConfig {
            timeout: Duration::from_millis(20),
            settle_grace: Duration::from_secs(1),
            fixed_window: None,
        };
        RequestClassifier::new(&mut pools)
            .listen(&mut rx, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(pools.select().is_err());
        drop(tx);
    }

    #[tokio::test]
    async fn fixed_window_keeps_listening_after_settle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ObservedRequest::new("https://h/a.m3u8")).unwrap();

        let mut pools = CandidatePools::default();
        let config = ObservationConfig {
            fixed_window: Some(Duration::from_millis(100)),
            ..ObservationConfig::default()
        };
        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(ObservedRequest::new("https://h/b.m3u8")).unwrap();
        });

        RequestClassifier::new(&mut pools)
            .listen(&mut rx, &config, &CancellationToken::new())
            .await
            .unwrap();
        sender.await.unwrap();

        assert_eq!(pools.segmented_video(), ["https://h/a.m3u8", "https://h/b.m3u8"]);
    }

    #[tokio::test]
    async fn cancellation_aborts_listening() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<ObservedRequest>();
        let token = CancellationToken::new();
        token.cancel();

        let mut pools = CandidatePools::default();
        let err = RequestClassifier::new(&mut pools)
            .listen(&mut rx, &ObservationConfig::default(), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::Cancelled));
    }
}
