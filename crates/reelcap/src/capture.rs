//! Boundary to the page-automation layer.
//!
//! A [`RequestSource`] loads an entry page and reports every outbound request
//! it sees. The engine only needs URLs, in arrival order.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::AcquireError;

/// One "request about to be sent" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub url: String,
}

impl ObservedRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

pub type RequestSink = mpsc::UnboundedSender<ObservedRequest>;

#[async_trait]
pub trait RequestSource: Send + Sync {
    /// Attach a request listener, then navigate to `entry_url`.
    ///
    /// Implementations must start forwarding to `sink` before navigation
    /// begins and keep forwarding, in arrival order, until the returned
    /// handle is stopped. Resolves once navigation has completed.
    async fn start(
        &self,
        entry_url: &str,
        sink: RequestSink,
    ) -> Result<Box<dyn CaptureHandle>, AcquireError>;
}

/// A running capture. Stopping it detaches the listener.
#[async_trait]
pub trait CaptureHandle: Send {
    async fn stop(self: Box<Self>);
}

/// Replays a fixed list of request URLs, as if a page had issued them.
///
/// Useful offline and in tests; also handy when the URLs were captured by
/// some other tool.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRequestSource {
    urls: Vec<String>,
    interval: Option<Duration>,
    navigation_error: Option<String>,
}

impl ScriptedRequestSource {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Space requests out instead of emitting them back to back.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Make navigation fail with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            navigation_error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RequestSource for ScriptedRequestSource {
    async fn start(
        &self,
        entry_url: &str,
        sink: RequestSink,
    ) -> Result<Box<dyn CaptureHandle>, AcquireError> {
        if let Some(reason) = &self.navigation_error {
            return Err(AcquireError::navigation(entry_url, reason.clone()));
        }

        let urls = self.urls.clone();
        let interval = self.interval;
        debug!(entry_url, requests = urls.len(), "Replaying scripted requests");

        let task = tokio::spawn(async move {
            for url in urls {
                if let Some(interval) = interval {
                    tokio::time::sleep(interval).await;
                }
                if sink.send(ObservedRequest::new(url)).is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(TaskCapture { task }))
    }
}

/// Capture backed by a single forwarding task.
///
/// Dropping the handle without stopping it still aborts the task, so the
/// sink closes when a run is abandoned mid-observation.
pub(crate) struct TaskCapture {
    pub(crate) task: JoinHandle<()>,
}

#[async_trait]
impl CaptureHandle for TaskCapture {
    async fn stop(mut self: Box<Self>) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for TaskCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(feature = "chromium")]
pub mod chromium;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_source_replays_in_order_then_closes() {
        let source = ScriptedRequestSource::new(["https://h/a.m3u8", "https://h/b.cmfa"]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = source.start("https://h/page", tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(ObservedRequest::new("https://h/a.m3u8")));
        assert_eq!(rx.recv().await, Some(ObservedRequest::new("https://h/b.cmfa")));
        assert_eq!(rx.recv().await, None);
        handle.stop().await;
    }

    #[tokio::test]
    async fn failing_source_reports_navigation_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = ScriptedRequestSource::failing("net::ERR_NAME_NOT_RESOLVED")
            .start("https://nowhere.invalid/", tx)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AcquireError::Navigation { .. }));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn dropped_handle_closes_the_sink() {
        let source = ScriptedRequestSource::new(["https://h/a.m3u8", "https://h/b.m3u8"])
            .with_interval(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = source.start("https://h/page", tx).await.unwrap();
        drop(handle);

        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("sink still open after the handle was dropped");
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn stop_closes_the_sink_before_pending_requests() {
        let source = ScriptedRequestSource::new(["https://h/a.m3u8"])
            .with_interval(Duration::from_secs(60));
        let (tx, mut rx) = mpsc::unbounded_channel();

        source.start("https://h/page", tx).await.unwrap().stop().await;

        assert_eq!(rx.recv().await, None);
    }
}
