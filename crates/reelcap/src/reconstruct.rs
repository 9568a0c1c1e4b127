// Manifest reconstruction: fetch a segment manifest, then fetch every segment
// and concatenate them in manifest order into a single stream.

use std::path::Path;
use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::AcquireError;
use crate::config::ManifestConfig;
use crate::events::AcquisitionEvent;
use crate::fetcher::ResourceFetcher;
use crate::manifest::{Manifest, segment_base_path};

/// Summary of a finished reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconstruction {
    pub segments: usize,
    pub bytes: u64,
}

pub struct ManifestReconstructor {
    fetcher: Arc<dyn ResourceFetcher>,
    config: ManifestConfig,
    events: Option<mpsc::UnboundedSender<AcquisitionEvent>>,
}

impl ManifestReconstructor {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, config: ManifestConfig) -> Self {
        Self {
            fetcher,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<AcquisitionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: AcquisitionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Rebuild the stream behind `manifest_url` into `sink`.
    ///
    /// Up to `concurrency` segments are fetched at once, but bytes reach the
    /// sink strictly in manifest order. The first failed segment aborts the
    /// run; whatever was already written to `sink` is not valid output.
    #[instrument(skip(self, sink), fields(concurrency = self.config.concurrency))]
    pub async fn reconstruct<W>(
        &self,
        manifest_url: &str,
        sink: &mut W,
    ) -> Result<Reconstruction, AcquireError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let base_path = segment_base_path(manifest_url, self.config.base_path_depth)?;

        let body =
            self.fetcher
                .fetch(manifest_url)
                .await
                .map_err(|e| AcquireError::ManifestFetch {
                    url: manifest_url.to_owned(),
                    source: Box::new(e),
                })?;

        let manifest = Manifest::parse(manifest_url, &body, &self.config.segment_suffix)?;
        info!(
            segments = manifest.len(),
            base_path = %base_path,
            "Parsed manifest"
        );
        self.emit(AcquisitionEvent::ManifestParsed {
            segments: manifest.len(),
        });

        if manifest.is_empty() {
            warn!("Manifest lists no segments; output will be empty");
        }

        let fetcher = self.fetcher.as_ref();
        let mut segments = stream::iter(manifest.segment_urls(&base_path).into_iter().enumerate())
            .map(|(index, url)| async move {
                let result = fetcher.fetch(&url).await;
                (index, url, result)
            })
            .buffered(self.config.concurrency.max(1));

        let mut total: u64 = 0;
        while let Some((index, url, result)) = segments.next().await {
            let bytes = result.map_err(|e| AcquireError::SegmentFetch {
                index,
                url: url.clone(),
                source: Box::new(e),
            })?;

            sink.write_all(&bytes).await?;
            total += bytes.len() as u64;
            debug!(index, url = %url, size = bytes.len(), "Appended segment");
            self.emit(AcquisitionEvent::SegmentFetched {
                index,
                bytes: bytes.len() as u64,
            });
        }
        sink.flush().await?;

        Ok(Reconstruction {
            segments: manifest.len(),
            bytes: total,
        })
    }

    /// Same as [`reconstruct`](Self::reconstruct), writing to a file at `dest`.
    /// The file is removed again if reconstruction fails.
    pub async fn reconstruct_to_file(
        &self,
        manifest_url: &str,
        dest: &Path,
    ) -> Result<Reconstruction, AcquireError> {
        let mut file = tokio::fs::File::create(dest).await?;
        let result = self.reconstruct(manifest_url, &mut file).await;
        drop(file);

        if result.is_err()
            && let Err(e) = tokio::fs::remove_file(dest).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %dest.display(), error = %e, "Failed to remove partial reconstruction");
        }

        result
    }
}
