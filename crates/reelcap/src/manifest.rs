// Segment manifest parsing: single-level playlists whose segment lines are
// resolved against a fixed-depth base path taken from the manifest URL.

use tracing::warn;

use crate::AcquireError;

/// Derive the base path prepended to every relative segment reference.
///
/// Keeps the first `depth` `/`-delimited components of `manifest_url` and
/// appends a trailing `/`. Fails without touching the network when the URL
/// has fewer than `depth` components.
///
/// ```
/// use reelcap_engine::manifest::segment_base_path;
///
/// let base = segment_base_path(
///     "https://v1.example.com/videos/iht/hls/ab/cd/ef/clip_720w.m3u8",
///     9,
/// )
/// .unwrap();
/// assert_eq!(base, "https://v1.example.com/videos/iht/hls/ab/cd/ef/");
/// ```
pub fn segment_base_path(manifest_url: &str, depth: usize) -> Result<String, AcquireError> {
    let parts: Vec<&str> = manifest_url.splitn(depth + 1, '/').collect();
    if depth == 0 || parts.len() < depth {
        return Err(AcquireError::MalformedManifestUrl {
            url: manifest_url.to_owned(),
            depth,
        });
    }

    Ok(format!("{}/", parts[..depth].join("/")))
}

/// Ordered segment references from one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    segments: Vec<String>,
}

impl Manifest {
    /// Parse a manifest body. Every line ending in `segment_suffix` is a
    /// segment reference; everything else is a directive and skipped.
    ///
    /// Nested variant lists are not followed. A master playlist usually
    /// carries no segment lines and so parses to an empty manifest.
    pub fn parse(url: &str, body: &[u8], segment_suffix: &str) -> Result<Self, AcquireError> {
        if m3u8_rs::is_master_playlist(body) {
            warn!(url, "Manifest looks like a variant list, nested playlists are not followed");
        }

        let text = String::from_utf8_lossy(body);
        let segments = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| line.ends_with(segment_suffix))
            .map(str::to_owned)
            .collect();

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Absolute segment URLs in playback order.
    pub fn segment_urls(&self, base_path: &str) -> Vec<String> {
        self.segments
            .iter()
            .map(|segment| format!("{base_path}{segment}"))
            .collect()
    }
}
