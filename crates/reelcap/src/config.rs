use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Segment references are manifest lines ending with this suffix.
pub const DEFAULT_SEGMENT_SUFFIX: &str = ".ts";

/// Number of leading `/`-delimited URL components that make up the segment base path.
pub const DEFAULT_SEGMENT_BASE_DEPTH: usize = 9;

pub const DEFAULT_AUDIO_CODEC: &str = "libmp3lame";
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

/// What to do with a response whose status is not 2xx.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum StatusPolicy {
    /// Fail the fetch with `HttpStatus`.
    #[default]
    Strict,
    /// Treat any response as success and keep its body.
    Lenient,
}

/// HTTP client options shared by every fetch.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for a single request, body included. Zero disables it.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    pub follow_redirects: bool,

    pub user_agent: String,

    /// Custom HTTP headers, merged over the defaults
    pub headers: HeaderMap,

    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    pub status_policy: StatusPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::default_headers(),
            proxy: None,
            use_system_proxy: true,
            status_policy: StatusPolicy::Strict,
        }
    }
}

impl HttpConfig {
    pub fn default_headers() -> HeaderMap {
        // Accept-Encoding is left to reqwest so compressed bodies are decoded.
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }

    /// Custom headers take precedence over defaults for the same fields.
    pub fn with_headers(mut self, custom: HeaderMap) -> Self {
        for (name, value) in custom.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }
}

/// How long to listen to the page before classification is considered settled.
#[derive(Debug, Clone)]
pub struct ObservationConfig {
    /// Upper bound on the wait for the settle condition.
    pub timeout: Duration,
    /// Extra listening time once the settle condition holds, so later
    /// candidates (last-wins) still land in the pools.
    pub settle_grace: Duration,
    /// When set, ignore the settle condition and sleep this long after
    /// navigation instead.
    pub fixed_window: Option<Duration>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            settle_grace: Duration::from_millis(1500),
            fixed_window: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    pub segment_suffix: String,
    pub base_path_depth: usize,
    /// Segments in flight at once; output order is always manifest order.
    pub concurrency: usize,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            segment_suffix: DEFAULT_SEGMENT_SUFFIX.to_owned(),
            base_path_depth: DEFAULT_SEGMENT_BASE_DEPTH,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Extension of the transcoded audio scratch file; selects the container.
    pub audio_extension: String,
    /// Per-invocation limit; `None` waits for the tool indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            audio_codec: DEFAULT_AUDIO_CODEC.to_owned(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_owned(),
            audio_extension: "mp3".to_owned(),
            timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Everything one acquisition run needs.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub http: HttpConfig,
    pub observation: ObservationConfig,
    pub manifest: ManifestConfig,
    pub transcode: TranscodeConfig,
    /// Directory for per-run scratch files. Must already exist.
    pub work_dir: PathBuf,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            observation: ObservationConfig::default(),
            manifest: ManifestConfig::default(),
            transcode: TranscodeConfig::default(),
            work_dir: std::env::temp_dir(),
        }
    }
}
