use std::path::PathBuf;

use clap::Parser;
use reelcap_engine::ProxyType;

#[derive(Parser, Debug)]
#[command(
    name = "reelcap",
    author,
    version,
    about = "Capture the media requests a page makes and save the video they describe",
    long_about = None,
)]
pub struct Args {
    /// Page that plays the video
    #[arg(env = "REELCAP_URL")]
    pub url: String,

    /// Final media file (parent directory must exist)
    #[arg(short, long, env = "REELCAP_OUTPUT")]
    pub output: PathBuf,

    /// Directory for intermediate files [default: system temp dir]
    #[arg(long, env = "REELCAP_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Upper bound, in seconds, on waiting for media requests after the page loads
    #[arg(long, default_value_t = 10, env = "REELCAP_OBSERVE_TIMEOUT")]
    pub observe_timeout: u64,

    /// Extra listening time, in milliseconds, once a usable candidate was seen
    #[arg(long, default_value_t = 1500, env = "REELCAP_SETTLE_GRACE")]
    pub settle_grace: u64,

    /// Listen for exactly this many seconds instead of waiting for candidates
    #[arg(long, env = "REELCAP_FIXED_WINDOW")]
    pub fixed_window: Option<u64>,

    /// Segments fetched in parallel (output order is unaffected)
    #[arg(long, default_value_t = 4, env = "REELCAP_CONCURRENCY")]
    pub concurrency: usize,

    /// Request timeout in seconds (0 = none)
    #[arg(long, default_value_t = 0, env = "REELCAP_TIMEOUT")]
    pub timeout: u64,

    /// Path to the ffmpeg executable
    #[arg(long, env = "REELCAP_FFMPEG")]
    pub ffmpeg: Option<String>,

    /// Bitrate for the re-encoded audio track
    #[arg(long, default_value = "192k", env = "REELCAP_AUDIO_BITRATE")]
    pub audio_bitrate: String,

    /// Extra request header as `key=value`; repeatable
    #[arg(short = 'H', long = "header", env = "REELCAP_HEADER")]
    pub headers: Vec<String>,

    /// Proxy server URL for media fetches
    #[arg(long, env = "REELCAP_PROXY")]
    pub proxy: Option<String>,

    #[arg(long, value_enum, default_value_t = ProxyType::Http, env = "REELCAP_PROXY_TYPE")]
    pub proxy_type: ProxyType,

    #[arg(long, requires = "proxy", env = "REELCAP_PROXY_USERNAME")]
    pub proxy_username: Option<String>,

    #[arg(long, requires = "proxy", env = "REELCAP_PROXY_PASSWORD")]
    pub proxy_password: Option<String>,

    /// Ignore system proxy settings
    #[arg(long, env = "REELCAP_NO_SYSTEM_PROXY")]
    pub no_system_proxy: bool,

    /// Keep the body of non-2xx responses instead of failing
    #[arg(long, env = "REELCAP_LENIENT_STATUS")]
    pub lenient_status: bool,

    /// Chromium/Chrome executable used to load the page
    #[arg(long, env = "REELCAP_CHROMIUM")]
    pub chromium: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, env = "REELCAP_HEADFUL")]
    pub headful: bool,

    /// Replay these request URLs instead of loading the page in a browser; repeatable
    #[arg(long = "request-url", value_name = "URL", env = "REELCAP_REQUEST_URLS", value_delimiter = ' ')]
    pub request_urls: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet", env = "REELCAP_VERBOSE")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, env = "REELCAP_QUIET")]
    pub quiet: bool,
}
