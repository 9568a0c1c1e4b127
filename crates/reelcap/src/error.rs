use std::time::Duration;

use reqwest::StatusCode;

use crate::events::AcquisitionStep;
use crate::transcode::TranscodeOperation;

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("acquisition cancelled")]
    Cancelled,

    #[error("navigation to `{url}` failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("malformed manifest URL `{url}`: need at least {depth} `/`-delimited components")]
    MalformedManifestUrl { url: String, depth: usize },

    #[error("no video candidate was observed")]
    NoVideoCandidateFound,

    #[error("no audio candidate was observed for direct video {video_url}")]
    NoAudioCandidateFound { video_url: String },

    #[error("failed to fetch manifest {url}: {source}")]
    ManifestFetch {
        url: String,
        #[source]
        source: Box<AcquireError>,
    },

    #[error("failed to fetch segment #{index} ({url}): {source}")]
    SegmentFetch {
        index: usize,
        url: String,
        #[source]
        source: Box<AcquireError>,
    },

    #[error("{operation} failed (exit status {}): {stderr}", display_status(.status))]
    Transcode {
        operation: TranscodeOperation,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Caller-supplied entry URL or paths rejected before any work starts.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{step} step failed: {source}")]
    Step {
        step: AcquisitionStep,
        #[source]
        source: Box<AcquireError>,
    },
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_owned(), |code| code.to_string())
}

impl AcquireError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Wraps `self` with the orchestrator step it escaped from.
    pub fn at_step(self, step: AcquisitionStep) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The step that failed, if this error went through the orchestrator.
    pub fn step(&self) -> Option<AcquisitionStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Looks through step and fetch wrappers to the originating failure.
    pub fn root_cause(&self) -> &AcquireError {
        match self {
            Self::Step { source, .. }
            | Self::ManifestFetch { source, .. }
            | Self::SegmentFetch { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for transport-level failures (navigation, connection, HTTP status).
    pub fn is_network(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Navigation { .. } | Self::Network { .. } | Self::HttpStatus { .. }
        )
    }

    /// Whether a caller could reasonably try the whole run again.
    ///
    /// The engine itself never retries; this only classifies.
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Self::Cancelled
            | Self::MalformedManifestUrl { .. }
            | Self::Configuration { .. }
            | Self::InvalidInput { .. }
            | Self::Spawn { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Navigation { .. }
            | Self::Network { .. }
            | Self::NoVideoCandidateFound
            | Self::NoAudioCandidateFound { .. }
            | Self::Transcode { .. }
            | Self::Io { .. }
            | Self::Timeout { .. } => true,
            // unreachable after root_cause, kept for exhaustiveness
            Self::ManifestFetch { .. } | Self::SegmentFetch { .. } | Self::Step { .. } => false,
        }
    }
}
