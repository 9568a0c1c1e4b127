//! Acquire a media asset that a web page only exposes through its network
//! requests, and rebuild a playable file from it.
//!
//! The page is observed through a [`RequestSource`]; observed URLs are
//! bucketed by the [`RequestClassifier`]; the [`Acquirer`] then either
//! downloads a direct video plus audio track and muxes them, or rebuilds a
//! segmented manifest and repackages it.

pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod manifest;
mod orchestrator;
pub mod proxy;
mod reconstruct;
mod scratch;
mod session;
pub mod transcode;

// Re-exports for easier access
pub use capture::{CaptureHandle, ObservedRequest, RequestSink, RequestSource, ScriptedRequestSource};
pub use classifier::{CandidatePools, RequestClassifier, RequestKind, Selection, VideoCandidate};
pub use config::{
    AcquireConfig, HttpConfig, ManifestConfig, ObservationConfig, StatusPolicy, TranscodeConfig,
};
pub use error::AcquireError;
pub use events::{AcquisitionEvent, AcquisitionState, AcquisitionStep, DeliveryFormat};
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use manifest::Manifest;
pub use orchestrator::{Acquirer, AcquisitionReport};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use reconstruct::{ManifestReconstructor, Reconstruction};
pub use scratch::ScratchSpace;
pub use session::AcquisitionSession;
pub use transcode::{FfmpegTranscoder, TranscodeOperation, Transcoder};

#[cfg(feature = "chromium")]
pub use capture::chromium::{ChromiumConfig, ChromiumRequestSource};
