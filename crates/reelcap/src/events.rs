use std::path::PathBuf;

use crate::classifier::RequestKind;

/// Lifecycle of a single acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AcquisitionState {
    Idle,
    Observing,
    Classified,
    Acquiring,
    Muxing,
    Done,
    Failed,
}

/// The orchestrator step an error escaped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AcquisitionStep {
    Observe,
    Classify,
    FetchVideo,
    FetchAudio,
    TranscodeAudio,
    Reconstruct,
    Repackage,
    Mux,
}

/// How the origin delivered the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryFormat {
    /// Single-file video plus a separate audio track.
    Direct,
    /// HLS-style manifest of `.ts` segments with muxed-in audio.
    Segmented,
}

#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    StateChanged {
        from: AcquisitionState,
        to: AcquisitionState,
    },
    RequestObserved {
        kind: RequestKind,
        url: String,
    },
    ManifestParsed {
        segments: usize,
    },
    SegmentFetched {
        index: usize,
        bytes: u64,
    },
    Completed {
        output: PathBuf,
        format: DeliveryFormat,
    },
}
