use uuid::Uuid;

use crate::AcquireError;
use crate::classifier::{CandidatePools, RequestClassifier, Selection, VideoCandidate};

/// State of one acquisition run. Created per run and dropped with it.
///
/// The pools are written only through [`classifier`](Self::classifier) while
/// the page is observed; the chosen fields are set once by
/// [`resolve`](Self::resolve) afterwards.
#[derive(Debug, Clone)]
pub struct AcquisitionSession {
    id: Uuid,
    entry_url: String,
    pools: CandidatePools,
    chosen_video: Option<VideoCandidate>,
    chosen_audio: Option<String>,
}

impl AcquisitionSession {
    pub fn new(entry_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_url: entry_url.into(),
            pools: CandidatePools::default(),
            chosen_video: None,
            chosen_audio: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entry_url(&self) -> &str {
        &self.entry_url
    }

    pub fn pools(&self) -> &CandidatePools {
        &self.pools
    }

    /// Borrow the pools exclusively for the observation window.
    pub fn classifier(&mut self) -> RequestClassifier<'_> {
        RequestClassifier::new(&mut self.pools)
    }

    /// Run candidate selection and record the result.
    pub fn resolve(&mut self) -> Result<Selection, AcquireError> {
        let selection = self.pools.select()?;
        self.chosen_video = Some(selection.video.clone());
        self.chosen_audio = selection.audio.clone();
        Ok(selection)
    }

    pub fn chosen_video(&self) -> Option<&VideoCandidate> {
        self.chosen_video.as_ref()
    }

    pub fn chosen_audio(&self) -> Option<&str> {
        self.chosen_audio.as_deref()
    }
}
