//! Per-run staging files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Unique intermediate paths for one run, removed again when the run ends.
///
/// Nothing is created up front; paths are handed out and whatever exists at
/// cleanup time is deleted. Cleanup also runs on drop, so failure and
/// cancellation paths do not leak files.
#[derive(Debug)]
pub struct ScratchSpace {
    raw_video: PathBuf,
    raw_audio: PathBuf,
    audio: PathBuf,
    concat: PathBuf,
    cleaned: bool,
}

impl ScratchSpace {
    pub fn new(work_dir: &Path, run_id: Uuid, audio_extension: &str) -> Self {
        let stem = format!("reelcap-{}", run_id.simple());
        Self {
            raw_video: work_dir.join(format!("{stem}-video.cmfv")),
            raw_audio: work_dir.join(format!("{stem}-audio.cmfa")),
            audio: work_dir.join(format!("{stem}-audio.{audio_extension}")),
            concat: work_dir.join(format!("{stem}-concat.ts")),
            cleaned: false,
        }
    }

    pub fn raw_video(&self) -> &Path {
        &self.raw_video
    }

    pub fn raw_audio(&self) -> &Path {
        &self.raw_audio
    }

    /// Transcoded audio, ready for muxing.
    pub fn audio(&self) -> &Path {
        &self.audio
    }

    /// Concatenated segment stream.
    pub fn concat(&self) -> &Path {
        &self.concat
    }

    fn paths(&self) -> [&Path; 4] {
        [&self.raw_video, &self.raw_audio, &self.audio, &self.concat]
    }

    /// Remove every staging file. Missing files are not an error, and other
    /// failures are only logged.
    pub async fn cleanup(mut self) {
        for path in self.paths() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
        self.cleaned = true;
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        for path in self.paths() {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_per_run() {
        let dir = Path::new("/work");
        let a = ScratchSpace::new(dir, Uuid::new_v4(), "mp3");
        let b = ScratchSpace::new(dir, Uuid::new_v4(), "mp3");

        assert_ne!(a.raw_video(), b.raw_video());
        assert!(a.concat().starts_with(dir));
        assert_eq!(a.audio().extension().unwrap(), "mp3");
    }

    #[tokio::test]
    async fn cleanup_removes_existing_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path(), Uuid::new_v4(), "mp3");
        std::fs::write(scratch.raw_video(), b"v").unwrap();
        std::fs::write(scratch.audio(), b"a").unwrap();
        let raw_video = scratch.raw_video().to_path_buf();

        scratch.cleanup().await;

        assert!(!raw_video.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn drop_removes_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path(), Uuid::new_v4(), "mp3");
        std::fs::write(scratch.concat(), b"ts").unwrap();

        drop(scratch);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
