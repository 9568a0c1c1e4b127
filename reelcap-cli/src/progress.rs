use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reelcap_engine::{AcquisitionEvent, AcquisitionState};
use tokio::sync::mpsc;

/// Render acquisition events until the sender side is dropped.
pub async fn render(mut events: mpsc::UnboundedReceiver<AcquisitionEvent>, hidden: bool) {
    let pb = ProgressBar::new_spinner();
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Loading page...");

    while let Some(event) = events.recv().await {
        match event {
            AcquisitionEvent::StateChanged { to, .. } => match to {
                AcquisitionState::Observing => pb.set_message("Watching page requests..."),
                AcquisitionState::Acquiring => pb.set_message("Downloading..."),
                AcquisitionState::Muxing => pb.set_message("Muxing video and audio..."),
                AcquisitionState::Failed => pb.abandon_with_message("Failed"),
                _ => {}
            },
            AcquisitionEvent::RequestObserved { kind, .. } => {
                pb.set_message(format!("Observed {kind} request"));
            }
            AcquisitionEvent::ManifestParsed { segments } => {
                if let Ok(style) = ProgressStyle::with_template(
                    "{spinner:.yellow} [{bar:30.yellow/white}] {pos}/{len} segments {msg}",
                ) {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb.set_length(segments as u64);
                pb.set_position(0);
                pb.set_message("");
            }
            AcquisitionEvent::SegmentFetched { .. } => pb.inc(1),
            AcquisitionEvent::Completed { output, format } => {
                pb.finish_with_message(format!("Saved {} ({format})", output.display()));
            }
        }
    }

    if !pb.is_finished() {
        pb.finish_and_clear();
    }
}
