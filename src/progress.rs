//! Progress reporting for the network phases.
//!
//! Each [`Phase`] gets a bar on the terminal. In log-only mode (`--log-only`,
//! and always in `simulate`) bars stay hidden and every phase emits periodic
//! `info` lines instead, so the output can be tailed.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set from `--log-only`.
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// e.g. "4.2s", "1.5m"
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

// ============================================================================
// Phases
// ============================================================================

/// The steps of a run that talk to the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// One artist search per lineup entry.
    Popularity,
    /// One top-tracks request per matched artist.
    Tracks,
    /// One request per chunk of track ids.
    Upload,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Popularity => "popularity",
            Phase::Tracks => "tracks",
            Phase::Upload => "upload",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Phase::Popularity => "Getting popularity",
            Phase::Tracks => "Fetching tracks",
            Phase::Upload => "Uploading",
        }
    }

    /// Steps between log lines. Uploads have few, slow steps.
    fn log_every(self) -> u64 {
        match self {
            Phase::Popularity | Phase::Tracks => 25,
            Phase::Upload => 5,
        }
    }
}

/// Whether step `current` of `total` gets a log line.
fn should_log(current: u64, total: u64, every: u64) -> bool {
    total > 0 && (current % every.max(1) == 0 || current == total)
}

/// Progress of one phase. Safe to advance from several worker threads.
pub struct PhaseProgress {
    phase: Phase,
    total: u64,
    bar: ProgressBar,
}

impl PhaseProgress {
    pub fn start(phase: Phase, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(phase.message());
        Self { phase, total, bar }
    }

    /// Count one finished step.
    pub fn advance(&self) {
        self.bar.inc(1);
        let current = self.bar.position();
        if is_log_only() && should_log(current, self.total, self.phase.log_every()) {
            let pct = 100.0 * current as f64 / self.total as f64;
            tracing::info!(phase = self.phase.label(), current, total = self.total, "{:.1}%", pct);
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Spinner for the offline allocation step.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed_precise}]") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(4_200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_should_log_on_interval_and_last_step() {
        assert!(should_log(25, 60, 25));
        assert!(!should_log(26, 60, 25));
        assert!(should_log(60, 60, 25));
        assert!(!should_log(0, 0, 25));
        assert!(should_log(3, 7, 0));
    }

    #[test]
    fn test_phase_progress_counts_from_threads() {
        let progress = PhaseProgress::start(Phase::Tracks, 8);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    progress.advance();
                    progress.advance();
                });
            }
        });
        assert_eq!(progress.position(), 8);
        progress.finish("done".to_string());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Popularity.label(), "popularity");
        assert_eq!(Phase::Tracks.label(), "tracks");
        assert_eq!(Phase::Upload.label(), "upload");
    }
}
