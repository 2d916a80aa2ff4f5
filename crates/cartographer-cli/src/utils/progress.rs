use crate::install::DownloadProgress;
use cartographer::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders prediction progress on stderr: a spinner per phase and a bar while tiles are predicted.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0)
            .with_style(spinner_style())
            .with_message("Starting...");
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut pb) = pb.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    *pb = ProgressBar::new(0).with_style(spinner_style()).with_message(name);
                    pb.set_draw_target(ProgressDrawTarget::stderr());
                    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::PhaseFinish => {
                    pb.disable_steady_tick();
                    let message = format!("✓ {}", pb.message());
                    pb.finish_with_message(message);
                }
                Progress::TaskStart { total_steps } => {
                    pb.disable_steady_tick();
                    pb.set_length(total_steps);
                    pb.set_position(0);
                    pb.set_style(tile_style());
                }
                Progress::TaskIncrement => pb.inc(1),
                Progress::TaskFinish => {
                    if let Some(length) = pb.length() {
                        pb.set_position(length);
                    }
                }
                Progress::Message(msg) => pb.println(format!("  {}", msg)),
            }
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A byte-counting bar for one model download, driven by [`DownloadProgress`] events.
pub struct DownloadBar {
    pb: ProgressBar,
}

impl DownloadBar {
    pub fn new(label: &str) -> Self {
        let pb = ProgressBar::new(0).with_message(label.to_string());
        pb.set_draw_target(ProgressDrawTarget::stderr());
        Self { pb }
    }

    pub fn update(&self, progress: DownloadProgress) {
        match progress {
            DownloadProgress::Started {
                total_size: Some(total),
            } => {
                self.pb.set_length(total);
                self.pb.set_style(download_style());
            }
            DownloadProgress::Started { total_size: None } => {
                self.pb.set_style(spinner_style());
                self.pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            DownloadProgress::Downloading { downloaded } => self.pb.set_position(downloaded),
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.pb.disable_steady_tick();
        self.pb.finish_with_message(message.into());
    }

    pub fn abandon(&self) {
        self.pb.abandon();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn tile_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<16} [{bar:40.cyan/blue}] {pos}/{len} tiles ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<8} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
