//! Terminal progress bars for pipeline events.

use std::io::IsTerminal;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use smbsync_transfer::{Phase, ProgressEvent, ProgressSink, SpeedCalculator};

const TEMPLATE: &str =
    "{prefix:.cyan.bold} {msg:>32} [{bar:30.cyan/blue}] {bytes}/{total_bytes}";
const MIB: f64 = 1024.0 * 1024.0;

/// One bar per phase of the running job. Draws nothing when stderr is
/// not a terminal.
pub struct TerminalProgress {
    visible: bool,
    style: ProgressStyle,
    speed: SpeedCalculator,
    state: Mutex<BarState>,
}

#[derive(Default)]
struct BarState {
    bar: Option<ProgressBar>,
    prefix: String,
    phase: Option<Phase>,
    last: u64,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_visibility(std::io::stderr().is_terminal())
    }

    fn with_visibility(visible: bool) -> Self {
        let style = match ProgressStyle::with_template(TEMPLATE) {
            Ok(style) => style.progress_chars("=> "),
            Err(_) => ProgressStyle::default_bar(),
        };
        Self {
            visible,
            style,
            speed: SpeedCalculator::default(),
            state: Mutex::new(BarState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressSink for TerminalProgress {
    fn emit(&self, event: ProgressEvent) {
        let mut s = self.lock();
        match event {
            ProgressEvent::JobStarted { index, total, file } => {
                s.prefix = format!("[{index}/{total}] {file}");
            }
            ProgressEvent::PhaseStarted { phase, total, .. } => {
                if let Some(bar) = s.bar.take() {
                    bar.finish_and_clear();
                }
                self.speed.reset();
                let bar = if self.visible {
                    ProgressBar::new(total)
                } else {
                    ProgressBar::hidden()
                };
                bar.set_style(self.style.clone());
                bar.set_prefix(s.prefix.clone());
                bar.set_message(phase.as_str());
                s.bar = Some(bar);
                s.phase = Some(phase);
                s.last = 0;
            }
            ProgressEvent::Bytes {
                phase, done, total, ..
            } => {
                self.speed.add_sample(done.saturating_sub(s.last));
                s.last = done;
                if let Some(bar) = &s.bar {
                    bar.set_position(done);
                    bar.set_message(rate_message(
                        phase,
                        self.speed.bytes_per_second(),
                        self.speed.eta(total.saturating_sub(done)),
                    ));
                }
            }
            ProgressEvent::Cleanup { .. } => {}
            ProgressEvent::JobFinished { .. } => {
                if let Some(bar) = s.bar.take() {
                    bar.finish_and_clear();
                }
                s.phase = None;
            }
        }
    }
}

fn rate_message(phase: Phase, bytes_per_second: f64, eta: Option<Duration>) -> String {
    let rate = format!("{} {:.1} MiB/s", phase.as_str(), bytes_per_second / MIB);
    match eta {
        Some(eta) => format!("{rate} eta {}s", eta.as_secs()),
        None => rate,
    }
}
