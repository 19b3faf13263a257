use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use nstar::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct BarState {
    bar: ProgressBar,
    phase: String,
    failed: usize,
}

impl BarState {
    fn refresh_message(&self) {
        if self.failed == 0 {
            self.bar.set_message(self.phase.clone());
        } else {
            self.bar
                .set_message(format!("{} ({} failed)", self.phase, self.failed));
        }
    }
}

/// Renders library progress events as a single indicatif bar on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new(0).with_style(Self::spinner_style());
        bar.set_draw_target(target);
        bar.finish_and_clear();
        Self {
            state: Arc::new(Mutex::new(BarState {
                bar,
                phase: String::new(),
                failed: 0,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    state.bar.reset();
                    state.bar.set_length(0);
                    state.bar.set_style(Self::spinner_style());
                    state
                        .bar
                        .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    state.phase = name.to_string();
                    state.failed = 0;
                    state.refresh_message();
                }
                Progress::PhaseFinish => {
                    state.bar.disable_steady_tick();
                    let summary = match state.failed {
                        0 => format!("✓ {}", state.phase),
                        n => format!("✓ {} ({} skipped)", state.phase, n),
                    };
                    state.bar.finish_with_message(summary);
                }
                Progress::TaskStart { total_steps } => {
                    state.bar.disable_steady_tick();
                    state.bar.set_length(total_steps);
                    state.bar.set_position(0);
                    state.bar.set_style(Self::bar_style());
                }
                Progress::TaskIncrement => state.bar.inc(1),
                Progress::TaskFinish => {
                    let length = state.bar.length().unwrap_or(0);
                    state.bar.set_position(length);
                }
                Progress::StarFinished { failed, .. } => {
                    if failed {
                        state.failed += 1;
                        state.refresh_message();
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} stars ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden_handler() -> CliProgressHandler {
        CliProgressHandler::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn handler_starts_finished_and_empty() {
        let handler = hidden_handler();
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.length(), Some(0));
        assert!(state.bar.is_finished());
        assert_eq!(state.failed, 0);
    }

    #[test]
    fn family_events_drive_the_bar() {
        let handler = hidden_handler();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Stellar family",
        });
        callback(Progress::TaskStart { total_steps: 3 });
        callback(Progress::StarFinished {
            central_pressure: 1.0,
            failed: false,
        });
        callback(Progress::TaskIncrement);
        callback(Progress::StarFinished {
            central_pressure: 2.0,
            failed: true,
        });
        callback(Progress::TaskIncrement);
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.length(), Some(3));
            assert_eq!(state.bar.position(), 2);
            assert_eq!(state.bar.message(), "Stellar family (1 failed)");
        }

        callback(Progress::TaskFinish);
        callback(Progress::PhaseFinish);
        let state = handler.state.lock().unwrap();
        assert_eq!(state.bar.position(), 3);
        assert!(state.bar.is_finished());
        assert_eq!(state.bar.message(), "✓ Stellar family (1 skipped)");
    }

    #[test]
    fn callback_can_be_driven_from_worker_threads() {
        let handler = hidden_handler();
        let callback = Arc::new(handler.get_callback());
        callback(Progress::PhaseStart { name: "Parallel" });
        callback(Progress::TaskStart { total_steps: 4 });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let callback = callback.clone();
                thread::spawn(move || callback(Progress::TaskIncrement))
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(handler.state.lock().unwrap().bar.position(), 4);
    }
}
