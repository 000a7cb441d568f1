use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use memprep::engine::progress::{Progress, ProgressCallback};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    batch_bar: Option<ProgressBar>,
    succeeded: u64,
    failed: u64,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::BatchStart { total_cases } => {
                if let Some(bar) = self.state.batch_bar.take() {
                    bar.finish_and_clear();
                }
                let pb = self.mp.add(ProgressBar::new(total_cases));
                pb.set_style(Self::bar_style());
                pb.set_message("Starting batch");
                self.state = BarState {
                    batch_bar: Some(pb),
                    ..Default::default()
                };
            }
            Progress::CaseStart { case_id, .. } => {
                if let Some(bar) = self.state.batch_bar.as_ref() {
                    bar.set_message(case_id);
                }
            }
            Progress::StageStart { case_id, stage } => {
                if let Some(bar) = self.state.batch_bar.as_ref() {
                    bar.set_message(format!("{} ({})", case_id, stage));
                }
            }
            Progress::CaseFinish { case_id, succeeded } => {
                if succeeded {
                    self.state.succeeded += 1;
                    self.mp.println(format!("✓ {}", case_id)).ok();
                } else {
                    self.state.failed += 1;
                    self.mp.println(format!("✗ {}", case_id)).ok();
                }
                if let Some(bar) = self.state.batch_bar.as_ref() {
                    bar.inc(1);
                }
            }
            Progress::BatchFinish => {
                if let Some(bar) = self.state.batch_bar.take() {
                    bar.finish_and_clear();
                }
                self.mp
                    .println(format!(
                        "Batch finished: {} succeeded, {} failed",
                        self.state.succeeded, self.state.failed
                    ))
                    .ok();
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<30} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}
