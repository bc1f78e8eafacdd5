//! Step animation driver.
//!
//! The driver is a plain reducer: it owns [`AnimationState`], consumes
//! [`Event`]s and answers with timer [`Command`]s for whoever owns the clock.
//! It never sleeps or spawns anything itself, which keeps every transition
//! testable without a runtime.
//!
//! Lifecycle:
//!
//! ```text
//! Idle ─prepare→ Tokenizing → Encoding ─submit→ Requesting ─loaded(n≥2)→ Animating ─last tick→ Complete
//!                                                   │  └─loaded(n≤1)──────────────────────────→ Complete
//!                                                   └─failed→ Failed
//! ```
//!
//! Manual scrubbing while animating pauses playback; [`Event::Resume`]
//! restarts the timer from the scrubbed step.

use std::time::Duration;

use crate::generation::RequestId;

/// Default interval between two automatic steps.
pub const DEFAULT_TICK: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Tokenizing,
    Encoding,
    Requesting,
    Animating,
    Complete,
    Failed,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Tokenizing => "tokenizing",
            Status::Encoding => "encoding",
            Status::Requesting => "requesting",
            Status::Animating => "animating",
            Status::Complete => "complete",
            Status::Failed => "failed",
        }
    }

    /// A request is being prepared or is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Status::Tokenizing | Status::Encoding | Status::Requesting
        )
    }

    /// Display-terminal states: nothing advances on its own from here.
    pub fn is_settled(self) -> bool {
        matches!(self, Status::Idle | Status::Complete | Status::Failed)
    }
}

/// Preparation phases shown before the request leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tokenizing,
    Encoding,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationState {
    current_step: usize,
    total_steps: usize,
    is_playing: bool,
    status: Status,
    failure: Option<String>,
}

impl AnimationState {
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Human-readable reason of the last failure, while in [`Status::Failed`].
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn last_step(&self) -> Option<usize> {
        self.total_steps.checked_sub(1)
    }

    fn clear_frames(&mut self) {
        self.current_step = 0;
        self.total_steps = 0;
        self.is_playing = false;
        self.failure = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartTimer { timer: TimerId, interval: Duration },
    CancelTimer { timer: TimerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scrub {
    To(usize),
    Prev,
    Next,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Tokenizing/encoding the prompt locally. Clears the previous frames.
    Prepare(Stage),
    /// The request left; only a response tagged with this id will be accepted.
    Submit { request: RequestId },
    /// The backend answered with `total` steps.
    Loaded { request: RequestId, total: usize },
    Failed { request: RequestId, message: String },
    Tick { timer: TimerId },
    Scrub(Scrub),
    Resume,
}

#[derive(Debug, Clone)]
pub struct AnimationDriver {
    state: AnimationState,
    interval: Duration,
    active_timer: Option<TimerId>,
    next_timer: u64,
    pending: Option<RequestId>,
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl AnimationDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: AnimationState::default(),
            interval: interval.max(Duration::from_millis(1)),
            active_timer: None,
            next_timer: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn active_timer(&self) -> Option<TimerId> {
        self.active_timer
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending
    }

    pub fn apply(&mut self, event: Event) -> Vec<Command> {
        let mut out = Vec::new();
        match event {
            Event::Prepare(stage) => {
                self.cancel_timer(&mut out);
                self.pending = None;
                self.state.clear_frames();
                self.state.status = match stage {
                    Stage::Tokenizing => Status::Tokenizing,
                    Stage::Encoding => Status::Encoding,
                };
            }
            Event::Submit { request } => {
                self.cancel_timer(&mut out);
                self.pending = Some(request);
                self.state.clear_frames();
                self.state.status = Status::Requesting;
            }
            Event::Loaded { request, total } => {
                if self.pending != Some(request) {
                    return out;
                }
                self.pending = None;
                self.state.current_step = 0;
                self.state.total_steps = total;
                if total <= 1 {
                    // Nothing to step through: the single frame (or none) is final.
                    self.state.status = Status::Complete;
                } else {
                    self.state.status = Status::Animating;
                    self.start_timer(&mut out);
                }
            }
            Event::Failed { request, message } => {
                if self.pending != Some(request) {
                    return out;
                }
                self.pending = None;
                self.cancel_timer(&mut out);
                self.state.clear_frames();
                self.state.status = Status::Failed;
                self.state.failure = Some(message);
            }
            Event::Tick { timer } => {
                if self.active_timer != Some(timer) || self.state.status != Status::Animating {
                    return out;
                }
                let last = self.state.last_step().unwrap_or(0);
                if self.state.current_step < last {
                    self.state.current_step += 1;
                }
                if self.state.current_step >= last {
                    self.finish(&mut out);
                }
            }
            Event::Scrub(scrub) => {
                let Some(last) = self.state.last_step() else {
                    return out;
                };
                let cur = self.state.current_step;
                let target = match scrub {
                    Scrub::To(i) => i.min(last),
                    Scrub::Prev => cur.saturating_sub(1),
                    Scrub::Next => (cur + 1).min(last),
                };
                if self.state.is_playing {
                    self.cancel_timer(&mut out);
                    self.state.is_playing = false;
                }
                self.state.current_step = target;
            }
            Event::Resume => {
                if self.state.status != Status::Animating || self.state.is_playing {
                    return out;
                }
                let last = self.state.last_step().unwrap_or(0);
                if self.state.current_step >= last {
                    self.finish(&mut out);
                } else {
                    self.start_timer(&mut out);
                }
            }
        }
        out
    }

    fn start_timer(&mut self, out: &mut Vec<Command>) {
        self.cancel_timer(out);
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        self.active_timer = Some(timer);
        self.state.is_playing = true;
        out.push(Command::StartTimer {
            timer,
            interval: self.interval,
        });
    }

    fn cancel_timer(&mut self, out: &mut Vec<Command>) {
        if let Some(timer) = self.active_timer.take() {
            out.push(Command::CancelTimer { timer });
        }
        self.state.is_playing = false;
    }

    fn finish(&mut self, out: &mut Vec<Command>) {
        self.cancel_timer(out);
        self.state.status = Status::Complete;
    }
}
