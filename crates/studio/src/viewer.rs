//! PixelPainter viewer actor.
//!
//! One task owns the [`PainterStore`] and is the only place it is mutated.
//! Everything else talks to it by message: the [`ViewerHandle`] sends user
//! input, the request task reports the backend answer, and the timer task
//! sends ticks. After every message the actor publishes a [`ViewerSnapshot`]
//! on a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use atelier::animation::{AnimationDriver, Command, Scrub, Status, TimerId};
use atelier::generation::{CacheBust, FrameRef, GenerationRequest, GenerationResult, RequestId, SamplingParams};
use atelier::painter::{Effect, PainterMsg, PainterStore};
use atelier::panels::encoder::EncodedToken;
use atelier::prng::Prng;
use atelier_client::{BackendClient, ClientError, RequestGate};

/// Where frames come from. The HTTP client in production, a stub in tests.
pub trait FrameSource: Send + Sync + 'static {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, ClientError>> + Send;
}

impl FrameSource for BackendClient {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResult, ClientError>> + Send {
        let client = self.clone();
        async move { client.generate_frames(&request).await }
    }
}

/// Read-only copy of the viewer state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerSnapshot {
    pub status: Status,
    pub status_text: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub is_playing: bool,
    pub frames: Vec<FrameRef>,
    pub cache_bust: CacheBust,
    pub prompt: String,
    pub pills: Vec<String>,
    pub features: Vec<EncodedToken>,
    pub failure: Option<String>,
}

impl ViewerSnapshot {
    fn of(store: &PainterStore) -> Self {
        let anim = store.animation();
        Self {
            status: anim.status(),
            status_text: store.status_text().to_string(),
            current_step: anim.current_step(),
            total_steps: anim.total_steps(),
            is_playing: anim.is_playing(),
            frames: store.frames().to_vec(),
            cache_bust: store.cache_bust(),
            prompt: store.prompt().to_string(),
            pills: store.pills().to_vec(),
            features: store.features().to_vec(),
            failure: anim.failure().map(str::to_string),
        }
    }
}

#[derive(Debug)]
enum Msg {
    Generate {
        prompt: String,
        sampling: SamplingParams,
    },
    Scrub(Scrub),
    Resume,
    Done {
        request: RequestId,
        result: Result<GenerationResult, ClientError>,
    },
    Tick {
        timer: TimerId,
    },
}

/// Cloneable front door of a running viewer.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    tx: mpsc::Sender<Msg>,
    snapshots: watch::Receiver<ViewerSnapshot>,
}

#[derive(Debug, thiserror::Error)]
#[error("viewer has stopped")]
pub struct ViewerClosed;

impl ViewerHandle {
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        sampling: SamplingParams,
    ) -> Result<(), ViewerClosed> {
        self.send(Msg::Generate {
            prompt: prompt.into(),
            sampling,
        })
        .await
    }

    pub async fn scrub(&self, scrub: Scrub) -> Result<(), ViewerClosed> {
        self.send(Msg::Scrub(scrub)).await
    }

    pub async fn resume(&self) -> Result<(), ViewerClosed> {
        self.send(Msg::Resume).await
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewerSnapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, msg: Msg) -> Result<(), ViewerClosed> {
        self.tx.send(msg).await.map_err(|_| ViewerClosed)
    }
}

/// Start a viewer. It runs until every [`ViewerHandle`] is dropped.
pub fn spawn_viewer<S: FrameSource>(
    source: S,
    interval: Duration,
    rng: Prng,
) -> (ViewerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let store = PainterStore::new(AnimationDriver::new(interval), rng);
    let (snap_tx, snap_rx) = watch::channel(ViewerSnapshot::of(&store));

    let actor = Viewer {
        store,
        source: Arc::new(source),
        gate: RequestGate::new(),
        timer: None,
        tx: tx.downgrade(),
        snapshots: snap_tx,
    };
    let task = tokio::spawn(actor.run(rx));

    (
        ViewerHandle {
            tx,
            snapshots: snap_rx,
        },
        task,
    )
}

struct Viewer<S> {
    store: PainterStore,
    source: Arc<S>,
    gate: RequestGate,
    timer: Option<(TimerId, JoinHandle<()>)>,
    // Weak so that helper tasks never keep the actor alive on their own.
    tx: mpsc::WeakSender<Msg>,
    snapshots: watch::Sender<ViewerSnapshot>,
}

impl<S: FrameSource> Viewer<S> {
    async fn run(mut self, mut rx: mpsc::Receiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            let effects = self.store.update(self.translate(msg));
            for effect in effects {
                self.execute(effect);
            }
            self.snapshots.send_replace(ViewerSnapshot::of(&self.store));
        }
        self.gate.cancel();
        self.stop_timer();
        debug!("viewer stopped");
    }

    fn translate(&self, msg: Msg) -> PainterMsg {
        match msg {
            Msg::Generate { prompt, sampling } => {
                info!(%prompt, "generation requested");
                PainterMsg::Generate { prompt, sampling }
            }
            Msg::Scrub(scrub) => PainterMsg::Scrub(scrub),
            Msg::Resume => PainterMsg::Resume,
            Msg::Done { request, result } => match result {
                Ok(result) => {
                    info!(%request, frames = result.len(), "frames loaded");
                    PainterMsg::Loaded {
                        request,
                        frames: result.frames().to_vec(),
                    }
                }
                Err(e) => {
                    warn!(%request, error = %e, "generation failed");
                    PainterMsg::Failed {
                        request,
                        message: e.to_string(),
                    }
                }
            },
            Msg::Tick { timer } => PainterMsg::Tick { timer },
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Send { request, body } => {
                let ticket = self.gate.open(request);
                let source = Arc::clone(&self.source);
                let Some(tx) = self.tx.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    if let Some(result) = ticket.run(source.generate(body)).await {
                        let _ = tx.send(Msg::Done { request, result }).await;
                    }
                });
            }
            Effect::Cancel { request } => {
                debug!(%request, "superseded");
            }
            Effect::Timer(Command::StartTimer { timer, interval }) => {
                self.stop_timer();
                debug!(?timer, ?interval, "timer started");
                let weak = self.tx.clone();
                let handle = tokio::spawn(async move {
                    let mut ticks = interval_at(Instant::now() + interval, interval);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticks.tick().await;
                        let Some(tx) = weak.upgrade() else {
                            break;
                        };
                        if tx.send(Msg::Tick { timer }).await.is_err() {
                            break;
                        }
                    }
                });
                self.timer = Some((timer, handle));
            }
            Effect::Timer(Command::CancelTimer { timer }) => {
                if matches!(self.timer, Some((active, _)) if active == timer) {
                    debug!(?timer, "timer cancelled");
                    self.stop_timer();
                }
            }
        }
    }

    fn stop_timer(&mut self) {
        if let Some((_, handle)) = self.timer.take() {
            handle.abort();
        }
    }
}
