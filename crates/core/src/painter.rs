//! PixelPainter state container.
//!
//! [`PainterStore`] is the single owner of everything the PixelPainter panels
//! read. It is updated only through [`PainterStore::update`], which answers
//! with the [`Effect`]s the runtime has to carry out (send a request, cancel a
//! superseded one, start or stop the step timer).

use std::sync::Arc;

use crate::animation::{AnimationDriver, AnimationState, Command, Event, Scrub, Stage, Status, TimerId};
use crate::generation::{
    CacheBust, FrameRef, GenerationRequest, GenerationResult, RequestId, RequestSequence,
    SamplingParams,
};
use crate::panels::encoder::{encoder_rows, EncodedToken};
use crate::panels::frames::{static_url, FrameIndex};
use crate::prng::Prng;
use crate::tokens::word_pills;

pub const STATUS_TOKENIZING: &str = "Tokenizing...";
pub const STATUS_ENCODING: &str = "Encoding tokens...";
pub const STATUS_REQUESTING: &str = "Requesting image generation...";
pub const STATUS_ANIMATING: &str = "Animating diffusion steps";
pub const STATUS_COMPLETE: &str = "Generation complete";

#[derive(Debug, Clone, PartialEq)]
pub enum PainterMsg {
    Generate {
        prompt: String,
        sampling: SamplingParams,
    },
    Loaded {
        request: RequestId,
        frames: Vec<FrameRef>,
    },
    Failed {
        request: RequestId,
        message: String,
    },
    Tick {
        timer: TimerId,
    },
    Scrub(Scrub),
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send {
        request: RequestId,
        body: GenerationRequest,
    },
    /// A newer request replaced this one; its response will be ignored anyway.
    Cancel {
        request: RequestId,
    },
    Timer(Command),
}

#[derive(Debug, Clone)]
pub struct PainterStore {
    prompt: String,
    pills: Vec<String>,
    features: Vec<EncodedToken>,
    driver: AnimationDriver,
    requests: RequestSequence,
    /// Newest successful result, kept through later failures.
    latest: Option<Arc<GenerationResult>>,
    /// Whether `latest` belongs to the current cycle and should be shown.
    showing: bool,
    cache_bust: CacheBust,
    status_text: String,
    rng: Prng,
}

impl Default for PainterStore {
    fn default() -> Self {
        Self::new(AnimationDriver::default(), Prng::from_entropy())
    }
}

impl PainterStore {
    pub fn new(driver: AnimationDriver, rng: Prng) -> Self {
        Self {
            prompt: String::new(),
            pills: Vec::new(),
            features: Vec::new(),
            driver,
            requests: RequestSequence::new(),
            latest: None,
            showing: false,
            cache_bust: CacheBust::default(),
            status_text: String::new(),
            rng,
        }
    }

    pub fn update(&mut self, msg: PainterMsg) -> Vec<Effect> {
        let mut effects = Vec::new();
        match msg {
            PainterMsg::Generate { prompt, sampling } => {
                if let Some(old) = self.driver.pending_request() {
                    effects.push(Effect::Cancel { request: old });
                }
                self.showing = false;

                self.push_timer(&mut effects, Event::Prepare(Stage::Tokenizing));
                self.status_text = STATUS_TOKENIZING.to_string();
                self.pills = word_pills(&prompt);

                self.push_timer(&mut effects, Event::Prepare(Stage::Encoding));
                self.status_text = STATUS_ENCODING.to_string();
                self.features = encoder_rows(&self.pills, &mut self.rng);

                let request = self.requests.next_id();
                self.push_timer(&mut effects, Event::Submit { request });
                self.status_text = STATUS_REQUESTING.to_string();
                self.prompt = prompt;

                effects.push(Effect::Send {
                    request,
                    body: GenerationRequest::new(self.prompt.clone(), sampling),
                });
            }
            PainterMsg::Loaded { request, frames } => {
                if self.driver.pending_request() != Some(request) {
                    return effects;
                }
                let total = frames.len();
                let result = GenerationResult::new(frames).superseding(self.latest.take());
                self.latest = Some(Arc::new(result));
                self.showing = true;
                self.cache_bust = CacheBust::after(self.cache_bust);
                self.push_timer(&mut effects, Event::Loaded { request, total });
                self.sync_status_text();
            }
            PainterMsg::Failed { request, message } => {
                if self.driver.pending_request() != Some(request) {
                    return effects;
                }
                self.push_timer(
                    &mut effects,
                    Event::Failed {
                        request,
                        message: message.clone(),
                    },
                );
                self.status_text = format!("Generation failed: {message}");
            }
            PainterMsg::Tick { timer } => {
                self.push_timer(&mut effects, Event::Tick { timer });
                self.sync_status_text();
            }
            PainterMsg::Scrub(scrub) => {
                self.push_timer(&mut effects, Event::Scrub(scrub));
            }
            PainterMsg::Resume => {
                self.push_timer(&mut effects, Event::Resume);
                self.sync_status_text();
            }
        }
        effects
    }

    fn push_timer(&mut self, effects: &mut Vec<Effect>, event: Event) {
        effects.extend(self.driver.apply(event).into_iter().map(Effect::Timer));
    }

    fn sync_status_text(&mut self) {
        match self.driver.state().status() {
            Status::Animating => self.status_text = STATUS_ANIMATING.to_string(),
            Status::Complete => self.status_text = STATUS_COMPLETE.to_string(),
            _ => {}
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn pills(&self) -> &[String] {
        &self.pills
    }

    pub fn features(&self) -> &[EncodedToken] {
        &self.features
    }

    pub fn animation(&self) -> &AnimationState {
        self.driver.state()
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn cache_bust(&self) -> CacheBust {
        self.cache_bust
    }

    /// Frames of the current cycle. Empty while a request is being prepared
    /// or after a failure.
    pub fn frames(&self) -> &[FrameRef] {
        match (&self.latest, self.showing) {
            (Some(r), true) => r.frames(),
            _ => &[],
        }
    }

    /// Newest successful result, even if it is not on screen any more.
    pub fn last_result(&self) -> Option<&GenerationResult> {
        self.latest.as_deref()
    }

    pub fn current_frame(&self) -> Option<&FrameRef> {
        self.frames().get(self.driver.state().current_step())
    }

    pub fn current_frame_url(&self, base: &str) -> Option<String> {
        self.current_frame()
            .map(|f| static_url(base, f, self.cache_bust))
    }

    pub fn frame_index(&self) -> Option<FrameIndex> {
        FrameIndex::of(self.frames().len())
    }
}
