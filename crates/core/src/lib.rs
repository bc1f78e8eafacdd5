//! # atelier
//!
//! Client-side core of two machine-learning visualisers:
//!
//! - **PixelPainter** animates the step-by-step frames of a diffusion image
//!   generation returned by a backend.
//! - **WordWeaver** grows a text one sampled token at a time and inspects
//!   the embeddings, attention and logits behind each step.
//!
//! The models live behind an HTTP backend. This crate holds everything that
//! does not touch the network: the animation driver, the state containers,
//! the token window and its 3D projection, the panel view models and the
//! cosmetic noise simulation.
//!
//! ## Quick Start
//!
//! ```
//! use atelier::prelude::*;
//!
//! let mut store = PainterStore::new(AnimationDriver::default(), Prng::new(7));
//! let effects = store.update(PainterMsg::Generate {
//!     prompt: "A red fox".into(),
//!     sampling: SamplingParams::default(),
//! });
//! let request = effects
//!     .iter()
//!     .find_map(|e| match e {
//!         Effect::Send { request, .. } => Some(*request),
//!         _ => None,
//!     })
//!     .unwrap();
//!
//! store.update(PainterMsg::Loaded {
//!     request,
//!     frames: vec!["s0.png".into(), "s1.png".into(), "s2.png".into()],
//! });
//! assert_eq!(store.animation().status(), Status::Animating);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialisation of control parameters and sampling knobs
//! - `parallel`: build forward-diffusion frames on the rayon thread pool

pub mod animation;
pub mod controls;
pub mod float_fmt;
pub mod generation;
pub mod inspection;
pub mod noise;
pub mod painter;
pub mod panels;
pub mod prng;
pub mod reduction;
pub mod tokens;
pub mod weaver;

/// Prelude module for convenient imports.
///
/// ```
/// use atelier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::animation::{
        AnimationDriver, AnimationState, Command, Event, Scrub, Stage, Status, TimerId,
        DEFAULT_TICK,
    };
    pub use crate::controls::{ControlParameters, ParamKey, ParamSpec};
    pub use crate::generation::{
        CacheBust, FrameRef, GenerationRequest, GenerationResult, RequestId, RequestSequence,
        SamplingParams,
    };
    pub use crate::inspection::{AttentionMatrix, EmbeddingViewer, InspectAction, Inspection, InternalState};
    pub use crate::painter::{Effect, PainterMsg, PainterStore};
    pub use crate::prng::Prng;
    pub use crate::reduction::{project, Method, Projection};
    pub use crate::tokens::{TokenRecord, TokenWindow};
    pub use crate::weaver::{EmptyContext, NextToken, NextTokenRequest, WeaverStore};
}
