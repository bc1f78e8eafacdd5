//! Control parameters, their schema, and the prompt presets.
//!
//! Every tunable value is described once by a [`ParamSpec`]; setters clamp
//! into the described range so callers never hold an out-of-range value.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::animation::DEFAULT_TICK;
use crate::generation::SamplingParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Temperature,
    TopK,
    AnimationSpeed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub key: ParamKey,
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl ParamSpec {
    /// Clamp into `[min, max]`. Non-finite input falls back to the default.
    pub fn clamp(&self, v: f32) -> f32 {
        if !v.is_finite() {
            return self.default;
        }
        v.clamp(self.min, self.max)
    }
}

pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-3B";

/// Models offered by the selector.
pub const MODEL_CHOICES: &[&str] = &[DEFAULT_MODEL];

pub fn param_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            key: ParamKey::Temperature,
            name: "temperature",
            label: "Temperature",
            description: "Softmax temperature. Low values sharpen the distribution, high values flatten it.",
            min: 0.1,
            max: 1.5,
            step: 0.05,
            default: 0.8,
        },
        ParamSpec {
            key: ParamKey::TopK,
            name: "top_k",
            label: "Top-k",
            description: "Number of highest-scoring candidates the sampler may pick from.",
            min: 1.0,
            max: 20.0,
            step: 1.0,
            default: 8.0,
        },
        ParamSpec {
            key: ParamKey::AnimationSpeed,
            name: "animation_speed",
            label: "Animation Speed",
            description: "Playback speed of the visualisations.",
            min: 0.0,
            max: 1.0,
            step: 0.05,
            default: 0.25,
        },
    ]
}

pub fn spec_for(key: ParamKey) -> Option<ParamSpec> {
    param_specs().into_iter().find(|s| s.key == key)
}

/// Look a control up by its `name` field (as used on the command line).
pub fn spec_named(name: &str) -> Option<ParamSpec> {
    param_specs().into_iter().find(|s| s.name == name)
}

fn bounds(key: ParamKey) -> (f32, f32, f32) {
    match spec_for(key) {
        Some(s) => (s.min, s.max, s.default),
        None => (0.0, 1.0, 0.0),
    }
}

fn clamp_with(key: ParamKey, v: f32) -> f32 {
    let (min, max, default) = bounds(key);
    if v.is_finite() {
        v.clamp(min, max)
    } else {
        default
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControlParameters {
    model_name: String,
    temperature: f32,
    top_k: u32,
    animation_speed: f32,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            temperature: 0.8,
            top_k: 8,
            animation_speed: 0.25,
        }
    }
}

impl ControlParameters {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn animation_speed(&self) -> f32 {
        self.animation_speed
    }

    /// Blank names keep the current model.
    pub fn set_model_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        let name = name.trim();
        if !name.is_empty() {
            self.model_name = name.to_string();
        }
    }

    pub fn set_temperature(&mut self, v: f32) {
        self.temperature = clamp_with(ParamKey::Temperature, v);
    }

    pub fn set_top_k(&mut self, v: u32) {
        self.top_k = clamp_with(ParamKey::TopK, v as f32).round() as u32;
    }

    pub fn set_animation_speed(&mut self, v: f32) {
        self.animation_speed = clamp_with(ParamKey::AnimationSpeed, v);
    }

    /// Set a control by key from a raw number (CLI/config input).
    pub fn set(&mut self, key: ParamKey, v: f32) {
        match key {
            ParamKey::Temperature => self.set_temperature(v),
            ParamKey::TopK => {
                let v = clamp_with(ParamKey::TopK, v);
                self.top_k = v.round() as u32;
            }
            ParamKey::AnimationSpeed => self.set_animation_speed(v),
        }
    }

    pub fn get(&self, key: ParamKey) -> f32 {
        match key {
            ParamKey::Temperature => self.temperature,
            ParamKey::TopK => self.top_k as f32,
            ParamKey::AnimationSpeed => self.animation_speed,
        }
    }

    /// Re-apply every range, e.g. after deserialising a hand-edited file.
    pub fn normalized(mut self) -> Self {
        let model = std::mem::take(&mut self.model_name);
        let mut out = Self::default();
        out.set_model_name(model);
        out.set_temperature(self.temperature);
        out.set(ParamKey::TopK, self.top_k as f32);
        out.set_animation_speed(self.animation_speed);
        out
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_k: self.top_k,
        }
    }

    /// Step interval derived from the speed slider: `0` keeps the base
    /// interval, `1` plays four times faster.
    pub fn step_interval(&self, base: Duration) -> Duration {
        let factor = 1.0 + 3.0 * self.animation_speed as f64;
        let base = if base.is_zero() { DEFAULT_TICK } else { base };
        let nanos = (base.as_nanos() as f64 / factor).round() as u64;
        Duration::from_nanos(nanos).max(Duration::from_millis(1))
    }
}

pub const DEFAULT_PAINTER_PROMPT: &str = "A red fox in a misty forest";

pub const PAINTER_PRESETS: &[&str] = &[
    "A cute kitten playing with yarn",
    "Colorful flowers in a garden",
    "A happy puppy in a field",
    "Sunset over mountains",
    "Butterflies in a meadow",
    "A cozy cabin in snow",
    "Rainbow over hills",
    "Dolphins jumping in ocean",
];

pub const WEAVER_PRESETS: &[&str] = &[
    "Once upon a time",
    "The quick brown fox",
    "In a world where",
    "I love programming because",
    "During the storm, the",
    "Researchers discovered a new",
];
