//! Generation requests and results.
//!
//! A request is built once from the prompt and the current controls and is
//! never touched again. A result is likewise immutable: a newer result
//! supersedes it and keeps a link back to it for before/after comparison.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sampling knobs forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    sampling: SamplingParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            prompt: prompt.into(),
            sampling,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn sampling(&self) -> SamplingParams {
        self.sampling
    }
}

/// Opaque identifier of one generated step: an image file name for
/// PixelPainter, the sampled token text for WordWeaver.
pub type FrameRef = String;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    frames: Vec<FrameRef>,
    previous: Option<Arc<GenerationResult>>,
}

impl GenerationResult {
    pub fn new(frames: Vec<FrameRef>) -> Self {
        Self {
            frames,
            previous: None,
        }
    }

    /// Chain `self` after `previous`. Only the immediate predecessor is kept so
    /// the history does not grow without bound.
    pub fn superseding(mut self, previous: Option<Arc<GenerationResult>>) -> Self {
        self.previous = previous.map(|p| {
            if p.previous.is_some() {
                Arc::new(GenerationResult::new(p.frames.clone()))
            } else {
                p
            }
        });
        self
    }

    pub fn frames(&self) -> &[FrameRef] {
        &self.frames
    }

    pub fn previous(&self) -> Option<&GenerationResult> {
        self.previous.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Value appended to static asset URLs so a re-generated frame with a reused
/// name is fetched fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CacheBust(pub u64);

impl CacheBust {
    /// Milliseconds since the Unix epoch.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(ms)
    }

    /// Strictly newer than `prev`, even if the clock has not moved.
    pub fn after(prev: CacheBust) -> Self {
        let now = Self::now();
        if now > prev {
            now
        } else {
            Self(prev.0 + 1)
        }
    }
}

impl std::fmt::Display for CacheBust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out request ids and remembers the newest one. Only a response for
/// the newest id is ever applied.
#[derive(Debug, Clone, Default)]
pub struct RequestSequence {
    last: u64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> RequestId {
        self.last += 1;
        RequestId(self.last)
    }

    pub fn latest(&self) -> Option<RequestId> {
        (self.last > 0).then_some(RequestId(self.last))
    }

    pub fn is_latest(&self, id: RequestId) -> bool {
        id.0 == self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_built_from_the_exact_prompt() {
        let req = GenerationRequest::new("A red fox", SamplingParams::default());
        assert_eq!(req.prompt(), "A red fox");
        assert_eq!(req.sampling().top_k, 8);
    }

    #[test]
    fn superseding_keeps_only_the_immediate_predecessor() {
        let first = Arc::new(GenerationResult::new(vec!["a.png".into()]));
        let second = Arc::new(
            GenerationResult::new(vec!["b.png".into()]).superseding(Some(Arc::clone(&first))),
        );
        let third = GenerationResult::new(vec!["c.png".into()]).superseding(Some(second));

        let prev = third.previous().expect("predecessor");
        assert_eq!(prev.frames(), ["b.png".to_string()]);
        assert!(prev.previous().is_none());
    }

    #[test]
    fn cache_bust_is_strictly_increasing() {
        let far_future = CacheBust(u64::MAX - 1);
        assert_eq!(CacheBust::after(far_future), CacheBust(u64::MAX));
        let a = CacheBust::now();
        assert!(CacheBust::after(a) > a);
    }

    #[test]
    fn only_the_newest_request_is_latest() {
        let mut seq = RequestSequence::new();
        assert_eq!(seq.latest(), None);
        let a = seq.next_id();
        let b = seq.next_id();
        assert!(b > a);
        assert!(!seq.is_latest(a));
        assert!(seq.is_latest(b));
    }
}
