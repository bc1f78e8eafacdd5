//! WordWeaver state container: the running text, the last sampled token and
//! its distribution, and the refresh trigger the inspection side watches.

use crate::generation::{RequestId, RequestSequence, SamplingParams};
use crate::prng::Prng;
use crate::tokens::{append_token, fallback_draw, guess_token_ids};

pub const EMPTY_CONTEXT_MESSAGE: &str = "Please type a prompt or choose a preset before generating.";
pub const FALLBACK_MESSAGE: &str = "Model/Backend error — used fallback token.";

/// Generation was asked for with nothing to continue from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyContext;

impl std::fmt::Display for EmptyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(EMPTY_CONTEXT_MESSAGE)
    }
}

impl std::error::Error for EmptyContext {}

/// One sampled step as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextToken {
    pub token: String,
    pub candidates: Vec<String>,
    pub probs: Vec<f32>,
    pub token_ids: Option<Vec<u32>>,
}

/// A generation the runtime has to send.
#[derive(Debug, Clone, PartialEq)]
pub struct NextTokenRequest {
    pub request: RequestId,
    pub context: String,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, Default)]
pub struct WeaverStore {
    context: String,
    output: String,
    last_token: String,
    candidates: Vec<String>,
    probs: Vec<f32>,
    token_ids: Vec<u32>,
    refresh_trigger: u64,
    error: Option<String>,
    requests: RequestSequence,
    pending: Option<RequestId>,
}

impl WeaverStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit the prompt box. The output is left alone.
    pub fn set_context(&mut self, text: impl Into<String>) {
        self.context = text.into();
    }

    /// Load a preset as both prompt and output, then ask for a refresh.
    pub fn choose_preset(&mut self, text: &str) {
        self.context = text.to_string();
        self.output = text.to_string();
        self.token_ids = guess_token_ids(text);
        self.bump();
    }

    /// Text the next token continues: the output once there is one, the
    /// prompt before that.
    pub fn generation_context(&self) -> &str {
        if self.output.is_empty() {
            &self.context
        } else {
            &self.output
        }
    }

    /// Same text, fed to the internal forward pass.
    pub fn inspection_context(&self) -> &str {
        self.generation_context()
    }

    /// Start a generation step. Refused locally when there is no context.
    pub fn begin(&mut self, sampling: SamplingParams) -> Result<NextTokenRequest, EmptyContext> {
        self.error = None;
        let context = self.generation_context();
        if context.trim().is_empty() {
            self.error = Some(EMPTY_CONTEXT_MESSAGE.to_string());
            return Err(EmptyContext);
        }
        let context = context.to_string();
        let request = self.requests.next_id();
        self.pending = Some(request);
        Ok(NextTokenRequest {
            request,
            context,
            sampling,
        })
    }

    /// Apply a backend answer. Returns `false` for a superseded request.
    pub fn apply_generated(&mut self, request: RequestId, next: NextToken) -> bool {
        if !self.take_pending(request) {
            return false;
        }
        self.output = append_token(self.generation_context(), &next.token);
        self.last_token = next.token;
        self.candidates = next.candidates;
        self.probs = next.probs;
        self.token_ids = match next.token_ids {
            Some(ids) => ids,
            None => guess_token_ids(&self.output),
        };
        self.bump();
        true
    }

    /// Degraded mode: the backend failed, so continue with a locally drawn
    /// token and report it.
    pub fn apply_fallback(&mut self, request: RequestId, rng: &mut Prng, top_k: u32) -> bool {
        if !self.take_pending(request) {
            return false;
        }
        let draw = fallback_draw(rng, top_k);
        self.output = format!("{}{}", self.generation_context(), draw.token);
        self.last_token = draw.token;
        self.candidates = draw.candidates;
        self.probs = draw.probs;
        self.token_ids = guess_token_ids(&self.output);
        self.error = Some(FALLBACK_MESSAGE.to_string());
        self.bump();
        true
    }

    pub fn reset(&mut self) {
        self.context.clear();
        self.output.clear();
        self.last_token.clear();
        self.candidates.clear();
        self.probs.clear();
        self.token_ids.clear();
        self.error = None;
        // Retire anything in flight.
        self.requests.next_id();
        self.pending = None;
        self.bump();
    }

    fn take_pending(&mut self, request: RequestId) -> bool {
        if self.pending != Some(request) || !self.requests.is_latest(request) {
            return false;
        }
        self.pending = None;
        true
    }

    fn bump(&mut self) {
        self.refresh_trigger += 1;
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn last_token(&self) -> &str {
        &self.last_token
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn probs(&self) -> &[f32] {
        &self.probs
    }

    pub fn token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    pub fn refresh_trigger(&self) -> u64 {
        self.refresh_trigger
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(token: &str) -> NextToken {
        NextToken {
            token: token.to_string(),
            candidates: vec![token.to_string(), " b".to_string()],
            probs: vec![0.7, 0.3],
            token_ids: None,
        }
    }

    #[test]
    fn empty_context_is_refused_without_a_request() {
        let mut s = WeaverStore::new();
        s.set_context("   ");
        assert_eq!(s.begin(SamplingParams::default()), Err(EmptyContext));
        assert_eq!(s.error(), Some(EMPTY_CONTEXT_MESSAGE));
        assert!(!s.is_loading());
        assert_eq!(s.refresh_trigger(), 0);
    }

    #[test]
    fn generated_tokens_extend_the_output() {
        let mut s = WeaverStore::new();
        s.set_context("Once upon");
        let req = s.begin(SamplingParams::default()).expect("context");
        assert_eq!(req.context, "Once upon");
        assert!(s.apply_generated(req.request, next(" a")));
        assert_eq!(s.output(), "Once upon a");
        assert_eq!(s.last_token(), " a");
        assert_eq!(s.token_ids(), [1, 2, 3]);
        assert_eq!(s.refresh_trigger(), 1);

        let req = s.begin(SamplingParams::default()).expect("context");
        assert_eq!(req.context, "Once upon a");
        let mut n = next("time");
        n.token_ids = Some(vec![9, 8, 7, 6]);
        s.apply_generated(req.request, n);
        assert_eq!(s.output(), "Once upon a time");
        assert_eq!(s.token_ids(), [9, 8, 7, 6]);
    }

    #[test]
    fn fallback_still_advances_and_refreshes() {
        let mut s = WeaverStore::new();
        s.choose_preset("The quick brown fox");
        assert_eq!(s.refresh_trigger(), 1);
        let req = s.begin(SamplingParams::default()).expect("context");
        assert!(s.apply_fallback(req.request, &mut Prng::new(4), 8));
        assert_eq!(s.error(), Some(FALLBACK_MESSAGE));
        assert!(s.output().starts_with("The quick brown fox "));
        assert_eq!(s.candidates().len(), 8);
        assert_eq!(s.token_ids().len(), 5);
        assert_eq!(s.refresh_trigger(), 2);
    }

    #[test]
    fn superseded_answers_are_dropped() {
        let mut s = WeaverStore::new();
        s.set_context("a");
        let first = s.begin(SamplingParams::default()).expect("context");
        let second = s.begin(SamplingParams::default()).expect("context");
        assert!(!s.apply_generated(first.request, next(" x")));
        assert!(s.apply_generated(second.request, next(" y")));
        assert_eq!(s.output(), "a y");
    }

    #[test]
    fn reset_clears_everything_and_drops_inflight() {
        let mut s = WeaverStore::new();
        s.choose_preset("In a world where");
        let req = s.begin(SamplingParams::default()).expect("context");
        s.reset();
        assert!(!s.apply_generated(req.request, next(" x")));
        assert_eq!(s.output(), "");
        assert_eq!(s.context(), "");
        assert!(s.token_ids().is_empty());
        assert_eq!(s.refresh_trigger(), 2);
        assert_eq!(s.inspection_context(), "");
    }
}
