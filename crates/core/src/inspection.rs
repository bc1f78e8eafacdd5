//! Token inspection state: what the last internal forward pass returned, the
//! rolling token window fed by it, and the trigger gate that decides when a
//! new pass is requested.
//!
//! Nothing here polls. A fetch is only requested when the refresh trigger
//! moved since the last look, and a response is only applied if it answers
//! the newest request.

use crate::generation::{RequestId, RequestSequence};
use crate::tokens::{TokenRecord, TokenWindow};

/// Square attention weights, row = query, column = key, each in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttentionMatrix {
    rows: Vec<Vec<f32>>,
}

impl AttentionMatrix {
    /// A ragged or non-square payload yields an empty matrix. Weights are
    /// clamped into `[0, 1]` and non-finite weights become 0.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return Self::default();
        }
        let rows = rows
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, query: usize, key: usize) -> Option<f32> {
        self.rows.get(query).and_then(|r| r.get(key)).copied()
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }
}

/// One internal forward pass as the panels see it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalState {
    pub tokens: Vec<String>,
    pub records: Vec<TokenRecord>,
    pub attention: AttentionMatrix,
    pub logits: Vec<f32>,
}

/// What the owner should do after the trigger moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectAction {
    /// Issue `POST /internal_forward` for `context`, tagged `request`.
    Fetch { request: RequestId, context: String },
    /// The context is empty: state was cleared, no request needed.
    Cleared,
}

#[derive(Debug, Clone, Default)]
pub struct Inspection {
    seen_trigger: u64,
    requests: RequestSequence,
    window: TokenWindow,
    latest: Option<InternalState>,
    error: Option<String>,
}

impl Inspection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(capacity: usize) -> Self {
        Self {
            window: TokenWindow::new(capacity),
            ..Self::default()
        }
    }

    /// Compare `trigger` with the last value seen. Returns `None` when it has
    /// not moved.
    pub fn observe(&mut self, trigger: u64, context: &str) -> Option<InspectAction> {
        if trigger == self.seen_trigger {
            return None;
        }
        self.seen_trigger = trigger;
        Some(self.refresh(context))
    }

    /// Unconditionally start a refresh for `context`. Any earlier request in
    /// flight is superseded.
    pub fn refresh(&mut self, context: &str) -> InspectAction {
        // Taking an id even for the clear path retires whatever is in flight.
        let request = self.requests.next_id();
        if context.trim().is_empty() {
            self.clear();
            return InspectAction::Cleared;
        }
        InspectAction::Fetch {
            request,
            context: context.to_string(),
        }
    }

    /// Apply a response. Returns `false` (and changes nothing) when
    /// `request` is not the newest one issued.
    pub fn apply(&mut self, request: RequestId, state: InternalState) -> bool {
        if !self.requests.is_latest(request) {
            return false;
        }
        self.window.merge(state.records.iter().cloned());
        self.latest = Some(state);
        self.error = None;
        true
    }

    pub fn fail(&mut self, request: RequestId, message: impl Into<String>) -> bool {
        if !self.requests.is_latest(request) {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.latest = None;
        self.error = None;
    }

    pub fn window(&self) -> &TokenWindow {
        &self.window
    }

    pub fn latest(&self) -> Option<&InternalState> {
        self.latest.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.requests.latest()
    }
}

/// State of the standalone embedding viewer fed by `POST /embed`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingViewer {
    requests: RequestSequence,
    records: Vec<TokenRecord>,
    error: Option<String>,
}

impl EmbeddingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> RequestId {
        self.requests.next_id()
    }

    pub fn apply(&mut self, request: RequestId, records: Vec<TokenRecord>) -> bool {
        if !self.requests.is_latest(request) {
            return false;
        }
        self.records = records;
        self.error = None;
        true
    }

    pub fn fail(&mut self, request: RequestId, message: impl Into<String>) -> bool {
        if !self.requests.is_latest(request) {
            return false;
        }
        self.error = Some(message.into());
        true
    }

    /// Empty the viewer and drop any response still on its way.
    pub fn clear(&mut self) {
        self.requests.next_id();
        self.records.clear();
        self.error = None;
    }

    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
