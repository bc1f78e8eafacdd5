//! Token records, the bounded token window, and the small text heuristics the
//! WordWeaver output relies on.

use std::collections::VecDeque;

use crate::prng::Prng;

/// Maximum number of records kept for the embedding-space view.
pub const WINDOW_CAPACITY: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub text: String,
    pub id: u32,
    pub embedding: Vec<f32>,
    pub position: Option<Vec<f32>>,
}

impl TokenRecord {
    /// Build a record, coercing non-finite vector components to zero.
    pub fn new(
        text: impl Into<String>,
        id: u32,
        embedding: Vec<f32>,
        position: Option<Vec<f32>>,
    ) -> Self {
        Self {
            text: text.into(),
            id,
            embedding: sanitize(embedding),
            position: position.map(sanitize),
        }
    }

    /// `"fox (1234)"`
    pub fn label(&self) -> String {
        format!("{} ({})", self.text, self.id)
    }
}

/// Replace NaN/±inf with 0 so nothing non-finite reaches rendering or PCA.
pub fn sanitize(mut v: Vec<f32>) -> Vec<f32> {
    for x in v.iter_mut() {
        if !x.is_finite() {
            *x = 0.0;
        }
    }
    v
}

/// Rolling window of the most recently seen tokens, unique by id.
///
/// Merging a record whose id is already present replaces the old entry and
/// moves it to the newest position. Once the window exceeds its capacity the
/// oldest entries are evicted.
#[derive(Debug, Clone)]
pub struct TokenWindow {
    entries: VecDeque<TokenRecord>,
    capacity: usize,
}

impl Default for TokenWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

impl TokenWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn merge<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = TokenRecord>,
    {
        for rec in records {
            if let Some(pos) = self.entries.iter().position(|e| e.id == rec.id) {
                self.entries.remove(pos);
            }
            self.entries.push_back(rec);
            while self.entries.len() > self.capacity {
                self.entries.pop_front();
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenRecord> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<TokenRecord> {
        self.entries.iter().cloned().collect()
    }
}

/// Append a generated token to the running text.
///
/// Tokens that carry their own leading space are glued on as-is; anything
/// else is joined with a single space and the result trimmed.
pub fn append_token(base: &str, token: &str) -> String {
    if token.starts_with(' ') {
        format!("{base}{token}")
    } else {
        format!("{base} {token}").trim().to_string()
    }
}

/// Placeholder ids (1-based word positions) used when the backend does not
/// return real token ids. Counts whitespace-separated pieces the way a regex
/// split on `\s+` does, so leading/trailing whitespace yields an extra piece
/// and the empty string yields one.
pub fn guess_token_ids(text: &str) -> Vec<u32> {
    let mut pieces = 1u32;
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                pieces += 1;
                in_space = true;
            }
        } else {
            in_space = false;
        }
    }
    (1..=pieces).collect()
}

/// Whitespace-separated words, used for the prompt token pills.
pub fn word_pills(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Split text so that each token keeps the single space that ends it.
/// `"ab cd"` becomes `["ab ", "cd"]`.
pub fn flow_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        cur.push(ch);
        if ch == ' ' {
            parts.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        parts.push(cur);
    }
    parts
}

/// Words the offline sampler draws from when the backend cannot be reached.
pub const FALLBACK_POOL: &[&str] = &[
    "the", "a", "story", "world", "time", "data", "love", "storm", "new", "city", "this", "that",
    "an", "model", "people", "night", "light", "voice", "found",
];

/// Weight given to the chosen word in the synthesised distribution.
const FALLBACK_CHOSEN_WEIGHT: f32 = 0.45;

/// A locally synthesised next token.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackDraw {
    /// Chosen word with a leading space, ready for [`append_token`].
    pub token: String,
    pub candidates: Vec<String>,
    pub probs: Vec<f32>,
}

/// Offline degraded-mode sampler.
pub fn fallback_draw(rng: &mut Prng, top_k: u32) -> FallbackDraw {
    let chosen = FALLBACK_POOL[rng.gen_range_usize(0, FALLBACK_POOL.len())];
    let remaining: Vec<&str> = FALLBACK_POOL
        .iter()
        .copied()
        .filter(|w| *w != chosen)
        .collect();
    let k = (top_k.saturating_sub(1) as usize).min(remaining.len());

    let mut candidates = vec![chosen.to_string()];
    for i in rng.sample_indices(remaining.len(), k) {
        candidates.push(remaining[i].to_string());
    }

    let probs = if candidates.len() > 1 {
        let rest = (1.0 - FALLBACK_CHOSEN_WEIGHT) / (candidates.len() - 1) as f32;
        std::iter::once(FALLBACK_CHOSEN_WEIGHT)
            .chain(std::iter::repeat(rest).take(candidates.len() - 1))
            .collect()
    } else {
        vec![1.0]
    };

    FallbackDraw {
        token: format!(" {chosen}"),
        candidates,
        probs,
    }
}
