use crate::float_fmt::fixed;

pub const TOP_LOGITS: usize = 10;
pub const NO_LOGITS: &str =
    "No logits available yet. Generate a token to fetch raw model scores for the next position.";

#[derive(Debug, Clone, PartialEq)]
pub struct LogitRow {
    pub vocab_id: usize,
    pub score: f32,
    pub display: String,
}

/// Highest `n` raw scores with their vocabulary index, best first. Ties keep
/// vocabulary order.
pub fn top_logits(logits: &[f32], n: usize) -> Vec<LogitRow> {
    let mut pairs: Vec<(usize, f32)> = logits
        .iter()
        .enumerate()
        .map(|(i, &s)| (i, if s.is_finite() { s } else { 0.0 }))
        .collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs
        .into_iter()
        .take(n)
        .map(|(vocab_id, score)| LogitRow {
            vocab_id,
            score,
            display: fixed(score, 4),
        })
        .collect()
}
