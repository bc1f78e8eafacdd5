use crate::float_fmt::{fixed, percent};

/// Scale `probs` so they sum to 1. Non-finite entries count as 0 and an
/// all-zero input is returned unchanged (divided by 1).
pub fn normalize(probs: &[f32]) -> Vec<f32> {
    let clean: Vec<f32> = probs
        .iter()
        .map(|&p| if p.is_finite() { p } else { 0.0 })
        .collect();
    let sum: f32 = clean.iter().sum();
    let sum = if sum != 0.0 && sum.is_finite() { sum } else { 1.0 };
    clean.into_iter().map(|p| p / sum).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub token: String,
    pub share: f32,
    /// Bar label, `"25.00%"`.
    pub percent: String,
    /// Table cell, `"0.250"`.
    pub value: String,
}

/// One row per candidate. A candidate without a probability gets 0.
pub fn probability_rows(candidates: &[String], probs: &[f32]) -> Vec<ProbabilityRow> {
    let shares = normalize(probs);
    candidates
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let share = shares.get(i).copied().unwrap_or(0.0);
            ProbabilityRow {
                token: token.clone(),
                share,
                percent: percent(share, 2),
                value: fixed(share, 3),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_by_the_sum() {
        assert_eq!(normalize(&[2.0, 2.0, 4.0]), [0.25, 0.25, 0.5]);
        assert_eq!(normalize(&[0.0, 0.0]), [0.0, 0.0]);
        assert_eq!(normalize(&[f32::NAN, 1.0]), [0.0, 1.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn rows_format_percent_and_share() {
        let cands = vec![" the".to_string(), " a".to_string(), " fox".to_string()];
        let rows = probability_rows(&cands, &[2.0, 2.0]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].percent, "50.00%");
        assert_eq!(rows[1].value, "0.500");
        assert_eq!(rows[2].share, 0.0);
        assert_eq!(rows[2].percent, "0.00%");
    }
}
