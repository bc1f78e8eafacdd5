use crate::float_fmt::fixed;
use crate::inspection::AttentionMatrix;

pub const NO_ATTENTION: &str = "Attention not available.";

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionCell {
    pub value: f32,
    pub display: String,
    /// Background opacity: `0.15 + min(0.85, v)`.
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionView {
    /// `("K1", token)` per column.
    pub keys: Vec<(String, String)>,
    /// `("Q1", token)` per row.
    pub queries: Vec<(String, String)>,
    pub cells: Vec<Vec<AttentionCell>>,
}

/// `None` when there is nothing to draw; callers show [`NO_ATTENTION`].
/// Token labels missing from `tokens` render as empty strings.
pub fn attention_view(matrix: &AttentionMatrix, tokens: &[String]) -> Option<AttentionView> {
    if matrix.is_empty() {
        return None;
    }
    let n = matrix.size();
    let token = |i: usize| tokens.get(i).cloned().unwrap_or_default();
    let keys = (0..n).map(|c| (format!("K{}", c + 1), token(c))).collect();
    let queries = (0..n).map(|r| (format!("Q{}", r + 1), token(r))).collect();
    let cells = matrix
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|&value| AttentionCell {
                    value,
                    display: fixed(value, 2),
                    intensity: 0.15 + value.min(0.85),
                })
                .collect()
        })
        .collect();
    Some(AttentionView {
        keys,
        queries,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_intensity() {
        let m = AttentionMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.25, 0.75]]);
        let tokens = vec!["Once".to_string(), " upon".to_string()];
        let v = attention_view(&m, &tokens).expect("square matrix");
        assert_eq!(v.keys[1], ("K2".to_string(), " upon".to_string()));
        assert_eq!(v.queries[0].0, "Q1");
        assert_eq!(v.cells[1][0].display, "0.25");
        assert!((v.cells[0][0].intensity - 1.0).abs() < 1e-6);
        assert!((v.cells[0][1].intensity - 0.15).abs() < 1e-6);
    }

    #[test]
    fn empty_matrix_has_no_view() {
        assert!(attention_view(&AttentionMatrix::default(), &[]).is_none());
    }
}
