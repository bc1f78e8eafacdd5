//! Encoder station. The feature strengths are decorative placeholders drawn
//! fresh on every render; they say nothing about the real text encoder.

use crate::float_fmt::fixed;
use crate::prng::Prng;

pub const FEATURE_LABELS: &[&str] = &[
    "Object Type",
    "Color",
    "Size",
    "Pose",
    "Action",
    "Background",
    "…etc",
];

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedToken {
    pub token: String,
    /// One `"0.42"` string per entry of [`FEATURE_LABELS`].
    pub strengths: Vec<String>,
}

pub fn encoder_rows(tokens: &[String], rng: &mut Prng) -> Vec<EncodedToken> {
    tokens
        .iter()
        .map(|token| EncodedToken {
            token: token.clone(),
            strengths: FEATURE_LABELS
                .iter()
                .map(|_| fixed(rng.next_f32_01(), 2))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_strength_per_feature() {
        let mut rng = Prng::new(3);
        let rows = encoder_rows(&["A".into(), "red".into(), "fox".into()], &mut rng);
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.strengths.len(), FEATURE_LABELS.len());
            for s in &row.strengths {
                let v: f32 = s.parse().expect("number");
                assert!((0.0..=1.0).contains(&v));
                assert_eq!(s.len(), 4);
            }
        }
    }
}
