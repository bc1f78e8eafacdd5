//! Embedding heatmap rows and 3D marker sizing.

use crate::float_fmt::preview;
use crate::tokens::TokenRecord;

/// Leading dimensions drawn in the heatmap.
pub const HEATMAP_DIMS: usize = 48;
/// Values shown in the text preview under each row.
pub const PREVIEW_VALUES: usize = 8;

/// One heatmap cell as an HSL colour (saturation is fixed at 80%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatCell {
    pub value: f32,
    pub hue: i32,
    pub lightness: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRow {
    pub label: String,
    pub dims: usize,
    pub cells: Vec<HeatCell>,
    pub preview: String,
}

/// Min-max normalise the first [`HEATMAP_DIMS`] values of one vector and map
/// them onto a blue-to-yellow ramp. A flat vector maps every cell to the
/// low end.
pub fn heat_row(values: &[f32]) -> Vec<HeatCell> {
    let head = &values[..values.len().min(HEATMAP_DIMS)];
    let min = head.iter().copied().fold(f32::INFINITY, f32::min);
    let max = head.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    let range = if range != 0.0 && range.is_finite() { range } else { 1.0 };
    head.iter()
        .map(|&value| {
            let norm = ((value - min) / range).clamp(0.0, 1.0);
            let norm = if norm.is_finite() { norm } else { 0.0 };
            HeatCell {
                value,
                hue: 220 - (norm * 220.0).round() as i32,
                lightness: (50.0 - norm * 22.0).round() as i32,
            }
        })
        .collect()
}

pub fn embedding_row(record: &TokenRecord) -> EmbeddingRow {
    EmbeddingRow {
        label: record.label(),
        dims: record.embedding.len(),
        cells: heat_row(&record.embedding),
        preview: preview(&record.embedding, PREVIEW_VALUES, 6),
    }
}

/// Marker size for the 3D scatter: smaller markers as the cloud grows.
pub fn marker_size(points: usize) -> u32 {
    9u32.saturating_sub((points / 4) as u32).max(4)
}
