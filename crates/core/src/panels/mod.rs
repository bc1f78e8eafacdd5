//! Display panels.
//!
//! Each panel is a pure function from state to a small view model. Front
//! ends only lay the view models out.

pub mod attention;
pub mod embedding;
pub mod encoder;
pub mod frames;
pub mod logits;
pub mod probability;
pub mod text;

pub use attention::{attention_view, AttentionView};
pub use embedding::{embedding_row, heat_row, marker_size, EmbeddingRow, HeatCell};
pub use encoder::{encoder_rows, EncodedToken, FEATURE_LABELS};
pub use frames::{
    diffusion_view, final_canvas, refinement_view, static_url, DiffusionView, FinalCanvas,
    FrameIndex, Refinement,
};
pub use logits::{top_logits, LogitRow};
pub use probability::{normalize, probability_rows, ProbabilityRow};
pub use text::{output_view, token_table, transformer_flow, OutputView, TokenRow};
