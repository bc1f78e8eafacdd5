//! Plain-text rendering of the studio panels for the terminal.

use std::fmt::Write;

use atelier::animation::Status;
use atelier::controls::{param_specs, ControlParameters, MODEL_CHOICES, PAINTER_PRESETS, WEAVER_PRESETS};
use atelier::float_fmt::{fixed, percent};
use atelier::inspection::Inspection;
use atelier::noise::RgbaImage;
use atelier::panels::attention::{attention_view, NO_ATTENTION};
use atelier::panels::embedding::{embedding_row, marker_size};
use atelier::panels::encoder::FEATURE_LABELS;
use atelier::panels::frames::{diffusion_view, final_canvas, refinement_view, DiffusionView};
use atelier::panels::logits::{top_logits, NO_LOGITS, TOP_LOGITS};
use atelier::panels::probability::probability_rows;
use atelier::panels::text::{output_view, token_table, transformer_flow, NO_TOKENS};
use atelier::reduction::{project, Method};
use atelier::tokens::TokenRecord;
use atelier::weaver::WeaverStore;

use crate::viewer::ViewerSnapshot;

const BAR_WIDTH: usize = 30;

fn bar(share: f32) -> String {
    let filled = (share.clamp(0.0, 1.0) * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// One status line, for progress output while animating.
pub fn painter_status(snap: &ViewerSnapshot) -> String {
    match snap.status {
        Status::Animating | Status::Complete if snap.total_steps > 0 => format!(
            "[{}] {} (step {}/{})",
            snap.status.label(),
            snap.status_text,
            snap.current_step + 1,
            snap.total_steps
        ),
        _ => format!("[{}] {}", snap.status.label(), snap.status_text),
    }
}

/// Every PixelPainter panel.
pub fn painter(snap: &ViewerSnapshot, base: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", painter_status(snap));
    let _ = writeln!(out, "Prompt: {}", snap.prompt);

    let _ = writeln!(out, "\nTokens: {}", snap.pills.join(" | "));

    if !snap.features.is_empty() {
        let _ = writeln!(out, "\nEncoder:");
        let _ = writeln!(out, "  {:<14}{}", "token", FEATURE_LABELS.join("  "));
        for row in &snap.features {
            let _ = writeln!(out, "  {:<14}{}", row.token, row.strengths.join("  "));
        }
    }

    let _ = writeln!(out, "\nDiffusion:");
    match diffusion_view(base, &snap.frames, snap.current_step, snap.cache_bust) {
        DiffusionView::Empty { placeholder } => {
            let _ = writeln!(out, "  {placeholder}");
        }
        DiffusionView::Frame { url, label, .. } => {
            let _ = writeln!(out, "  {label}  {url}");
        }
    }

    if snap.status == Status::Complete {
        if let Some(r) = refinement_view(base, &snap.frames, snap.cache_bust) {
            let _ = writeln!(out, "\nRefinement:");
            let _ = writeln!(out, "  step {:>3}  {}", r.mid_step + 1, r.mid_url);
            let _ = writeln!(out, "  step {:>3}  {}", r.final_step + 1, r.final_url);
        }
        if let Some(c) = final_canvas(base, &snap.frames, snap.cache_bust) {
            let _ = writeln!(out, "\nFinal image: {} ({})", c.url, c.file_name);
        }
    }
    if let Some(reason) = &snap.failure {
        let _ = writeln!(out, "\nError: {reason}");
    }
    out
}

/// Text panels of WordWeaver: output, token table, distribution and flow.
pub fn weaver(store: &WeaverStore) -> String {
    let mut out = String::new();
    let view = output_view(store.output(), store.last_token());
    let _ = writeln!(out, "Output: {}", view.body);
    if !view.last_token.is_empty() {
        let _ = writeln!(out, "Last token: {:?}", view.last_token);
    }
    if let Some(err) = store.error() {
        let _ = writeln!(out, "Warning: {err}");
    }

    let _ = writeln!(out, "\nTokens:");
    let rows = token_table(store.output(), store.token_ids());
    if rows.is_empty() {
        let _ = writeln!(out, "  {NO_TOKENS}");
    }
    for row in rows {
        let _ = writeln!(out, "  {:>3}  {:<16}{}", row.index, row.token, row.id);
    }

    let probs = probability_rows(store.candidates(), store.probs());
    if !probs.is_empty() {
        let _ = writeln!(out, "\nNext-token distribution:");
        for row in probs {
            let _ = writeln!(
                out,
                "  {:<16}{} {:>7}  {}",
                format!("{:?}", row.token),
                bar(row.share),
                row.percent,
                row.value
            );
        }
    }

    let flow = transformer_flow(store.output());
    if !flow.is_empty() {
        let _ = writeln!(out, "\nFlow: {}", flow.concat().trim_end());
    }
    out
}

/// Internal-state panels: embeddings, 3D projection, attention and logits.
pub fn inspection(inspection: &Inspection) -> String {
    let mut out = String::new();
    if let Some(err) = inspection.error() {
        let _ = writeln!(out, "Inspection error: {err}");
    }

    let records = inspection.window().to_vec();
    out.push_str(&embeddings(&records));
    out.push_str(&projection(&records));

    let _ = writeln!(out, "\nAttention:");
    let view = inspection
        .latest()
        .and_then(|s| attention_view(&s.attention, &s.tokens));
    match view {
        None => {
            let _ = writeln!(out, "  {NO_ATTENTION}");
        }
        Some(view) => {
            let _ = write!(out, "  {:<12}", "");
            for (k, _) in &view.keys {
                let _ = write!(out, "{k:>6}");
            }
            let _ = writeln!(out);
            for ((q, token), row) in view.queries.iter().zip(&view.cells) {
                let _ = write!(out, "  {:<12}", format!("{q} {}", token.trim()));
                for cell in row {
                    let _ = write!(out, "{:>6}", cell.display);
                }
                let _ = writeln!(out);
            }
        }
    }

    let _ = writeln!(out, "\nTop logits:");
    let logits = inspection
        .latest()
        .map(|s| top_logits(&s.logits, TOP_LOGITS))
        .unwrap_or_default();
    if logits.is_empty() {
        let _ = writeln!(out, "  {NO_LOGITS}");
    }
    for row in logits {
        let _ = writeln!(out, "  {:>8}  {}", row.vocab_id, row.display);
    }
    out
}

/// Embedding heatmap rows, shown as their value preview.
pub fn embeddings(records: &[TokenRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nEmbeddings ({} tokens):", records.len());
    for rec in records {
        let row = embedding_row(rec);
        let _ = writeln!(out, "  {:<24}{:>5}d  {}", row.label, row.dims, row.preview);
    }
    out
}

pub fn projection(records: &[TokenRecord]) -> String {
    let mut out = String::new();
    let proj = project(records);
    if proj.is_empty() {
        return out;
    }
    let method = match proj.method {
        Method::Pca => "PCA",
        Method::RawFallback => "raw dimensions",
    };
    let _ = writeln!(
        out,
        "\n3D projection ({method}, marker {}):",
        marker_size(proj.points.len())
    );
    for p in &proj.points {
        let _ = writeln!(
            out,
            "  {:<24}{:>8} {:>8} {:>8}",
            p.label,
            fixed(p.xyz[0], 3),
            fixed(p.xyz[1], 3),
            fixed(p.xyz[2], 3)
        );
    }
    out
}

/// Mean absolute RGB difference between two images of the same size, 0..=255.
fn deviation(a: &RgbaImage, b: &RgbaImage) -> f32 {
    let (sum, n) = a
        .data()
        .chunks_exact(4)
        .zip(b.data().chunks_exact(4))
        .flat_map(|(p, q)| (0..3).map(move |c| (p[c] as f32 - q[c] as f32).abs()))
        .fold((0.0f32, 0usize), |(s, n), d| (s + d, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f32
    }
}

/// Forward diffusion strip: how far each frame has drifted from the clean image.
pub fn forward(base: &RgbaImage, frames: &[RgbaImage]) -> String {
    let mut out = format!(
        "Forward diffusion (training): clean -> noise, {} frames of {}x{}\n",
        frames.len(),
        base.width(),
        base.height()
    );
    for (i, frame) in frames.iter().enumerate() {
        let alpha = (i + 1) as f32 / frames.len() as f32;
        let dev = deviation(base, frame);
        let _ = writeln!(
            out,
            "  {:>2} / {:<2}  noise {:>4}  {}  drift {}",
            i + 1,
            frames.len(),
            percent(alpha, 0),
            bar(dev / 255.0),
            fixed(dev, 1)
        );
    }
    out
}

pub fn controls(params: &ControlParameters) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "model          {}", params.model_name());
    let _ = writeln!(out, "               choices: {}", MODEL_CHOICES.join(", "));
    for spec in param_specs() {
        let _ = writeln!(
            out,
            "{:<15}{:<8}[{} .. {}, step {}]  {}",
            spec.name,
            fixed(params.get(spec.key), 2),
            spec.min,
            spec.max,
            spec.step,
            spec.description
        );
    }
    out
}

pub fn presets() -> String {
    let mut out = String::from("PixelPainter:\n");
    for p in PAINTER_PRESETS {
        let _ = writeln!(out, "  {p}");
    }
    out.push_str("WordWeaver:\n");
    for p in WEAVER_PRESETS {
        let _ = writeln!(out, "  {p}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier::generation::CacheBust;

    fn snapshot(status: Status, frames: &[&str], step: usize) -> ViewerSnapshot {
        ViewerSnapshot {
            status,
            status_text: "Animating diffusion steps".into(),
            current_step: step,
            total_steps: frames.len(),
            frames: frames.iter().map(|f| f.to_string()).collect(),
            cache_bust: CacheBust(42),
            prompt: "A red fox".into(),
            pills: vec!["A".into(), "red".into(), "fox".into()],
            ..ViewerSnapshot::default()
        }
    }

    #[test]
    fn painter_shows_the_current_step() {
        let text = painter(&snapshot(Status::Animating, &["a.png", "b.png", "c.png"], 1), "http://h");
        assert!(text.contains("Step 2 / 3  http://h/static/b.png?t=42"));
        assert!(text.contains("Tokens: A | red | fox"));
        assert!(!text.contains("Final image"));
    }

    #[test]
    fn completed_painter_shows_refinement_and_final_image() {
        let text = painter(&snapshot(Status::Complete, &["a.png", "b.png", "c.png"], 2), "http://h");
        assert!(text.contains("Final image: http://h/static/c.png?t=42 (c.png)"));
        assert!(text.contains("step   2  http://h/static/b.png?t=42"));
    }

    #[test]
    fn empty_painter_shows_the_placeholder() {
        let text = painter(&ViewerSnapshot::default(), "http://h");
        assert!(text.contains("No frames yet"));
    }

    #[test]
    fn bar_is_proportional() {
        assert_eq!(bar(0.5).matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(bar(2.0).matches('#').count(), BAR_WIDTH);
    }

    #[test]
    fn empty_inspection_uses_placeholders() {
        let text = inspection(&Inspection::new());
        assert!(text.contains(NO_ATTENTION));
        assert!(text.contains(NO_LOGITS));
    }

    #[test]
    fn forward_strip_drifts_towards_noise() {
        let base = RgbaImage::filled(4, 4, [10, 20, 30, 255]);
        let same = vec![base.clone(), base.clone()];
        let text = forward(&base, &same);
        assert!(text.contains("2 frames of 4x4"));
        assert!(text.contains("drift 0.0"));
        assert_eq!(deviation(&base, &RgbaImage::filled(4, 4, [20, 30, 40, 0])), 10.0);
    }

    #[test]
    fn controls_lists_every_parameter() {
        let text = controls(&ControlParameters::default());
        assert!(text.contains("temperature"));
        assert!(text.contains("top_k"));
        assert!(text.contains("animation_speed"));
    }
}
