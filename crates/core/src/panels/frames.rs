//! Frame panels: the diffusion viewer, the mid/final comparison and the
//! final canvas.

use crate::generation::{CacheBust, FrameRef};

pub const NO_FRAMES: &str = "No frames yet. Generate an image to start.";

/// `{base}/static/{frame}?t={bust}`. A trailing slash on `base` is ignored.
pub fn static_url(base: &str, frame: &str, bust: CacheBust) -> String {
    format!("{}/static/{}?t={}", base.trim_end_matches('/'), frame, bust)
}

/// Fixed reference positions inside a non-empty frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    pub first: usize,
    pub middle: usize,
    pub last: usize,
}

impl FrameIndex {
    pub fn of(len: usize) -> Option<Self> {
        let last = len.checked_sub(1)?;
        Some(Self {
            first: 0,
            middle: len / 2,
            last,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffusionView {
    Empty { placeholder: &'static str },
    Frame {
        url: String,
        /// `Step 3 / 20`
        label: String,
        step: usize,
        slider_max: usize,
        can_prev: bool,
        can_next: bool,
    },
}

pub fn diffusion_view(
    base: &str,
    frames: &[FrameRef],
    current_step: usize,
    bust: CacheBust,
) -> DiffusionView {
    let Some(idx) = FrameIndex::of(frames.len()) else {
        return DiffusionView::Empty {
            placeholder: NO_FRAMES,
        };
    };
    let step = current_step.min(idx.last);
    DiffusionView::Frame {
        url: static_url(base, &frames[step], bust),
        label: format!("Step {} / {}", step + 1, frames.len()),
        step,
        slider_max: idx.last,
        can_prev: step > 0,
        can_next: step < idx.last,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub mid_step: usize,
    pub mid_url: String,
    pub final_step: usize,
    pub final_url: String,
}

/// Middle step next to the final one.
pub fn refinement_view(base: &str, frames: &[FrameRef], bust: CacheBust) -> Option<Refinement> {
    let idx = FrameIndex::of(frames.len())?;
    Some(Refinement {
        mid_step: idx.middle,
        mid_url: static_url(base, &frames[idx.middle], bust),
        final_step: idx.last,
        final_url: static_url(base, &frames[idx.last], bust),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalCanvas {
    pub url: String,
    pub file_name: String,
}

pub fn final_canvas(base: &str, frames: &[FrameRef], bust: CacheBust) -> Option<FinalCanvas> {
    let last = frames.last()?;
    Some(FinalCanvas {
        url: static_url(base, last, bust),
        file_name: last.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(names: &[&str]) -> Vec<FrameRef> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fixed_references_for_three_frames() {
        let idx = FrameIndex::of(3).expect("non-empty");
        assert_eq!((idx.first, idx.middle, idx.last), (0, 1, 2));
        assert_eq!(FrameIndex::of(0), None);
        assert_eq!(FrameIndex::of(1).map(|i| (i.middle, i.last)), Some((0, 0)));
    }

    #[test]
    fn url_carries_the_cache_bust() {
        assert_eq!(
            static_url("http://localhost:8000/", "step_0.png", CacheBust(42)),
            "http://localhost:8000/static/step_0.png?t=42"
        );
    }

    #[test]
    fn viewer_labels_and_clamps_the_step() {
        let f = frames(&["a", "b", "c"]);
        match diffusion_view("http://h", &f, 9, CacheBust(1)) {
            DiffusionView::Frame {
                url,
                label,
                step,
                slider_max,
                can_prev,
                can_next,
            } => {
                assert_eq!(url, "http://h/static/c?t=1");
                assert_eq!(label, "Step 3 / 3");
                assert_eq!(step, 2);
                assert_eq!(slider_max, 2);
                assert!(can_prev);
                assert!(!can_next);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_frames_render_placeholders() {
        assert_eq!(
            diffusion_view("http://h", &[], 0, CacheBust(1)),
            DiffusionView::Empty {
                placeholder: NO_FRAMES
            }
        );
        assert!(refinement_view("http://h", &[], CacheBust(1)).is_none());
        assert!(final_canvas("http://h", &[], CacheBust(1)).is_none());
    }

    #[test]
    fn refinement_compares_middle_with_final() {
        let f = frames(&["s0", "s1", "s2", "s3"]);
        let r = refinement_view("http://h", &f, CacheBust(5)).expect("frames");
        assert_eq!(r.mid_step, 2);
        assert_eq!(r.final_step, 3);
        assert!(r.final_url.ends_with("/static/s3?t=5"));
        let c = final_canvas("http://h", &f, CacheBust(5)).expect("frames");
        assert_eq!(c.file_name, "s3");
    }
}
