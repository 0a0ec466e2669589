//! Property-based tests for recording size selection
//!
//! Run with: cargo test --test resolution_props

use clipcam::{select_video_size, Resolution};
use proptest::prelude::*;

fn size() -> impl Strategy<Value = Resolution> {
    (16u32..4096, 16u32..4096).prop_map(|(w, h)| Resolution::new(w, h))
}

fn sizes(max: usize) -> impl Strategy<Value = Vec<Resolution>> {
    prop::collection::vec(size(), 1..max)
}

fn ratio(w: u32, h: u32) -> f64 {
    w.max(h) as f64 / w.min(h) as f64
}

proptest! {
    /// The pick always comes from the supported video sizes
    #[test]
    fn selection_is_a_video_size(
        video in sizes(12),
        preview in sizes(12),
        target in size(),
    ) {
        let selected = select_video_size(&video, &preview, target.width, target.height);
        prop_assert!(selected.is_some());
        prop_assert!(video.contains(&selected.unwrap()));
    }

    /// Video sizes shared with the preview win over ones the preview lacks
    #[test]
    fn selection_prefers_preview_intersection(
        video in sizes(12),
        extra in sizes(6),
        target in size(),
    ) {
        let shared = video[0];
        let mut preview = extra;
        preview.push(shared);
        let selected = select_video_size(&video, &preview, target.width, target.height).unwrap();
        prop_assert!(preview.contains(&selected));
    }

    /// An exact aspect match beats every size off the target ratio
    #[test]
    fn exact_aspect_is_preferred(
        others in sizes(10),
        (base_w, base_h) in (8u32..240, 8u32..240),
        scale in 1u32..8,
        target_scale in 1u32..8,
    ) {
        let exact = Resolution::new(base_w * scale, base_h * scale);
        let mut video = others;
        video.push(exact);
        let preview = video.clone();

        let target = (base_w * target_scale, base_h * target_scale);
        let selected = select_video_size(&video, &preview, target.0, target.1).unwrap();
        let delta = (ratio(selected.width, selected.height) - ratio(target.0, target.1)).abs();
        prop_assert!(delta <= 0.01, "picked {} for target {}x{}", selected, target.0, target.1);
    }

    /// With no video sizes the preview sizes are the candidates
    #[test]
    fn empty_video_list_uses_preview(
        preview in sizes(12),
        target in size(),
    ) {
        let selected = select_video_size(&[], &preview, target.width, target.height);
        prop_assert!(preview.contains(&selected.unwrap()));
    }
}

#[test]
fn both_lists_empty_selects_nothing() {
    assert_eq!(select_video_size(&[], &[], 1280, 720), None);
}
