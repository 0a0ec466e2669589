//! Preview/record size selection
//!
//! Camera backends report two lists: sizes the preview stream supports and
//! sizes the recorder supports. Recording has to use a size from the video
//! list, and should also be a preview size so the preview does not change
//! geometry when recording starts.

use crate::types::Resolution;
use std::cmp::Ordering;

/// Aspect ratios closer than this count as identical
pub const ASPECT_EXACT: f64 = 0.01;
/// Aspect ratios closer than this are acceptable without letterboxing artefacts
pub const ASPECT_TOLERANCE: f64 = 0.1;
/// Preferred recording area when several sizes fit the surface equally well
pub const PREFERRED_AREA: u64 = 1280 * 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AspectClass {
    Exact,
    Near,
    Off,
}

#[derive(Debug, Clone, Copy)]
struct Score {
    class: AspectClass,
    aspect_delta: f64,
    area_delta: u64,
    preferred_delta: u64,
    width_delta: u32,
}

impl Score {
    fn of(size: Resolution, target: Resolution) -> Self {
        let delta = (size.aspect_ratio() - target.aspect_ratio()).abs();
        let class = if delta <= ASPECT_EXACT {
            AspectClass::Exact
        } else if delta <= ASPECT_TOLERANCE {
            AspectClass::Near
        } else {
            AspectClass::Off
        };
        Self {
            class,
            // within a tolerance class, area matters more than small ratio drift
            aspect_delta: if class == AspectClass::Off { delta } else { 0.0 },
            area_delta: size.area().abs_diff(target.area()),
            preferred_delta: size.area().abs_diff(PREFERRED_AREA),
            width_delta: size.width.abs_diff(target.width),
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        self.class
            .cmp(&other.class)
            .then_with(|| self.aspect_delta.total_cmp(&other.aspect_delta))
            .then_with(|| self.area_delta.cmp(&other.area_delta))
            .then_with(|| self.preferred_delta.cmp(&other.preferred_delta))
            .then_with(|| self.width_delta.cmp(&other.width_delta))
    }
}

/// Pick the recording size for a preview surface of `target_width` x `target_height`.
///
/// An empty `video_sizes` list means the device records at preview sizes.
/// Sizes that appear in both lists are preferred; when the lists share nothing
/// every video size stays eligible. Returns `None` only when both lists are
/// empty.
pub fn select_video_size(
    video_sizes: &[Resolution],
    preview_sizes: &[Resolution],
    target_width: u32,
    target_height: u32,
) -> Option<Resolution> {
    let candidates = if video_sizes.is_empty() {
        preview_sizes
    } else {
        video_sizes
    };

    let shared: Vec<Resolution> = candidates
        .iter()
        .copied()
        .filter(|s| preview_sizes.contains(s))
        .collect();
    let pool: &[Resolution] = if shared.is_empty() {
        candidates
    } else {
        &shared
    };

    let target = Resolution::new(target_width.max(1), target_height.max(1));
    let best = pool
        .iter()
        .copied()
        .min_by(|a, b| Score::of(*a, target).cmp(&Score::of(*b, target)));

    if let Some(size) = best {
        log::debug!(
            "Selected {} for {} surface ({} candidates, {} shared with preview)",
            size,
            target,
            candidates.len(),
            shared.len()
        );
    }
    best
}
