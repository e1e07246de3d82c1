// THEORY:
// Every per-pixel stage downstream assumes both images share one pixel grid.
// The `aligner` guarantees that by resampling the current image onto the
// baseline's dimensions. The originals are never touched: the aligned current
// image is a `Cow` that borrows when no work is needed and owns a resized copy
// otherwise, so the caller can still reach the untouched capture.

use crate::error::{ComparisonError, Result};
use image::DynamicImage;
use image::imageops::FilterType;
use log::warn;
use std::borrow::Cow;

/// The two images after alignment. Both report identical dimensions.
#[derive(Debug)]
pub struct AlignedPair<'a> {
    /// The reference image; never resized.
    pub baseline: &'a DynamicImage,
    /// The current image on the baseline's grid. Borrowed when no resize was needed.
    pub current: Cow<'a, DynamicImage>,
    /// The current image exactly as it was loaded.
    pub current_original: &'a DynamicImage,
}

impl AlignedPair<'_> {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.baseline.width(), self.baseline.height())
    }

    /// True when the current image had to be resampled.
    pub fn was_resized(&self) -> bool {
        matches!(self.current, Cow::Owned(_))
    }
}

/// Resizes `current` to the baseline's dimensions if they differ.
///
/// Uses a triangle (linear) filter, which averages over the source footprint
/// when shrinking.
pub fn align_pair<'a>(
    baseline: &'a DynamicImage,
    current: &'a DynamicImage,
) -> Result<AlignedPair<'a>> {
    let (target_w, target_h) = (baseline.width(), baseline.height());
    let (cur_w, cur_h) = (current.width(), current.height());

    if target_w == 0 || target_h == 0 || cur_w == 0 || cur_h == 0 {
        return Err(ComparisonError::Resize {
            message: format!("cannot resize {cur_w}x{cur_h} image to {target_w}x{target_h}"),
        });
    }

    let aligned = if (cur_w, cur_h) == (target_w, target_h) {
        Cow::Borrowed(current)
    } else {
        warn!(
            "images have different dimensions, resizing current from {cur_w}x{cur_h} \
             to {target_w}x{target_h}"
        );
        Cow::Owned(current.resize_exact(target_w, target_h, FilterType::Triangle))
    };

    Ok(AlignedPair {
        baseline,
        current: aligned,
        current_original: current,
    })
}
