// THEORY:
// The `differencer` turns two aligned grayscale images into a `DifferenceMask`.
// Two interchangeable strategies sit behind the `MaskStrategy` trait:
//
// 1.  **Absolute difference**: per-pixel |a - b|, binarised at a fixed intensity
//     and dilated with a square kernel so that nearby changes merge into blobs.
//     Cheap, and deliberately sensitive to any pixel shift.
// 2.  **Structural similarity**: a windowed SSIM map scaled to 0..255 and
//     binarised with an inverted rule (low similarity = changed), then lightly
//     dilated. Tolerant of pixel noise.
//
// The scalar SSIM score is computed once per run by `structural_similarity` and
// handed to the strategy, so the structural strategy never recomputes it.

use crate::core_modules::difference_mask::{CHANGED, DifferenceMask, UNCHANGED};
use crate::error::{ComparisonError, Result};
use image::{GrayImage, Luma};
use image_compare::Algorithm;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

/// The scalar SSIM score plus its per-pixel map on a 0..255 scale.
#[derive(Debug, Clone)]
pub struct SimilarityMap {
    /// Mean structural similarity of the two images; 1.0 for identical input.
    pub score: f64,
    /// Per-pixel similarity, clamped to [0, 1] and scaled to 0..255.
    pub map: GrayImage,
}

/// Computes the structural similarity of two equally sized grayscale images.
pub fn structural_similarity(baseline: &GrayImage, current: &GrayImage) -> Result<SimilarityMap> {
    if baseline.dimensions() != current.dimensions() {
        return Err(ComparisonError::difference(format!(
            "dimension mismatch: {:?} vs {:?}",
            baseline.dimensions(),
            current.dimensions()
        )));
    }

    let similarity =
        image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, baseline, current)
            .map_err(|e| ComparisonError::difference(format!("SSIM calculation failed: {e:?}")))?;

    // The gray color map clamps each value to [0, 1] and scales it to 0..255.
    let map = similarity.image.to_color_map().to_luma8();
    if map.dimensions() != baseline.dimensions() {
        return Err(ComparisonError::difference(format!(
            "SSIM map is {:?}, expected {:?}",
            map.dimensions(),
            baseline.dimensions()
        )));
    }

    Ok(SimilarityMap {
        score: similarity.score,
        map,
    })
}

/// Grows changed regions with a `kernel_size` x `kernel_size` square, `iterations` times.
pub fn dilate_square(mask: &GrayImage, kernel_size: u8, iterations: u32) -> GrayImage {
    let radius = kernel_size / 2;
    let mut grown = mask.clone();
    if radius == 0 {
        return grown;
    }
    for _ in 0..iterations {
        grown = dilate(&grown, Norm::LInf, radius);
    }
    grown
}

/// A way of reducing two aligned grayscale images to a binary change mask.
pub trait MaskStrategy {
    fn name(&self) -> &'static str;

    fn compute_mask(&self, baseline: &GrayImage, current: &GrayImage) -> Result<DifferenceMask>;

    /// Same as `compute_mask`, for callers that already hold the run's SSIM map.
    fn compute_mask_with(
        &self,
        baseline: &GrayImage,
        current: &GrayImage,
        _similarity: &SimilarityMap,
    ) -> Result<DifferenceMask> {
        self.compute_mask(baseline, current)
    }
}

/// Grayscale absolute difference, fixed threshold, square dilation.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteDifference {
    /// Pixels whose difference is at or above this value are changed.
    pub threshold: u8,
    /// Side of the square structuring element; odd.
    pub kernel_size: u8,
    pub iterations: u32,
}

impl Default for AbsoluteDifference {
    fn default() -> Self {
        Self {
            threshold: 30,
            kernel_size: 5,
            iterations: 2,
        }
    }
}

impl MaskStrategy for AbsoluteDifference {
    fn name(&self) -> &'static str {
        "absolute difference"
    }

    fn compute_mask(&self, baseline: &GrayImage, current: &GrayImage) -> Result<DifferenceMask> {
        if baseline.dimensions() != current.dimensions() {
            return Err(ComparisonError::difference(format!(
                "dimension mismatch: {:?} vs {:?}",
                baseline.dimensions(),
                current.dimensions()
            )));
        }

        let thresholded = GrayImage::from_fn(baseline.width(), baseline.height(), |x, y| {
            let a = baseline.get_pixel(x, y).0[0];
            let b = current.get_pixel(x, y).0[0];
            Luma([if a.abs_diff(b) >= self.threshold { CHANGED } else { UNCHANGED }])
        });

        Ok(DifferenceMask::from_binary(dilate_square(
            &thresholded,
            self.kernel_size,
            self.iterations,
        )))
    }
}

/// SSIM map, inverted threshold, light square dilation.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralSimilarity {
    /// Map values at or below this (0..255) are changed.
    pub threshold: u8,
    pub kernel_size: u8,
    pub iterations: u32,
}

impl Default for StructuralSimilarity {
    fn default() -> Self {
        Self {
            threshold: 200,
            kernel_size: 3,
            iterations: 1,
        }
    }
}

impl StructuralSimilarity {
    pub fn mask_from_map(&self, similarity: &SimilarityMap) -> DifferenceMask {
        let map = &similarity.map;
        let inverted = GrayImage::from_fn(map.width(), map.height(), |x, y| {
            Luma([if map.get_pixel(x, y).0[0] > self.threshold { UNCHANGED } else { CHANGED }])
        });
        DifferenceMask::from_binary(dilate_square(&inverted, self.kernel_size, self.iterations))
    }
}

impl MaskStrategy for StructuralSimilarity {
    fn name(&self) -> &'static str {
        "structural similarity"
    }

    fn compute_mask(&self, baseline: &GrayImage, current: &GrayImage) -> Result<DifferenceMask> {
        let similarity = structural_similarity(baseline, current)?;
        Ok(self.mask_from_map(&similarity))
    }

    fn compute_mask_with(
        &self,
        _baseline: &GrayImage,
        _current: &GrayImage,
        similarity: &SimilarityMap,
    ) -> Result<DifferenceMask> {
        Ok(self.mask_from_map(similarity))
    }
}

/// Which strategy produces the run's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffStrategy {
    Absolute,
    #[default]
    Structural,
}

impl std::fmt::Display for DiffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffStrategy::Absolute => write!(f, "absolute"),
            DiffStrategy::Structural => write!(f, "structural"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_with_black_square(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 0 } else { 255 }])
        })
    }

    #[test]
    fn identical_images_have_maximal_similarity_and_no_changes() {
        let a = white_with_black_square(64, 10, 10, 8);
        let similarity = structural_similarity(&a, &a).unwrap();
        assert!((similarity.score - 1.0).abs() < 1e-6);

        let structural = StructuralSimilarity::default();
        assert_eq!(structural.compute_mask(&a, &a).unwrap().changed_pixels(), 0);
        assert_eq!(AbsoluteDifference::default().compute_mask(&a, &a).unwrap().changed_pixels(), 0);
    }

    #[test]
    fn similarity_map_is_on_the_input_grid() {
        let a = white_with_black_square(40, 5, 5, 6);
        let similarity = structural_similarity(&a, &a).unwrap();
        assert_eq!(similarity.map.dimensions(), (40, 40));
        assert!(similarity.map.pixels().all(|p| p.0[0] >= 254));

        let b = GrayImage::from_pixel(40, 40, Luma([255]));
        let changed = structural_similarity(&b, &a).unwrap();
        assert!(changed.map.get_pixel(7, 7).0[0] <= 200);
        assert!(changed.map.get_pixel(35, 35).0[0] >= 254);
    }

    #[test]
    fn absolute_difference_without_dilation_marks_exactly_the_square() {
        let a = GrayImage::from_pixel(100, 100, Luma([255]));
        let b = white_with_black_square(100, 40, 40, 10);
        let strategy = AbsoluteDifference {
            kernel_size: 1,
            ..AbsoluteDifference::default()
        };
        let mask = strategy.compute_mask(&a, &b).unwrap();
        assert_eq!(mask.changed_pixels(), 100);
        assert!(mask.is_changed(40, 40));
        assert!(!mask.is_changed(39, 40));
    }

    #[test]
    fn absolute_difference_dilation_grows_the_blob() {
        let a = GrayImage::from_pixel(100, 100, Luma([255]));
        let b = white_with_black_square(100, 40, 40, 10);
        let mask = AbsoluteDifference::default().compute_mask(&a, &b).unwrap();
        // 5x5 kernel twice grows each side by 4 pixels.
        assert_eq!(mask.changed_pixels(), 18 * 18);
        assert!(mask.is_changed(36, 36));
        assert!(!mask.is_changed(35, 36));
    }

    #[test]
    fn absolute_threshold_is_inclusive() {
        let a = GrayImage::from_pixel(4, 4, Luma([100]));
        let b = GrayImage::from_pixel(4, 4, Luma([130]));
        let c = GrayImage::from_pixel(4, 4, Luma([129]));
        let strategy = AbsoluteDifference {
            kernel_size: 1,
            ..AbsoluteDifference::default()
        };
        assert_eq!(strategy.compute_mask(&a, &b).unwrap().changed_pixels(), 16);
        assert_eq!(strategy.compute_mask(&a, &c).unwrap().changed_pixels(), 0);
    }

    #[test]
    fn structural_mask_covers_the_changed_square() {
        let a = GrayImage::from_pixel(100, 100, Luma([255]));
        let b = white_with_black_square(100, 40, 40, 10);
        let similarity = structural_similarity(&a, &b).unwrap();
        assert!(similarity.score < 1.0);

        let mask = StructuralSimilarity::default().mask_from_map(&similarity);
        assert!(mask.is_changed(45, 45));
        assert!(!mask.is_changed(5, 5));
        assert!(mask.changed_pixels() >= 100);
    }

    #[test]
    fn precomputed_map_gives_the_same_mask() {
        let a = GrayImage::from_pixel(48, 48, Luma([255]));
        let b = white_with_black_square(48, 20, 20, 6);
        let similarity = structural_similarity(&a, &b).unwrap();
        let strategy = StructuralSimilarity::default();
        assert_eq!(
            strategy.compute_mask(&a, &b).unwrap(),
            strategy.compute_mask_with(&a, &b, &similarity).unwrap()
        );
    }

    #[test]
    fn mismatched_dimensions_are_a_difference_error() {
        let a = GrayImage::new(10, 10);
        let b = GrayImage::new(11, 10);
        assert_eq!(structural_similarity(&a, &b).unwrap_err().exit_code(), 8);
        assert_eq!(
            AbsoluteDifference::default().compute_mask(&a, &b).unwrap_err().exit_code(),
            8
        );
    }

    #[test]
    fn kernel_of_one_leaves_mask_untouched() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, Luma([CHANGED]));
        assert_eq!(dilate_square(&mask, 1, 3), mask);
        let grown = dilate_square(&mask, 3, 1);
        assert_eq!(grown.pixels().filter(|p| p.0[0] == CHANGED).count(), 9);
    }
}
