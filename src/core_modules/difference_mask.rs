// THEORY:
// A `DifferenceMask` is the single hand-off point between the differencing
// strategies and everything downstream (region extraction, visual match
// percentage, the black-and-white diff image). It is a binary, single-channel
// grid on the aligned pixel grid: 255 marks a changed pixel, 0 an unchanged one.
// Once built it is never mutated; consumers only read it.

use image::{GrayImage, Luma};

/// Intensity used for a changed pixel in the mask.
pub const CHANGED: u8 = 255;
/// Intensity used for an unchanged pixel in the mask.
pub const UNCHANGED: u8 = 0;

/// A binary map of changed pixels, same size as the aligned images.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceMask {
    mask: GrayImage,
}

impl DifferenceMask {
    /// Wraps a grayscale image, treating any non-zero pixel as changed.
    pub fn from_binary(image: GrayImage) -> Self {
        let mut mask = image;
        for pixel in mask.pixels_mut() {
            pixel.0[0] = if pixel.0[0] == UNCHANGED { UNCHANGED } else { CHANGED };
        }
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] == CHANGED
    }

    pub fn total_pixels(&self) -> u64 {
        self.mask.width() as u64 * self.mask.height() as u64
    }

    pub fn changed_pixels(&self) -> u64 {
        self.mask.pixels().filter(|p| p.0[0] == CHANGED).count() as u64
    }

    /// `(total - changed) / total * 100`. An empty mask counts as a full match.
    pub fn visual_match_percentage(&self) -> f64 {
        let total = self.total_pixels();
        if total == 0 {
            return 100.0;
        }
        let changed = self.changed_pixels();
        (total - changed) as f64 / total as f64 * 100.0
    }

    /// The raw mask (changed = 255 on 0).
    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    /// The black-and-white diff rendering: changed pixels black on white.
    pub fn to_bw_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            if self.is_changed(x, y) { Luma([0]) } else { Luma([255]) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_square(size: u32, x0: u32, y0: u32, side: u32) -> DifferenceMask {
        let image = GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 17 } else { 0 }])
        });
        DifferenceMask::from_binary(image)
    }

    #[test]
    fn nonzero_input_is_normalised_to_changed() {
        let mask = mask_with_square(10, 2, 2, 3);
        assert!(mask.is_changed(2, 2));
        assert_eq!(mask.as_image().get_pixel(3, 3).0[0], CHANGED);
        assert!(!mask.is_changed(0, 0));
    }

    #[test]
    fn counts_and_match_percentage() {
        let mask = mask_with_square(100, 40, 40, 10);
        assert_eq!(mask.total_pixels(), 10_000);
        assert_eq!(mask.changed_pixels(), 100);
        assert!((mask.visual_match_percentage() - 99.0).abs() < 1e-9);
    }

    #[test]
    fn bw_rendering_is_black_on_white() {
        let mask = mask_with_square(6, 1, 1, 2);
        let bw = mask.to_bw_image();
        assert_eq!(bw.get_pixel(1, 1).0[0], 0);
        assert_eq!(bw.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn empty_mask_is_a_full_match() {
        let mask = DifferenceMask::from_binary(GrayImage::new(0, 0));
        assert_eq!(mask.visual_match_percentage(), 100.0);
    }
}
