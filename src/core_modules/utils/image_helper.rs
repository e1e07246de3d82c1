pub mod image_helper {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, GrayImage, ImageEncoder, ImageError, RgbImage};
    use std::path::Path;

    fn save(
        path: &Path,
        width: u32,
        height: u32,
        buffer: &[u8],
        color: ExtendedColorType,
    ) -> Result<(), ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);

        encoder.write_image(buffer, width, height, color)?;

        Ok(())
    }

    /// Writes a single-channel image as an 8-bit grayscale PNG.
    pub fn save_gray_png(path: &Path, image: &GrayImage) -> Result<(), ImageError> {
        save(path, image.width(), image.height(), image.as_raw(), ExtendedColorType::L8)
    }

    /// Writes an RGB image as an 8-bit PNG.
    pub fn save_rgb_png(path: &Path, image: &RgbImage) -> Result<(), ImageError> {
        save(path, image.width(), image.height(), image.as_raw(), ExtendedColorType::Rgb8)
    }
}

#[cfg(test)]
mod tests {

    use super::image_helper::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn save_white_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("white_file.png");
        let image = GrayImage::from_pixel(50, 30, Luma([255]));

        save_gray_png(&path, &image).expect("Error Saving File.");

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded, image);
    }

    #[test]
    fn save_gradient_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient_file.png");
        let mut intensity = 0u8;
        let image = RgbImage::from_fn(64, 16, |_, _| {
            intensity = intensity.wrapping_add(1);
            Rgb([intensity, intensity, 255 - intensity])
        });

        save_rgb_png(&path, &image).expect("Error Saving File.");

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded, image);
    }

    #[test]
    fn save_into_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("x.png");
        let err = save_gray_png(&path, &GrayImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, image::ImageError::IoError(_)));
    }
}
