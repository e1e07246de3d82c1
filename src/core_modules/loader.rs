// THEORY:
// The `loader` is the entry stage of the comparison pipeline. It turns two paths
// into two decoded images, or into an error that tells the caller exactly which
// input failed and how. Existence is checked before decoding so that "no such
// file" and "file is not a readable image" stay distinguishable.

use crate::error::{ComparisonError, ImageRole, Result};
use image::DynamicImage;
use log::debug;
use std::path::Path;

/// Loads a single image, tagging any failure with the image's role.
pub fn load_image(path: &Path, role: ImageRole) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(ComparisonError::NotFound {
            role,
            path: path.to_path_buf(),
        });
    }

    let image = image::open(path).map_err(|source| ComparisonError::Decode {
        role,
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        "loaded {role} image {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Loads the baseline and current images.
///
/// Both existence checks run before either decode.
pub fn load_pair(baseline: &Path, current: &Path) -> Result<(DynamicImage, DynamicImage)> {
    for (path, role) in [(baseline, ImageRole::Baseline), (current, ImageRole::Current)] {
        if !path.is_file() {
            return Err(ComparisonError::NotFound {
                role,
                path: path.to_path_buf(),
            });
        }
    }

    let baseline = load_image(baseline, ImageRole::Baseline)?;
    let current = load_image(current, ImageRole::Current)?;
    Ok((baseline, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_white(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))
            .save(&path)
            .expect("Error Saving File.");
        path
    }

    #[test]
    fn loads_both_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_white(dir.path(), "a.png");
        let b = write_white(dir.path(), "b.png");

        let (baseline, current) = load_pair(&a, &b).unwrap();
        assert_eq!((baseline.width(), baseline.height()), (8, 8));
        assert_eq!((current.width(), current.height()), (8, 8));
    }

    #[test]
    fn missing_baseline_is_reported_before_current() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let also_missing = dir.path().join("nope2.png");

        let err = load_pair(&missing, &also_missing).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_current_has_its_own_code() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_white(dir.path(), "a.png");

        let err = load_pair(&a, &dir.path().join("nope.png")).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn undecodable_file_is_not_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_white(dir.path(), "a.png");
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"definitely not a png").unwrap();

        let err = load_pair(&a, &broken).unwrap_err();
        assert!(matches!(err, ComparisonError::Decode { role: ImageRole::Current, .. }));
        assert_eq!(err.exit_code(), 6);

        let err = load_pair(&broken, &a).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn directory_is_not_an_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_white(dir.path(), "a.png");

        let err = load_pair(dir.path(), &a).unwrap_err();
        assert!(matches!(err, ComparisonError::NotFound { role: ImageRole::Baseline, .. }));
    }
}
