// THEORY:
// The `region_detector` is the spatial grouping step of the comparison. It takes
// the binary `DifferenceMask` and finds the spatially coherent clusters of change.
//
// Algorithm steps:
// 1.  **Border Following**: the outer borders of every foreground component are
//     traced. Only top-level outer borders are kept; holes, and components that
//     sit inside a hole of another component, are skipped.
// 2.  **Chain Compression**: each traced border is reduced to the points where
//     its direction changes.
// 3.  **Data Aggregation**: the border points are folded into a bounding box.
// 4.  **Stateless Utility**: the detector keeps no state. Regions are returned in
//     discovery order (raster-scan order of each border's first pixel), which is
//     not a spatial sort.
//
// It also owns the annotated visualisation: a copy of the aligned current image
// with one hollow rectangle per region.

use crate::core_modules::difference_mask::DifferenceMask;
use crate::core_modules::region::{Point, RegionOfInterest};
use image::{Rgb, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Outline color of the annotation boxes.
pub const ANNOTATION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Outline thickness of the annotation boxes, in pixels.
pub const ANNOTATION_THICKNESS: u32 = 2;

pub mod region_detector {
    use super::*;

    /// Finds every top-level cluster of changed pixels and reduces it to a region.
    pub fn find_regions(mask: &DifferenceMask) -> Vec<RegionOfInterest> {
        find_contours::<u32>(mask.as_image())
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter(|contour| !contour.points.is_empty())
            .map(|contour| {
                let points: Vec<Point> = contour.points.into_iter().map(Point::from).collect();
                region_from_border(&points)
            })
            .collect()
    }

    /// Folds a traced border into its bounding box and compressed outline.
    fn region_from_border(points: &[Point]) -> RegionOfInterest {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;

        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        RegionOfInterest {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
            outline: compress_chain(points),
        }
    }

    /// Drops every point that continues its predecessor's direction.
    /// The chain is closed: the last point leads back to the first.
    pub fn compress_chain(points: &[Point]) -> Vec<Point> {
        let n = points.len();
        if n < 3 {
            return points.to_vec();
        }

        let step = |a: &Point, b: &Point| (b.x as i64 - a.x as i64, b.y as i64 - a.y as i64);
        (0..n)
            .filter(|&i| {
                let prev = &points[(i + n - 1) % n];
                let next = &points[(i + 1) % n];
                step(prev, &points[i]) != step(&points[i], next)
            })
            .map(|i| points[i])
            .collect()
    }

    /// Draws every region onto a copy of `image` as a hollow rectangle.
    pub fn annotate_regions(image: &RgbImage, regions: &[RegionOfInterest]) -> RgbImage {
        let mut annotated = image.clone();
        for region in regions {
            for inset in 0..ANNOTATION_THICKNESS {
                let x = region.x as i32 - inset as i32;
                let y = region.y as i32 - inset as i32;
                let rect =
                    Rect::at(x, y).of_size(region.width + 2 * inset, region.height + 2 * inset);
                draw_hollow_rect_mut(&mut annotated, rect, ANNOTATION_COLOR);
            }
        }
        annotated
    }
}
