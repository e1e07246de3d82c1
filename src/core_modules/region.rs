// THEORY:
// A `RegionOfInterest` is the spatial summary of one connected cluster of
// changed pixels in the `DifferenceMask`. Instead of reporting thousands of
// individual pixels, the comparison reports a handful of boxes that a person
// can look at on the annotated screenshot.
//
// Key properties:
// 1.  **Bounding Box**: an axis-aligned box in aligned-image pixel coordinates,
//     stored as top-left corner plus width and height, both inclusive of the
//     outermost changed pixels.
// 2.  **Outline**: the outer boundary of the cluster as a compressed chain, only
//     the corner points of each straight run are kept.
// 3.  **Stateless Data Container**: regions are produced once per run by the
//     region detector and never change afterwards.

/// A simple struct to represent a 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl From<imageproc::point::Point<u32>> for Point {
    fn from(p: imageproc::point::Point<u32>) -> Self {
        Point { x: p.x, y: p.y }
    }
}

/// A connected cluster of changed pixels, reduced to its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionOfInterest {
    /// Left edge of the box.
    pub x: u32,
    /// Top edge of the box.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Corner points of the outer boundary, in tracing order.
    pub outline: Vec<Point>,
}

impl RegionOfInterest {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when this box shares at least one pixel with the given box.
    pub fn overlaps(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        self.x < x + width
            && x < self.x + self.width
            && self.y < y + height
            && y < self.y + self.height
    }
}

impl std::fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x={} y={} w={} h={}", self.x, self.y, self.width, self.height)
    }
}
