//! Geometry primitives and viewport clamping
//!
//! Coordinates are CSS-style pixels with the origin at the top-left of the
//! viewport. The viewport may be unknown before the host's first layout;
//! every clamp then returns its input unchanged.

use serde::{Deserialize, Serialize};

/// Size of a freshly opened window
pub const DEFAULT_WINDOW_SIZE: Size = Size::new(720.0, 440.0);

/// Size of a minimized, header-only window
pub const COMPACT_SIZE: Size = Size::new(280.0, 36.0);

/// Smallest usable window, itself shrunk on tiny viewports
pub const MIN_WINDOW_SIZE: Size = Size::new(320.0, 200.0);

/// Gap kept between a committed window and the viewport edge
pub const VIEWPORT_MARGIN: f64 = 8.0;

/// Height of the band at the bottom of the viewport that arms docking
pub const DOCK_BAND_HEIGHT: f64 = 64.0;

/// Offset between consecutively opened windows
pub const CASCADE_OFFSET: f64 = 32.0;

/// A point in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - other`
    pub fn offset_from(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Translate by `delta`
    pub fn translate(self, delta: Point) -> Point {
        Point::new(self.x + delta.x, self.y + delta.y)
    }
}

/// A width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.size.height
    }

    /// Horizontal midpoint
    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.size.width / 2.0
    }

    /// Whether `point` lies inside; the right and bottom edges are exclusive
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x < self.right()
            && point.y >= self.origin.y
            && point.y < self.bottom()
    }
}

/// Keep a window of `size` at `position` inside the viewport margins
///
/// `x` ends up in `[VIEWPORT_MARGIN, viewport.width - size.width - VIEWPORT_MARGIN]`
/// (likewise `y`). A window larger than the viewport is pinned to the
/// leading margin.
pub fn clamp_position(position: Point, size: Size, viewport: Option<Size>) -> Point {
    let Some(viewport) = viewport else {
        return position;
    };
    Point::new(
        clamp_axis(position.x, size.width, viewport.width),
        clamp_axis(position.y, size.height, viewport.height),
    )
}

fn clamp_axis(value: f64, extent: f64, viewport: f64) -> f64 {
    let max = viewport - extent - VIEWPORT_MARGIN;
    value.min(max).max(VIEWPORT_MARGIN)
}

/// Bound a window size by the viewport and by [`MIN_WINDOW_SIZE`]
///
/// The room available is measured from the window's current `origin`. When
/// that room is smaller than the minimum, the minimum gives way so the
/// window never forces overflow.
pub fn clamp_size(size: Size, origin: Point, viewport: Option<Size>) -> Size {
    let Some(viewport) = viewport else {
        return Size::new(
            size.width.max(MIN_WINDOW_SIZE.width),
            size.height.max(MIN_WINDOW_SIZE.height),
        );
    };
    Size::new(
        clamp_extent(size.width, MIN_WINDOW_SIZE.width, viewport.width - origin.x),
        clamp_extent(size.height, MIN_WINDOW_SIZE.height, viewport.height - origin.y),
    )
}

fn clamp_extent(value: f64, minimum: f64, room: f64) -> f64 {
    let max = (room - VIEWPORT_MARGIN).max(0.0);
    value.min(max).max(minimum.min(max))
}

/// Whether `point` lies in the docking band at the bottom of the viewport
pub fn in_dock_band(point: Point, viewport: Option<Size>) -> bool {
    viewport.map_or(false, |viewport| point.y >= viewport.height - DOCK_BAND_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Option<Size> = Some(Size::new(1280.0, 800.0));

    #[test]
    fn test_clamp_position_property() {
        let size = DEFAULT_WINDOW_SIZE;
        let viewport = VIEWPORT.unwrap();
        for x in (-2000..3000).step_by(97) {
            for y in (-2000..3000).step_by(89) {
                let p = clamp_position(Point::new(x as f64, y as f64), size, VIEWPORT);
                assert!(p.x >= VIEWPORT_MARGIN);
                assert!(p.x <= viewport.width - size.width - VIEWPORT_MARGIN);
                assert!(p.y >= VIEWPORT_MARGIN);
                assert!(p.y <= viewport.height - size.height - VIEWPORT_MARGIN);
            }
        }
    }

    #[test]
    fn test_clamp_position_inside_unchanged() {
        let p = Point::new(100.0, 120.0);
        assert_eq!(clamp_position(p, DEFAULT_WINDOW_SIZE, VIEWPORT), p);
    }

    #[test]
    fn test_unknown_viewport_is_unclamped() {
        let p = Point::new(-500.0, 9000.0);
        assert_eq!(clamp_position(p, DEFAULT_WINDOW_SIZE, None), p);
        assert!(!in_dock_band(p, None));
    }

    #[test]
    fn test_oversized_window_pinned_to_margin() {
        let p = clamp_position(
            Point::new(300.0, 300.0),
            Size::new(2000.0, 2000.0),
            VIEWPORT,
        );
        assert_eq!(p, Point::new(VIEWPORT_MARGIN, VIEWPORT_MARGIN));
    }

    #[test]
    fn test_clamp_size_bounds() {
        let origin = Point::new(100.0, 100.0);
        let big = clamp_size(Size::new(5000.0, 5000.0), origin, VIEWPORT);
        assert_eq!(big, Size::new(1280.0 - 100.0 - 8.0, 800.0 - 100.0 - 8.0));

        let small = clamp_size(Size::new(10.0, 10.0), origin, VIEWPORT);
        assert_eq!(small, MIN_WINDOW_SIZE);
    }

    #[test]
    fn test_minimum_gives_way_on_tiny_viewport() {
        let size = clamp_size(
            Size::new(10.0, 10.0),
            Point::new(8.0, 8.0),
            Some(Size::new(200.0, 150.0)),
        );
        assert_eq!(size, Size::new(184.0, 134.0));
    }

    #[test]
    fn test_dock_band() {
        assert!(in_dock_band(Point::new(10.0, 740.0), VIEWPORT));
        assert!(!in_dock_band(Point::new(10.0, 735.0), VIEWPORT));
    }

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(Point::new(10.0, 10.0), Size::new(100.0, 50.0));
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(rect.contains(Point::new(109.0, 59.0)));
        assert!(!rect.contains(Point::new(110.0, 30.0)));
        assert_eq!(rect.mid_x(), 60.0);
    }
}
