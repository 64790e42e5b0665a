//! Integer points and rectangles for 2-D dispatch.
//!
//! Image-space work (tiles, pixels) is described with a half-open
//! [`Bounds2i`] rectangle: `p_min` is inclusive, `p_max` exclusive.

/// A point on the integer lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point2i {
    pub x: i32,
    pub y: i32,
}

impl Point2i {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A half-open integer rectangle `[p_min, p_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bounds2i {
    pub p_min: Point2i,
    pub p_max: Point2i,
}

impl Bounds2i {
    /// Creates the rectangle spanned by two corners, in any order.
    pub fn new(a: Point2i, b: Point2i) -> Self {
        Self {
            p_min: Point2i::new(a.x.min(b.x), a.y.min(b.y)),
            p_max: Point2i::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> i64 {
        (i64::from(self.p_max.x) - i64::from(self.p_min.x)).max(0)
    }

    /// Height of the rectangle.
    pub fn height(&self) -> i64 {
        (i64::from(self.p_max.y) - i64::from(self.p_min.y)).max(0)
    }

    /// Number of lattice points inside the rectangle.
    ///
    /// Saturates at `i64::MAX` for extents spanning most of the `i32` range.
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// Returns `true` when the rectangle contains no points.
    pub fn is_empty(&self) -> bool {
        self.p_min.x >= self.p_max.x || self.p_min.y >= self.p_max.y
    }

    /// Returns `true` if `p` lies inside the rectangle.
    pub fn contains(&self, p: Point2i) -> bool {
        p.x >= self.p_min.x && p.x < self.p_max.x && p.y >= self.p_min.y && p.y < self.p_max.y
    }

    /// Iterates the points of the rectangle in row-major order.
    pub fn points(&self) -> Points {
        Points {
            bounds: *self,
            next: self.p_min,
        }
    }
}

impl IntoIterator for Bounds2i {
    type Item = Point2i;
    type IntoIter = Points;

    fn into_iter(self) -> Points {
        self.points()
    }
}

/// Row-major iterator over the points of a [`Bounds2i`].
#[derive(Debug, Clone)]
pub struct Points {
    bounds: Bounds2i,
    next: Point2i,
}

impl Iterator for Points {
    type Item = Point2i;

    fn next(&mut self) -> Option<Point2i> {
        if self.bounds.is_empty() || self.next.y >= self.bounds.p_max.y {
            return None;
        }

        let current = self.next;
        self.next.x += 1;
        if self.next.x == self.bounds.p_max.x {
            self.next.x = self.bounds.p_min.x;
            self.next.y += 1;
        }

        Some(current)
    }
}
