use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
///
/// The other corners and the center are cached and rebuilt on every
/// mutation, so readers never observe stale derived state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    top_left: Vec2,
    width: f32,
    height: f32,
    top_right: Vec2,
    bottom_left: Vec2,
    bottom_right: Vec2,
    center: Vec2,
}

impl Rect {
    pub fn new(top_left: Vec2, width: f32, height: f32) -> Self {
        let mut rect = Self {
            top_left,
            width,
            height,
            top_right: top_left,
            bottom_left: top_left,
            bottom_right: top_left,
            center: top_left,
        };
        rect.update();
        rect
    }

    pub fn square(top_left: Vec2, size: f32) -> Self {
        Self::new(top_left, size, size)
    }

    pub fn top_left(&self) -> Vec2 {
        self.top_left
    }

    pub fn top_right(&self) -> Vec2 {
        self.top_right
    }

    pub fn bottom_left(&self) -> Vec2 {
        self.bottom_left
    }

    pub fn bottom_right(&self) -> Vec2 {
        self.bottom_right
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_top_left(&mut self, top_left: Vec2) {
        self.top_left = top_left;
        self.update();
    }

    pub fn set_dimensions(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.update();
    }

    fn update(&mut self) {
        let Vec2 { x, y } = self.top_left;
        self.top_right = Vec2::new(x + self.width, y);
        self.bottom_left = Vec2::new(x, y + self.height);
        self.bottom_right = Vec2::new(x + self.width, y + self.height);
        self.center = Vec2::new(x + self.width * 0.5, y + self.height * 0.5);
    }
}

/// Inclusive on every edge.
pub fn point_in_rect(point: Vec2, rect: &Rect) -> bool {
    let top_left = rect.top_left();
    in_between_inclusive(point.x, top_left.x, top_left.x + rect.width())
        && in_between_inclusive(point.y, top_left.y, top_left.y + rect.height())
}

/// Single-corner overlap test: the larger of the two top-left corners must
/// lie inside both rects. Not a separating-axis test.
pub fn rect_intersects(a: &Rect, b: &Rect) -> bool {
    let corner = Vec2::new(
        a.top_left().x.max(b.top_left().x),
        a.top_left().y.max(b.top_left().y),
    );
    point_in_rect(corner, a) && point_in_rect(corner, b)
}

/// Clamps `n` into `[lower, upper]`. An inverted interval is reported and
/// `n` is clamped against `lower` first.
pub fn bound_num(n: f32, lower: f32, upper: f32) -> f32 {
    if lower > upper {
        error!(lower, upper, "bound_num_invalid_interval");
    }
    if n < lower {
        lower
    } else if n > upper {
        upper
    } else {
        n
    }
}

fn in_between_inclusive(value: f32, lower: f32, upper: f32) -> bool {
    lower <= value && value <= upper
}
