use nalgebra as na;

/// Video timestamp in ticks of the stream's time base.
pub type Timestamp = i64;

pub type Vector2i = na::Vector2<i32>;
pub type Vector2d = na::Vector2<f64>;

pub type Matrixd = na::DMatrix<f64>;

/// Axis-aligned integer rectangle, `(x, y)` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size whose top-left is `center - size / 2`.
    pub fn centered(center: Vector2i, width: i32, height: i32) -> Rect {
        Rect::new(center.x - width / 2, center.y - height / 2, width, height)
    }

    pub fn location(&self) -> Vector2i {
        Vector2i::new(self.x, self.y)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Half-open containment test.
    pub fn contains(&self, p: Vector2i) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = i32::max(self.x, other.x);
        let y = i32::max(self.y, other.y);
        let right = i32::min(self.right(), other.right());
        let bottom = i32::min(self.bottom(), other.bottom());
        let r = Rect::new(x, y, right - x, bottom - y);
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }
}
