//! Plain geometric primitives shared by the tree, layout engine, and backend
//! adapter. Pixel values are always integers; layout math happens in `f64`
//! and is rounded once at the boundary (see `layout::arrange`).

/// A point in screen space, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Point {
        Point { x, y }
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Rect {
        Rect { x, y, w, h }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Shrinks the rectangle by `amount` pixels on every side. Never
    /// produces a negative size.
    pub fn shrink(&self, amount: i32) -> Rect {
        let w = (self.w - amount * 2).max(0);
        let h = (self.h - amount * 2).max(0);
        Rect {
            x: self.x + amount,
            y: self.y + amount,
            w,
            h,
        }
    }

    /// Shrinks only from the top, for tab/title strip bands.
    pub fn shrink_top(&self, amount: i32) -> Rect {
        let h = (self.h - amount).max(0);
        Rect {
            x: self.x,
            y: self.y + amount,
            w: self.w,
            h,
        }
    }

    /// The band of `amount` pixels taken off the top by `shrink_top`.
    pub fn top_band(&self, amount: i32) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            w: self.w,
            h: amount.min(self.h),
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.w && p.y >= self.y && p.y < self.y + self.h
    }

    /// Clamps `self` so it lies within `bounds`, preserving size where
    /// possible.
    pub fn clamp_within(&self, bounds: Rect) -> Rect {
        let w = self.w.min(bounds.w);
        let h = self.h.min(bounds.h);
        let x = self.x.clamp(bounds.x, bounds.x + bounds.w - w);
        let y = self.y.clamp(bounds.y, bounds.y + bounds.h - h);
        Rect { x, y, w, h }
    }
}
