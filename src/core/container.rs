//! Rectangular container with four walls and an optional opening in the top wall.
//!
//! Screen convention: `+y` points down, so the top wall sits at `min_y` and faces down.

use crate::core::geometry::{Pos2, Vec2};
use crate::core::molecule::{Body, Mass};
use crate::error::{Error, Result};

/// Default lower bound for `min_x`.
pub const DEFAULT_MIN_X_FLOOR: f64 = 0.0;
/// Default narrowest allowed box width.
pub const DEFAULT_MIN_WIDTH: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WallSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl WallSide {
    pub const ALL: [WallSide; 4] = [
        WallSide::Left,
        WallSide::Right,
        WallSide::Top,
        WallSide::Bottom,
    ];

    #[inline]
    fn index(self) -> usize {
        match self {
            WallSide::Left => 0,
            WallSide::Right => 1,
            WallSide::Top => 2,
            WallSide::Bottom => 3,
        }
    }
}

/// One side of the container: an immovable segment with a normal facing into the box.
#[derive(Debug, Clone)]
pub struct Wall {
    pub side: WallSide,
    pub start: Pos2,
    pub end: Pos2,
    pub normal: Vec2,
    pub velocity: Vec2,
}

impl Wall {
    fn new(side: WallSide, start: Pos2, end: Pos2, velocity: Vec2) -> Self {
        let normal = match side {
            WallSide::Left => Vec2::new(1.0, 0.0),
            WallSide::Right => Vec2::new(-1.0, 0.0),
            WallSide::Top => Vec2::new(0.0, 1.0),
            WallSide::Bottom => Vec2::new(0.0, -1.0),
        };
        Self {
            side,
            start,
            end,
            normal,
            velocity,
        }
    }

    /// Signed distance from the wall plane to `p`, positive on the inside.
    #[inline]
    pub fn signed_distance(&self, p: &Pos2) -> f64 {
        (p - self.start).dot(&self.normal)
    }

    /// Whether the projection of `p` onto the wall line falls within the wall's extent.
    pub fn spans(&self, p: &Pos2) -> bool {
        match self.side {
            WallSide::Left | WallSide::Right => {
                p.y >= self.start.y.min(self.end.y) && p.y <= self.start.y.max(self.end.y)
            }
            WallSide::Top | WallSide::Bottom => {
                p.x >= self.start.x.min(self.end.x) && p.x <= self.start.x.max(self.end.x)
            }
        }
    }
}

impl Body for Wall {
    fn position(&self) -> Pos2 {
        nalgebra::center(&self.start, &self.end)
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_velocity(&mut self, v: Vec2) {
        self.velocity = v;
    }

    fn mass(&self) -> Mass {
        Mass::Infinite
    }
}

/// The box the molecules live in.
#[derive(Debug, Clone)]
pub struct Container {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    min_x_floor: f64,
    min_width: f64,
    left_wall_vx: f64,
    opening: Option<(f64, f64)>,
    walls: [Wall; 4],
}

impl Container {
    /// Box spanned by two opposite corners, with the default `min_x` clamp.
    pub fn new(corner1: Pos2, corner2: Pos2) -> Result<Self> {
        Self::with_limits(corner1, corner2, DEFAULT_MIN_X_FLOOR, DEFAULT_MIN_WIDTH)
    }

    /// Box with an explicit `min_x` floor and minimum width.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if the corners are non-finite or the clamped box is degenerate.
    pub fn with_limits(
        corner1: Pos2,
        corner2: Pos2,
        min_x_floor: f64,
        min_width: f64,
    ) -> Result<Self> {
        if !min_x_floor.is_finite() || !min_width.is_finite() || min_width < 0.0 {
            return Err(Error::InvalidParam(
                "min_x_floor must be finite and min_width finite and >= 0".into(),
            ));
        }
        let placeholder = Wall::new(WallSide::Left, Pos2::origin(), Pos2::origin(), Vec2::zeros());
        let mut c = Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
            min_x_floor,
            min_width,
            left_wall_vx: 0.0,
            opening: None,
            walls: [
                placeholder.clone(),
                placeholder.clone(),
                placeholder.clone(),
                placeholder,
            ],
        };
        if !c.set_corners(corner1, corner2) {
            return Err(Error::InvalidParam(format!(
                "corners ({}, {}) and ({}, {}) do not span a valid box",
                corner1.x, corner1.y, corner2.x, corner2.y
            )));
        }
        Ok(c)
    }

    /// Move the box. Returns `false` (and leaves the box unchanged) for non-finite or
    /// degenerate bounds. `min_x` is clamped to `[min_x_floor, max_x - min_width]`.
    pub fn set_bounds(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        self.set_corners(Pos2::new(min_x, min_y), Pos2::new(max_x, max_y))
    }

    fn set_corners(&mut self, c1: Pos2, c2: Pos2) -> bool {
        if !c1.iter().chain(c2.iter()).all(|v| v.is_finite()) {
            return false;
        }
        let max_x = c1.x.max(c2.x);
        let max_y = c1.y.max(c2.y);
        let min_y = c1.y.min(c2.y);
        let min_x = c1.x.min(c2.x).min(max_x - self.min_width).max(self.min_x_floor);
        if min_x >= max_x || min_y >= max_y {
            return false;
        }
        self.min_x = min_x;
        self.min_y = min_y;
        self.max_x = max_x;
        self.max_y = max_y;
        self.rebuild_walls();
        true
    }

    fn rebuild_walls(&mut self) {
        let (x0, y0, x1, y1) = (self.min_x, self.min_y, self.max_x, self.max_y);
        let left_v = Vec2::new(self.left_wall_vx, 0.0);
        self.walls = [
            Wall::new(WallSide::Left, Pos2::new(x0, y0), Pos2::new(x0, y1), left_v),
            Wall::new(WallSide::Right, Pos2::new(x1, y0), Pos2::new(x1, y1), Vec2::zeros()),
            Wall::new(WallSide::Top, Pos2::new(x0, y0), Pos2::new(x1, y0), Vec2::zeros()),
            Wall::new(WallSide::Bottom, Pos2::new(x0, y1), Pos2::new(x1, y1), Vec2::zeros()),
        ];
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn walls(&self) -> &[Wall; 4] {
        &self.walls
    }

    pub fn wall(&self, side: WallSide) -> &Wall {
        &self.walls[side.index()]
    }

    /// Horizontal speed of the left wall (a piston). Returns `false` for a non-finite value.
    pub fn set_left_wall_velocity(&mut self, vx: f64) -> bool {
        if !vx.is_finite() {
            return false;
        }
        self.left_wall_vx = vx;
        self.walls[WallSide::Left.index()].velocity = Vec2::new(vx, 0.0);
        true
    }

    pub fn left_wall_velocity(&self) -> f64 {
        self.left_wall_vx
    }

    /// Move the left wall by its velocity. The usual `min_x` clamp applies; a wall that hits
    /// the clamp stops.
    pub fn advance(&mut self, dt: f64) {
        if self.left_wall_vx == 0.0 {
            return;
        }
        let target = self.min_x + self.left_wall_vx * dt;
        let (min_y, max_x, max_y) = (self.min_y, self.max_x, self.max_y);
        if self.set_bounds(target, min_y, max_x, max_y) && self.min_x != target {
            self.set_left_wall_velocity(0.0);
        }
    }

    /// Set the x-interval of the opening in the top wall, or close it with `None`.
    /// Returns `false` for an empty, inverted or out-of-box interval.
    pub fn set_opening(&mut self, opening: Option<(f64, f64)>) -> bool {
        match opening {
            None => {
                self.opening = None;
                true
            }
            Some((lo, hi)) => {
                if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                    return false;
                }
                if lo < self.min_x || hi > self.max_x {
                    return false;
                }
                self.opening = Some((lo, hi));
                true
            }
        }
    }

    pub fn opening(&self) -> Option<(f64, f64)> {
        self.opening
    }

    /// A sphere is in the opening when its center lies within the opening's x-interval and
    /// its top edge has reached the top wall.
    pub fn is_in_opening(&self, p: &Pos2, radius: f64) -> bool {
        match self.opening {
            Some((lo, hi)) => p.x >= lo && p.x <= hi && p.y - radius <= self.min_y,
            None => false,
        }
    }

    /// Whether any part of the sphere lies outside the box.
    pub fn is_outside(&self, p: &Pos2, radius: f64) -> bool {
        let inside = p.x - radius >= self.min_x
            && p.x + radius <= self.max_x
            && p.y - radius >= self.min_y
            && p.y + radius <= self.max_y;
        !inside
    }

    /// Whether the point lies within the box (boundary included).
    pub fn contains(&self, p: &Pos2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Whether `p` lies beyond the box grown by `offset` on every side.
    pub fn is_beyond(&self, p: &Pos2, offset: f64) -> bool {
        p.x < self.min_x - offset
            || p.x > self.max_x + offset
            || p.y < self.min_y - offset
            || p.y > self.max_y + offset
    }

    /// Wall whose plane is nearest to `p` (most negative signed distance when outside).
    pub fn nearest_wall(&self, p: &Pos2) -> &Wall {
        let mut best = &self.walls[0];
        let mut best_d = best.signed_distance(p);
        for w in &self.walls[1..] {
            let d = w.signed_distance(p);
            if d < best_d {
                best = w;
                best_d = d;
            }
        }
        best
    }
}
