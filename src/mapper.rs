//! Coordinate mapping from client-space pointer positions to canvas pixels
//! and quantized grid cells.

use serde::{Deserialize, Serialize};

/// One quantized cell of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: the larger of the two per-axis deltas.
    /// Saturates for cells far off the surface.
    pub fn chebyshev(&self, other: GridCell) -> i32 {
        let (dx, dy) = self.delta_to(other);
        dx.saturating_abs().max(dy.saturating_abs())
    }

    /// Movement vector from `self` to `other`, saturating at the `i32` range.
    pub fn delta_to(&self, other: GridCell) -> (i32, i32) {
        (other.x.saturating_sub(self.x), other.y.saturating_sub(self.y))
    }
}

impl From<(i32, i32)> for GridCell {
    fn from(v: (i32, i32)) -> Self {
        GridCell { x: v.0, y: v.1 }
    }
}

impl From<GridCell> for (i32, i32) {
    fn from(c: GridCell) -> Self {
        (c.x, c.y)
    }
}

/// Fixed-resolution drawing surface: `grid_size` cells per side, `cell_size` px each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub grid_size: i32,
    pub cell_size: u32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            grid_size: 40,
            cell_size: 10,
        }
    }
}

impl GridSpec {
    pub const fn new(grid_size: i32, cell_size: u32) -> Self {
        Self {
            grid_size,
            cell_size,
        }
    }

    /// Intrinsic canvas width in pixels
    pub fn canvas_width(&self) -> f64 {
        self.grid_size as f64 * self.cell_size as f64
    }

    /// Intrinsic canvas height in pixels
    pub fn canvas_height(&self) -> f64 {
        self.canvas_width()
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        (0..self.grid_size).contains(&cell.x) && (0..self.grid_size).contains(&cell.y)
    }

    /// Floor division of canvas pixels by the cell size.
    pub fn cell_at(&self, x: f64, y: f64) -> GridCell {
        let size = self.cell_size.max(1) as f64;
        GridCell::new((x / size).floor() as i32, (y / size).floor() as i32)
    }
}

/// The canvas' displayed box in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Snapshot of where the canvas is displayed and how large it really is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSnapshot {
    pub display: DisplayRect,
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
}

impl LayoutSnapshot {
    pub fn new(display: DisplayRect, grid: &GridSpec) -> Self {
        Self {
            display,
            intrinsic_width: grid.canvas_width(),
            intrinsic_height: grid.canvas_height(),
        }
    }

    /// Layout where the displayed box matches the intrinsic canvas 1:1 at the origin.
    pub fn unscaled(grid: &GridSpec) -> Self {
        Self::new(
            DisplayRect {
                left: 0.0,
                top: 0.0,
                width: grid.canvas_width(),
                height: grid.canvas_height(),
            },
            grid,
        )
    }

    /// Intrinsic-over-displayed ratio per axis. A collapsed display box maps 1:1.
    pub fn scale(&self) -> (f64, f64) {
        let ratio = |intrinsic: f64, displayed: f64| {
            if displayed > 0.0 && displayed.is_finite() {
                intrinsic / displayed
            } else {
                1.0
            }
        };
        (
            ratio(self.intrinsic_width, self.display.width),
            ratio(self.intrinsic_height, self.display.height),
        )
    }
}

/// A sampled pen position. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub grid_x: i32,
    pub grid_y: i32,
    /// Monotonic timestamp in milliseconds
    pub time: u64,
}

impl Point {
    pub fn cell(&self) -> GridCell {
        GridCell::new(self.grid_x, self.grid_y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Map a client-space position to canvas and grid coordinates.
///
/// Positions outside the displayed box produce negative or out-of-range grid
/// cells; callers decide whether to match them (see [`GridSpec::contains`]).
pub fn map_client_point(
    client_x: f64,
    client_y: f64,
    time: u64,
    layout: &LayoutSnapshot,
    grid: &GridSpec,
) -> Point {
    let (scale_x, scale_y) = layout.scale();
    let x = (client_x - layout.display.left) * scale_x;
    let y = (client_y - layout.display.top) * scale_y;
    let cell = grid.cell_at(x, y);

    Point {
        x,
        y,
        grid_x: cell.x,
        grid_y: cell.y,
        time,
    }
}

/// Build a point directly from canvas pixels, bypassing display scaling.
pub fn canvas_point(x: f64, y: f64, time: u64, grid: &GridSpec) -> Point {
    map_client_point(x, y, time, &LayoutSnapshot::unscaled(grid), grid)
}
