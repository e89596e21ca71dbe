//! # Simulated mat
//!
//! The mat is a square with a square island in the middle, both bordered by walls. The corridor
//! between them is split into four sides and four corner squares. Each corner square carries an
//! orange band across the entrance used when travelling clockwise and a blue band across the
//! entrance used when travelling counter-clockwise.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

use eqpt_if::eqpt::MatColor;

use super::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A wall segment.
#[derive(Debug, Clone, Copy)]
pub struct Wall {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
}

/// An axis aligned rectangle of floor.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub color: MatColor,
}

/// Walls and floor markings of the mat.
#[derive(Debug, Clone)]
pub struct Arena {
    walls: Vec<Wall>,
    bands: Vec<Band>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Arena {
    pub fn new(params: &SimParams) -> Self {
        let m = params.mat_size_cm;
        let c = params.corridor_cm;

        let mut walls = square(0.0, m);
        walls.extend(square(c, m - c));

        Self {
            walls,
            bands: bands(m, c, params.band_inset_cm, params.band_width_cm),
        }
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Distance along the ray to the nearest wall, `max_range` on a miss.
    pub fn raycast(&self, origin: Vector2<f64>, heading_deg: f64, max_range: f64) -> f64 {
        let dir = heading_vector(heading_deg);

        self.walls
            .iter()
            .filter_map(|w| intersect(origin, dir, w))
            .fold(max_range, f64::min)
    }

    /// Floor colour under a point.
    pub fn floor_color(&self, point: Vector2<f64>) -> MatColor {
        self.bands
            .iter()
            .find(|b| {
                point.x >= b.x.0 && point.x <= b.x.1 && point.y >= b.y.0 && point.y <= b.y.1
            })
            .map(|b| b.color)
            .unwrap_or(MatColor::White)
    }

    /// Distance from a point to the nearest wall.
    pub fn clearance(&self, point: Vector2<f64>) -> f64 {
        self.walls
            .iter()
            .map(|w| point_segment_distance(point, w))
            .fold(f64::INFINITY, f64::min)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Unit vector of a heading measured clockwise from north.
pub fn heading_vector(heading_deg: f64) -> Vector2<f64> {
    let h = heading_deg.to_radians();
    Vector2::new(h.sin(), h.cos())
}

fn square(lo: f64, hi: f64) -> Vec<Wall> {
    let p = |x, y| Vector2::new(x, y);
    vec![
        Wall { start: p(lo, lo), end: p(hi, lo) },
        Wall { start: p(hi, lo), end: p(hi, hi) },
        Wall { start: p(hi, hi), end: p(lo, hi) },
        Wall { start: p(lo, hi), end: p(lo, lo) },
    ]
}

/// Orange and blue bands for each corner square, `inset` into the square from its entrance.
fn bands(m: f64, c: f64, inset: f64, width: f64) -> Vec<Band> {
    // Near the low edge of the island, and near its high edge
    let low = (c - inset - width, c - inset);
    let high = (m - c + inset, m - c + inset + width);
    let west = (0.0, c);
    let east = (m - c, m);
    let south = (0.0, c);
    let north = (m - c, m);

    let band = |x, y, color| Band { x, y, color };

    vec![
        // South-west
        band(low, south, MatColor::Orange),
        band(west, low, MatColor::Blue),
        // North-west
        band(west, high, MatColor::Orange),
        band(low, north, MatColor::Blue),
        // North-east
        band(high, north, MatColor::Orange),
        band(east, high, MatColor::Blue),
        // South-east
        band(east, low, MatColor::Orange),
        band(high, south, MatColor::Blue),
    ]
}

/// Distance along a unit ray to a segment, if they cross ahead of the origin.
fn intersect(origin: Vector2<f64>, dir: Vector2<f64>, wall: &Wall) -> Option<f64> {
    let seg = wall.end - wall.start;
    let denom = cross(dir, seg);

    if denom.abs() < 1e-9 {
        return None;
    }

    let diff = wall.start - origin;
    let t = cross(diff, seg) / denom;
    let u = cross(diff, dir) / denom;

    if t >= 0.0 && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

fn point_segment_distance(point: Vector2<f64>, wall: &Wall) -> f64 {
    let seg = wall.end - wall.start;
    let len2 = seg.norm_squared();
    if len2 <= 0.0 {
        return (point - wall.start).norm();
    }

    let t = ((point - wall.start).dot(&seg) / len2).clamp(0.0, 1.0);
    (point - (wall.start + seg * t)).norm()
}

fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

#[cfg(test)]
mod test {
    use super::*;

    fn arena() -> Arena {
        Arena::new(&SimParams::default())
    }

    #[test]
    fn test_raycast() {
        let a = arena();
        let p = Vector2::new(150.0, 50.0);

        // Heading west along the bottom corridor: outer wall left, island right
        assert!((a.raycast(p, 270.0, 200.0) - 150.0).abs() < 1e-6);
        assert!((a.raycast(p, 180.0, 200.0) - 50.0).abs() < 1e-6);
        assert!((a.raycast(p, 0.0, 200.0) - 50.0).abs() < 1e-6);

        // Nothing within range
        let q = Vector2::new(50.0, 50.0);
        assert_eq!(a.raycast(q, 0.0, 200.0), 200.0);
    }

    #[test]
    fn test_floor_color() {
        let a = arena();

        assert_eq!(a.floor_color(Vector2::new(150.0, 50.0)), MatColor::White);

        // Entering the south-west square heading west, and the south-east heading east
        assert_eq!(a.floor_color(Vector2::new(93.5, 50.0)), MatColor::Orange);
        assert_eq!(a.floor_color(Vector2::new(206.5, 50.0)), MatColor::Blue);

        // Entering the south-west square heading south
        assert_eq!(a.floor_color(Vector2::new(50.0, 93.5)), MatColor::Blue);
    }

    #[test]
    fn test_clearance() {
        let a = arena();
        assert!((a.clearance(Vector2::new(150.0, 30.0)) - 30.0).abs() < 1e-6);
        assert!((a.clearance(Vector2::new(150.0, 90.0)) - 10.0).abs() < 1e-6);
    }
}
