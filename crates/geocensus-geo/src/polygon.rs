//! Planar polygons with holes.

use serde::{Deserialize, Serialize};

use crate::error::{GeoError, Result};

pub type Point = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Rings may be open or closed; the closing point is implied.
    pub fn new(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Result<Self> {
        check_ring(&exterior)?;
        for h in &holes {
            check_ring(h)?;
        }
        Ok(Self { exterior, holes })
    }

    /// Axis-aligned rectangle.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self> {
        Self::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]], Vec::new())
    }

    pub fn exterior(&self) -> &[Point] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    /// Planar area: exterior minus holes, independent of winding order.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| ring_area(h)).sum();
        (ring_area(&self.exterior) - holes).max(0.0)
    }
}

fn check_ring(ring: &[Point]) -> Result<()> {
    if ring.iter().flatten().any(|c| !c.is_finite()) {
        return Err(GeoError::NonFiniteCoordinate);
    }
    let distinct = match (ring.first(), ring.last()) {
        (Some(a), Some(b)) if ring.len() > 1 && a == b => ring.len() - 1,
        _ => ring.len(),
    };
    if distinct < 3 {
        return Err(GeoError::DegenerateRing(distinct));
    }
    Ok(())
}

/// Absolute shoelace area of one ring.
fn ring_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    let mut twice = 0.0;
    for i in 0..n {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % n];
        twice += x0 * y1 - x1 * y0;
    }
    (twice / 2.0).abs()
}
