//! Seed point generation.
//!
//! Hosts use these helpers to answer the engine's request for reset
//! positions: either a regular grid scan or uniform rejection sampling over
//! a rectangle, optionally restricted to a mask [`Shape`].

use glam::Vec2;
use rand::Rng;

/// Grid cells scanned per requested point before giving up on a sparse mask.
const GRID_CELLS_PER_POINT: usize = 256;

/// Rejection-sampling attempts allowed per requested point.
const RANDOM_ATTEMPTS_PER_POINT: usize = 1000;

/// A closed region that can answer point containment.
pub trait Shape {
    fn contains(&self, point: Vec2) -> bool;
}

/// Axis-aligned rectangle with a half-open interior, `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// Rectangle covering an image of `width × height` pixels.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn min(&self) -> Vec2 {
        self.origin
    }

    pub fn max(&self) -> Vec2 {
        self.origin + self.size
    }

    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Whether both sides are positive. A rect with two negative sides has
    /// positive area but no interior.
    pub fn is_empty(&self) -> bool {
        !(self.size.x > 0.0 && self.size.y > 0.0)
    }

    fn admits(&self, mask: Option<&dyn Shape>, point: Vec2) -> bool {
        self.contains(point) && mask.map_or(true, |m| m.contains(point))
    }

    /// `count` points on a regular grid inside the rectangle and mask.
    ///
    /// The first pass uses a spacing that would place about `count` points
    /// over the whole rectangle; when the mask rejects too many, later
    /// passes halve the spacing. A pass that admits more than `count`
    /// points is subsampled evenly. If refinement runs out before `count`
    /// is reached, the densest pass found is repeated to fill the request.
    /// Returns an empty vector for a zero count, a degenerate rectangle, or
    /// a mask that admits no grid point.
    pub fn generate_points_inside(&self, mask: Option<&dyn Shape>, count: usize) -> Vec<Vec2> {
        if count == 0 || self.is_empty() {
            return Vec::new();
        }

        let cell_budget = count.saturating_mul(GRID_CELLS_PER_POINT);
        let mut spacing = (self.area() / count as f32).sqrt();
        let mut best = Vec::new();

        loop {
            let half = spacing * 0.5;
            let cols = ((self.size.x - half) / spacing).ceil().max(0.0) as usize;
            let rows = ((self.size.y - half) / spacing).ceil().max(0.0) as usize;
            if cols.saturating_mul(rows) > cell_budget {
                break;
            }

            let mut candidates = Vec::new();
            for row in 0..rows {
                for col in 0..cols {
                    let point = self.origin
                        + Vec2::new(half + col as f32 * spacing, half + row as f32 * spacing);
                    if self.admits(mask, point) {
                        candidates.push(point);
                    }
                }
            }

            if candidates.len() >= count {
                let found = candidates.len();
                return (0..count).map(|i| candidates[i * found / count]).collect();
            }
            if candidates.len() > best.len() {
                best = candidates;
            }
            spacing *= 0.5;
        }

        fill_by_repeating(best, count)
    }

    /// `count` uniformly random points inside the rectangle and mask.
    pub fn generate_random_points_inside<R: Rng>(
        &self,
        mask: Option<&dyn Shape>,
        count: usize,
        rng: &mut R,
    ) -> Vec<Vec2> {
        if count == 0 || self.is_empty() {
            return Vec::new();
        }

        let (min, max) = (self.min(), self.max());
        let mut points = Vec::with_capacity(count);
        let mut attempts = count.saturating_mul(RANDOM_ATTEMPTS_PER_POINT);

        while points.len() < count && attempts > 0 {
            attempts -= 1;
            let point = Vec2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
            if self.admits(mask, point) {
                points.push(point);
            }
        }

        fill_by_repeating(points, count)
    }
}

impl Shape for Rect {
    fn contains(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.x < max.x && point.y >= min.y && point.y < max.y
    }
}

/// Disc mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Shape for Circle {
    fn contains(&self, point: Vec2) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }
}

/// Closed polygon mask using the even-odd fill rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Vec2>,
}

impl Shape for Polygon {
    fn contains(&self, point: Vec2) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (self.vertices[i], self.vertices[j]);
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn fill_by_repeating(mut points: Vec<Vec2>, count: usize) -> Vec<Vec2> {
    if points.is_empty() {
        log::warn!("Mask admitted no points; returning an empty seed list");
        return points;
    }
    let found = points.len();
    if found < count {
        log::debug!("Found {} of {} points, repeating to fill", found, count);
        for i in 0..count - found {
            points.push(points[i % found]);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_inverted_rect_yields_nothing() {
        let rect = Rect::new(0.0, 0.0, -10.0, -10.0);
        assert!(rect.area() > 0.0);
        assert!(rect.is_empty());
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(rect.generate_points_inside(None, 50).is_empty());
        assert!(rect.generate_random_points_inside(None, 50, &mut rng).is_empty());

        let flat = Rect::new(0.0, 0.0, 10.0, 0.0);
        assert!(flat.generate_random_points_inside(None, 5, &mut rng).is_empty());
    }

    #[test]
    fn test_zero_count_is_empty() {
        let rect = Rect::from_size(100.0, 100.0);
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(rect.generate_points_inside(None, 0).is_empty());
        assert!(rect.generate_random_points_inside(None, 0, &mut rng).is_empty());
    }

    #[test]
    fn test_grid_fills_rect_exactly() {
        let rect = Rect::new(10.0, 20.0, 320.0, 240.0);
        for count in [1, 7, 100, 2048, 10_000] {
            let points = rect.generate_points_inside(None, count);
            assert_eq!(points.len(), count);
            assert!(points.iter().all(|p| rect.contains(*p)));
        }
    }

    #[test]
    fn test_grid_spreads_over_whole_rect() {
        let rect = Rect::from_size(100.0, 100.0);
        let points = rect.generate_points_inside(None, 1000);
        let lower_half = points.iter().filter(|p| p.y >= 50.0).count();
        assert!(lower_half > 400, "only {} points in lower half", lower_half);
    }

    #[test]
    fn test_grid_respects_circle_mask() {
        let rect = Rect::from_size(200.0, 200.0);
        let circle = Circle {
            center: Vec2::new(100.0, 100.0),
            radius: 30.0,
        };
        let points = rect.generate_points_inside(Some(&circle), 5000);
        assert_eq!(points.len(), 5000);
        assert!(points.iter().all(|p| circle.contains(*p) && rect.contains(*p)));
    }

    #[test]
    fn test_random_respects_polygon_mask() {
        let rect = Rect::from_size(100.0, 100.0);
        let triangle = Polygon {
            vertices: vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(0.0, 100.0)],
        };
        let mut rng = SmallRng::seed_from_u64(42);
        let points = rect.generate_random_points_inside(Some(&triangle), 3000, &mut rng);
        assert_eq!(points.len(), 3000);
        assert!(points.iter().all(|p| p.x + p.y <= 100.001));
    }

    #[test]
    fn test_empty_mask_yields_nothing() {
        let rect = Rect::from_size(50.0, 50.0);
        let far = Circle {
            center: Vec2::new(500.0, 500.0),
            radius: 1.0,
        };
        assert!(rect.generate_points_inside(Some(&far), 10).is_empty());
    }

    #[test]
    fn test_polygon_even_odd() {
        let square = Polygon {
            vertices: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(0.0, 10.0),
            ],
        };
        assert!(square.contains(Vec2::new(5.0, 5.0)));
        assert!(!square.contains(Vec2::new(15.0, 5.0)));
        assert!(!Polygon { vertices: vec![] }.contains(Vec2::ZERO));
    }
}
