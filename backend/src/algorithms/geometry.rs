//! Planar and spherical ring computations backing the in-memory geometry store.
//!
//! The Postgres backend delegates the same questions to PostGIS; these
//! functions give the local repository equivalent answers for rings expressed
//! in longitude/latitude degrees.

use crate::models::{Coordinate, Ring};

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Vertices whose adjacent edges meet at less than this angle are spikes.
pub const SPIKE_ANGLE_THRESHOLD_DEGREES: f64 = 5.0;

const EPSILON: f64 = 1e-12;

/// Ring vertices with consecutive duplicates (including the closing point) removed.
fn distinct_vertices(ring: &Ring) -> Vec<Coordinate> {
    let mut out: Vec<Coordinate> = Vec::with_capacity(ring.coordinates.len());
    for &c in ring.vertices() {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

fn cross(o: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn orientation(o: Coordinate, a: Coordinate, b: Coordinate) -> i8 {
    let c = cross(o, a, b);
    if c.abs() <= EPSILON {
        0
    } else if c > 0.0 {
        1
    } else {
        -1
    }
}

/// Whether `p` lies within the bounding box of segment `a`-`b` (assumes collinearity).
fn on_segment(a: Coordinate, p: Coordinate, b: Coordinate) -> bool {
    p.x <= a.x.max(b.x) + EPSILON
        && p.x >= a.x.min(b.x) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
}

fn segments_intersect(p1: Coordinate, p2: Coordinate, p3: Coordinate, p4: Coordinate) -> bool {
    let o1 = orientation(p1, p2, p3);
    let o2 = orientation(p1, p2, p4);
    let o3 = orientation(p3, p4, p1);
    let o4 = orientation(p3, p4, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(p1, p3, p2))
        || (o2 == 0 && on_segment(p1, p4, p2))
        || (o3 == 0 && on_segment(p3, p1, p4))
        || (o4 == 0 && on_segment(p3, p2, p4))
}

/// Returns `true` when the ring does not cross or touch itself.
///
/// Rings with fewer than three distinct vertices are degenerate and never simple.
pub fn is_simple(ring: &Ring) -> bool {
    let v = distinct_vertices(ring);
    let n = v.len();
    if n < 3 {
        return false;
    }

    let segment = |i: usize| (v[i], v[(i + 1) % n]);

    for i in 0..n {
        let (a1, a2) = segment(i);
        for j in (i + 1)..n {
            let (b1, b2) = segment(j);
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                // Neighbours share one vertex; they may only overlap there.
                let (shared, a_other, b_other) = if j == i + 1 {
                    (a2, a1, b2)
                } else {
                    (a1, a2, b1)
                };
                if orientation(a_other, shared, b_other) == 0
                    && (on_segment(shared, b_other, a_other) || on_segment(shared, a_other, b_other))
                {
                    return false;
                }
                continue;
            }
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

/// Returns the vertices whose adjacent edges meet at an angle below `threshold_degrees`.
///
/// Angles are measured in a local equirectangular projection so longitude
/// spans shrink with latitude.
pub fn find_spikes(ring: &Ring, threshold_degrees: f64) -> Vec<Coordinate> {
    let v = distinct_vertices(ring);
    let n = v.len();
    if n < 3 {
        return Vec::new();
    }

    let mut spikes = Vec::new();
    for i in 0..n {
        let prev = v[(i + n - 1) % n];
        let cur = v[i];
        let next = v[(i + 1) % n];
        let scale = cur.y.to_radians().cos();

        let (ax, ay) = ((prev.x - cur.x) * scale, prev.y - cur.y);
        let (bx, by) = ((next.x - cur.x) * scale, next.y - cur.y);
        if (ax == 0.0 && ay == 0.0) || (bx == 0.0 && by == 0.0) {
            continue;
        }

        let angle = (ax * by - ay * bx).abs().atan2(ax * bx + ay * by).to_degrees();
        if angle < threshold_degrees {
            spikes.push(cur);
        }
    }
    spikes
}

/// Geodesic area of the ring on a spherical earth, in hectares.
pub fn area_hectares(ring: &Ring) -> f64 {
    let v = distinct_vertices(ring);
    let n = v.len();
    if n < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let p1 = v[i];
        let p2 = v[(i + 1) % n];
        total += (p2.x - p1.x).to_radians()
            * (2.0 + p1.y.to_radians().sin() + p2.y.to_radians().sin());
    }
    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs() / SQUARE_METERS_PER_HECTARE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Ring {
        Ring::from_pairs(&[(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)])
    }

    #[test]
    fn test_square_is_simple() {
        assert!(is_simple(&square(0.01)));
    }

    #[test]
    fn test_bowtie_is_not_simple() {
        let ring = Ring::from_pairs(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(!is_simple(&ring));
    }

    #[test]
    fn test_ring_touching_itself_is_not_simple() {
        // Figure-eight that passes through (1, 1) twice.
        let ring = Ring::from_pairs(&[
            (0.0, 0.0),
            (1.0, 1.0),
            (2.0, 0.0),
            (2.0, 2.0),
            (1.0, 1.0),
            (0.0, 2.0),
        ]);
        assert!(!is_simple(&ring));
    }

    #[test]
    fn test_backtracking_edge_is_not_simple() {
        let ring = Ring::from_pairs(&[(0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert!(!is_simple(&ring));
    }

    #[test]
    fn test_degenerate_ring_is_not_simple() {
        let ring = Ring::from_pairs(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(!is_simple(&ring));
    }

    #[test]
    fn test_repeated_vertices_are_ignored() {
        let ring = Ring::from_pairs(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ]);
        assert!(is_simple(&ring));
    }

    #[test]
    fn test_square_has_no_spikes() {
        assert!(find_spikes(&square(0.01), SPIKE_ANGLE_THRESHOLD_DEGREES).is_empty());
    }

    #[test]
    fn test_narrow_protrusion_is_a_spike() {
        let ring = Ring::from_pairs(&[
            (0.0, 0.0),
            (0.01, 0.0),
            (0.01, 0.005),
            (0.05, 0.0051),
            (0.01, 0.0052),
            (0.01, 0.01),
            (0.0, 0.01),
        ]);
        let spikes = find_spikes(&ring, SPIKE_ANGLE_THRESHOLD_DEGREES);
        assert_eq!(spikes, vec![Coordinate::new(0.05, 0.0051)]);
    }

    #[test]
    fn test_area_of_small_equatorial_square() {
        // 0.01 degrees is ~1113.2 m at the equator on the WGS84 sphere.
        let area = area_hectares(&square(0.01));
        assert!((area - 123.92).abs() < 0.5, "area was {}", area);
    }

    #[test]
    fn test_area_ignores_orientation() {
        let cw = Ring::from_pairs(&[(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)]);
        let ccw = square(0.01);
        assert!((area_hectares(&cw) - area_hectares(&ccw)).abs() < 1e-9);
    }
}
