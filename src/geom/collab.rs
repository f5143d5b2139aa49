//! Wrappers around the computational-geometry collaborators.
//!
//! Plane triangulation with required edges comes from `spade`; convex hulls,
//! polygon boolean operations, containment tests, and segment intersection
//! come from `geo`. Everything here is a thin, fallible adapter so the mesh
//! pipeline never touches collaborator types directly.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{
    Area, BooleanOps, Centroid, ConvexHull, Intersects, Line, LineString, MultiPoint, MultiPolygon,
    Polygon,
};
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Triangulation};

use super::point::Point2;

#[derive(Debug, thiserror::Error)]
pub enum TriangulateError {
    #[error("point {index} cannot be inserted into the triangulation: {source}")]
    Insert {
        index: usize,
        #[source]
        source: InsertionError,
    },
    #[error("required edge between points {0} and {1} crosses another required edge")]
    ConstraintCrossing(usize, usize),
    #[error("triangulation produced a vertex with no source point")]
    ForeignVertex,
}

/// Constrained Delaunay triangulation over `points`, honoring `constraints`
/// as mesh edges. Returns index triples into `points`.
///
/// Duplicate input coordinates collapse onto the first occurrence. An empty
/// result (all points collinear, or fewer than three distinct points) is
/// returned as an empty list; callers decide how degenerate output is
/// reported.
pub fn triangulate(
    points: &[Point2],
    constraints: &[(usize, usize)],
) -> Result<Vec<[usize; 3]>, TriangulateError> {
    let mut cdt: ConstrainedDelaunayTriangulation<spade::Point2<f64>> =
        ConstrainedDelaunayTriangulation::new();

    let mut handles = Vec::with_capacity(points.len());
    for (index, p) in points.iter().enumerate() {
        let handle = cdt
            .insert(spade::Point2::new(p.x, p.y))
            .map_err(|source| TriangulateError::Insert { index, source })?;
        handles.push(handle);
    }

    // Maps a triangulation vertex back to the first input point that produced
    // it, so output triples index the caller's array even when inputs collide.
    let mut reverse = vec![None; cdt.num_vertices()];
    for (index, handle) in handles.iter().enumerate() {
        let slot = &mut reverse[handle.index()];
        if slot.is_none() {
            *slot = Some(index);
        }
    }

    for &(a, b) in constraints {
        let (ha, hb) = (handles[a], handles[b]);
        if ha == hb {
            continue;
        }
        if !cdt.can_add_constraint(ha, hb) {
            return Err(TriangulateError::ConstraintCrossing(a, b));
        }
        cdt.add_constraint(ha, hb);
    }

    let mut triples = Vec::with_capacity(cdt.num_inner_faces());
    for face in cdt.inner_faces() {
        let vs = face.vertices();
        let mut triple = [0usize; 3];
        for (slot, v) in triple.iter_mut().zip(vs.iter()) {
            *slot = reverse[v.fix().index()].ok_or(TriangulateError::ForeignVertex)?;
        }
        triples.push(triple);
    }
    Ok(triples)
}

/// Convex hull ring of `points`, without the closing duplicate. Fewer than
/// three ring vertices means the input was degenerate.
#[must_use]
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let cloud = MultiPoint::from(
        points
            .iter()
            .map(|p| geo::Point::from(*p))
            .collect::<Vec<_>>(),
    );
    let hull = cloud.convex_hull();
    let ring = hull.exterior();
    let mut out: Vec<Point2> = ring.coords().map(|c| Point2::from(*c)).collect();
    // geo closes the ring; the duplicate tail coordinate is dropped here.
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Arithmetic-mean centroid of a point cloud. `None` when empty.
#[must_use]
pub fn centroid(points: &[Point2]) -> Option<Point2> {
    let cloud = MultiPoint::from(
        points
            .iter()
            .map(|p| geo::Point::from(*p))
            .collect::<Vec<_>>(),
    );
    cloud.centroid().map(|c| Point2::new(c.x(), c.y()))
}

/// Boundary-inclusive point-in-polygon over a closed ring.
#[must_use]
pub fn point_in_ring(point: Point2, ring: &[Point2]) -> bool {
    ring_polygon(ring).intersects(&geo::Point::from(point))
}

/// Boundary-inclusive point-in-triangle.
#[must_use]
pub fn point_in_triangle(point: Point2, tri: [Point2; 3]) -> bool {
    geo::Triangle::new(tri[0].into(), tri[1].into(), tri[2].into())
        .intersects(&geo::Point::from(point))
}

/// True when two triangles share interior area (a shared edge or vertex
/// alone does not count).
#[must_use]
pub fn triangles_overlap(a: [Point2; 3], b: [Point2; 3]) -> bool {
    let inter = triangle_polygon(a).intersection(&triangle_polygon(b));
    !inter.0.is_empty() && inter.unsigned_area() > 0.0
}

/// True when the union of two triangles already fills their joint convex
/// hull, i.e. the four corners form a convex, non-folded quadrilateral.
#[must_use]
pub fn union_fills_hull(a: [Point2; 3], b: [Point2; 3]) -> bool {
    let union = triangle_polygon(a).union(&triangle_polygon(b));
    let corners: Vec<geo::Point<f64>> = a
        .iter()
        .chain(b.iter())
        .map(|p| geo::Point::from(*p))
        .collect();
    let hull = MultiPoint::from(corners).convex_hull();
    let diff = MultiPolygon::new(vec![hull]).difference(&union);
    diff.0.is_empty() || diff.unsigned_area() == 0.0
}

/// Single intersection point of two closed segments, endpoints included.
/// Collinear overlap yields `None`.
#[must_use]
pub fn segment_intersection(
    a0: Point2,
    a1: Point2,
    b0: Point2,
    b1: Point2,
) -> Option<Point2> {
    let hit = line_intersection(
        Line::new(geo::Coord::from(a0), geo::Coord::from(a1)),
        Line::new(geo::Coord::from(b0), geo::Coord::from(b1)),
    )?;
    match hit {
        LineIntersection::SinglePoint { intersection, .. } => Some(Point2::from(intersection)),
        LineIntersection::Collinear { .. } => None,
    }
}

fn ring_polygon(ring: &[Point2]) -> Polygon<f64> {
    Polygon::new(
        LineString::from(ring.iter().map(|p| geo::Coord::from(*p)).collect::<Vec<_>>()),
        vec![],
    )
}

fn triangle_polygon(tri: [Point2; 3]) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![ring_polygon(&tri)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn triangulate_honors_constraints() {
        // Square plus midpoints; constrain the vertical through the middle.
        let points = vec![
            p(0.0, 0.0),
            p(10.0, 0.0),
            p(10.0, 10.0),
            p(0.0, 10.0),
            p(5.0, 2.0),
            p(5.0, 8.0),
        ];
        let triples = triangulate(&points, &[(4, 5)]).unwrap();
        assert!(!triples.is_empty());
        let has_edge = |a: usize, b: usize| {
            triples.iter().any(|t| {
                (t.contains(&a) && t.contains(&b))
                    && t.iter().filter(|v| **v == a || **v == b).count() == 2
            })
        };
        assert!(has_edge(4, 5));
        for t in &triples {
            assert!(t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
        }
    }

    #[test]
    fn triangulate_collinear_is_empty() {
        let points = vec![p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0)];
        assert!(triangulate(&points, &[]).unwrap().is_empty());
    }

    #[test]
    fn crossing_constraints_are_rejected() {
        let points = vec![p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(10.0, 0.0)];
        let err = triangulate(&points, &[(0, 1), (2, 3)]).unwrap_err();
        assert!(matches!(err, TriangulateError::ConstraintCrossing(2, 3)));
    }

    #[test]
    fn hull_drops_closing_duplicate() {
        let hull = convex_hull(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(2.0, 2.0)]);
        assert_eq!(hull.len(), 4);
        assert!(hull.first() != hull.last());
    }

    #[test]
    fn containment_is_boundary_inclusive() {
        let ring = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(point_in_ring(p(0.0, 5.0), &ring));
        assert!(point_in_ring(p(10.0, 10.0), &ring));
        assert!(!point_in_ring(p(10.000001, 5.0), &ring));

        let tri = [p(0.0, 0.0), p(4.0, 0.0), p(0.0, 4.0)];
        assert!(point_in_triangle(p(2.0, 2.0), tri));
        assert!(point_in_triangle(p(1.0, 1.0), tri));
        assert!(!point_in_triangle(p(3.0, 3.0), tri));
    }

    #[test]
    fn overlap_ignores_shared_edges() {
        let a = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)];
        let b = [p(0.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        assert!(!triangles_overlap(a, b));
        // Fold b over the shared diagonal: now both sit on the same side.
        let folded = [p(0.0, 0.0), p(4.0, 4.0), p(3.0, 1.0)];
        assert!(triangles_overlap(a, folded));
    }

    #[test]
    fn hull_test_separates_convex_from_reflex_quads() {
        let a = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)];
        let b = [p(0.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        assert!(union_fills_hull(a, b));
        // Shared edge (0,0)-(2,1) with a reflex corner at (2,1).
        let c = [p(0.0, 0.0), p(4.0, 0.0), p(2.0, 1.0)];
        let d = [p(0.0, 0.0), p(2.0, 1.0), p(2.0, 4.0)];
        assert!(!union_fills_hull(c, d));
    }

    #[test]
    fn segment_intersection_endpoints_count() {
        let hit = segment_intersection(p(0.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(4.0, 0.0));
        assert_eq!(hit, Some(p(2.0, 2.0)));
        let touch = segment_intersection(p(0.0, 0.0), p(2.0, 2.0), p(2.0, 2.0), p(4.0, 0.0));
        assert_eq!(touch, Some(p(2.0, 2.0)));
        assert!(segment_intersection(p(0.0, 0.0), p(1.0, 0.0), p(3.0, 0.0), p(4.0, 0.0)).is_none());
    }
}
