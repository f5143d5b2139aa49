//! Point mapping over a built mesh: triangle lookup, the weighted
//! barycentric transform, and the angular-sector fallback for points
//! outside every triangle.

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};

use thiserror::Error;

use crate::geom::{self, Point2};

use super::id::VertexId;
use super::mesh::{MeshState, MeshTriangle};
use super::{StrictStatus, YaxisMode};

/// Why a transform request produced no coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransformError {
    /// No mesh has been built or decoded yet.
    #[error("no mesh has been built yet")]
    NoMesh,
    /// The query (or, backward, its result) fell outside the map bounds.
    #[error("point lies outside the map bounds")]
    OutOfBounds,
    /// Backward mapping is refused while the mesh carries kinks.
    #[error("backward transform is not allowed in the strict_error state")]
    BackwardDisallowed,
}

/// Maps `point` through the mesh. Forward goes illustration to
/// geographic; `backward` the other way.
///
/// Bounds are enforced only when a bounds polygon is configured: on the
/// input for forward queries, on the result for backward ones.
/// `ignore_bounds` lifts both checks.
pub fn apply(
    state: &MeshState,
    point: Point2,
    backward: bool,
    ignore_bounds: bool,
) -> Result<Point2, TransformError> {
    if backward && state.status == StrictStatus::StrictError {
        return Err(TransformError::BackwardDisallowed);
    }
    let follow = state.yaxis == YaxisMode::Follow;
    let query = if follow && backward {
        Point2::new(point.x, -point.y)
    } else {
        point
    };

    if let Some(ring) = &state.bounds {
        if !backward && !ignore_bounds && !geom::point_in_ring(query, ring) {
            return Err(TransformError::OutOfBounds);
        }
    }

    let weights = if backward {
        &state.weights.bakw
    } else {
        &state.weights.forw
    };
    let result = match find_triangle(state, query, backward) {
        Some(tri) => weighted(query, tri, backward, weights),
        None => sector_transform(state, query, backward, weights),
    };

    if backward && !ignore_bounds {
        if let Some(ring) = &state.bounds {
            return if geom::point_in_ring(result, ring) {
                Ok(result)
            } else {
                Err(TransformError::OutOfBounds)
            };
        }
    }
    if follow && !backward {
        return Ok(Point2::new(result.x, -result.y));
    }
    Ok(result)
}

/// First triangle whose local-space corners contain the point, boundary
/// included. Backward queries prefer the independent backward mesh when
/// the state carries one.
fn find_triangle(state: &MeshState, point: Point2, backward: bool) -> Option<&MeshTriangle> {
    if backward {
        if let Some(tris) = &state.bakw_tris {
            return tris
                .iter()
                .find(|tri| geom::point_in_triangle(point, tri.coords(true)));
        }
    }
    state
        .arena
        .triangles()
        .find(|tri| geom::point_in_triangle(point, tri.coords(backward)))
}

fn weighted(
    o: Point2,
    tri: &MeshTriangle,
    backward: bool,
    weights: &BTreeMap<VertexId, f64>,
) -> Point2 {
    let w = tri.ids.map(|id| weights.get(&id).copied().unwrap_or(1.0));
    affine(o, tri.coords(backward), tri.coords(!backward), Some(w))
}

/// Barycentric transform of `o` from the `source` triangle onto `dest`.
///
/// With weights, the barycentric shares are rescaled by the per-vertex
/// factors before recomposition. Outside the triangle (a sector-fallback
/// query) only the two base vertices participate.
pub fn affine(
    o: Point2,
    source: [Point2; 3],
    dest: [Point2; 3],
    weights: Option<[f64; 3]>,
) -> Point2 {
    let ab = source[1] - source[0];
    let ac = source[2] - source[0];
    let ao = o - source[0];
    let det = ab.x * ac.y - ab.y * ac.x;
    let mut u = (ac.y * ao.x - ac.x * ao.y) / det;
    let mut v = (ab.x * ao.y - ab.y * ao.x) / det;

    if let Some([wa, wb, wc]) = weights {
        if u < 0.0 || v < 0.0 || 1.0 - u - v < 0.0 {
            let norm_b = u / (u + v);
            let norm_c = v / (u + v);
            let denom = norm_b / wb + norm_c / wc;
            u = u / wb / denom;
            v = v / wc / denom;
        } else {
            let denom = u / wb + v / wc + (1.0 - u - v) / wa;
            u = u / wb / denom;
            v = v / wc / denom;
        }
    }

    let abd = dest[1] - dest[0];
    let acd = dest[2] - dest[0];
    Point2::new(
        dest[0].x + u * abd.x + v * acd.x,
        dest[0].y + u * abd.y + v * acd.y,
    )
}

fn sector_transform(
    state: &MeshState,
    point: Point2,
    backward: bool,
    weights: &BTreeMap<VertexId, f64>,
) -> Point2 {
    let centroid = state.centroid.local(backward);
    let radians = if backward {
        &state.vparams.bakw_radians
    } else {
        &state.vparams.forw_radians
    };
    let radian = (point - centroid).bearing();
    let index = decide_sector(radian, radians).unwrap_or(0);
    weighted(point, &state.vparams.sectors[index], backward, weights)
}

/// Index of the angular sector whose boundary rays bracket `radian`,
/// taking the pair with the smallest angular clearance. Ties on a shared
/// boundary ray go to the earlier sector.
fn decide_sector(radian: f64, radians: &[f64; 4]) -> Option<usize> {
    let mut found = None;
    let mut min_theta = TAU;
    let mut idel = normalize_radian(radian - radians[0]);
    for i in 0..4 {
        let jdel = normalize_radian(radian - radians[(i + 1) % 4]);
        let min_del = idel.abs().min(jdel.abs());
        if idel * jdel <= 0.0 && min_del < min_theta {
            min_theta = min_del;
            found = Some(i);
        }
        idel = jdel;
    }
    found
}

/// Folds an angle into the half-open interval (-pi, pi].
fn normalize_radian(mut value: f64) -> f64 {
    while value > PI || value <= -PI {
        value += if value > PI { -TAU } else { TAU };
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PointPair;
    use crate::tin::mesh::{Kinks, TriangleArena, VerticesParams, WeightBuffer};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn close(a: Point2, b: Point2) -> bool {
        (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12
    }

    #[test]
    fn plain_affine_maps_between_triangles() {
        let source = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)];
        let dest = [p(0.0, 0.0), p(2.0, 0.0), p(0.0, 2.0)];
        assert!(close(
            affine(p(0.25, 0.25), source, dest, None),
            p(0.5, 0.5)
        ));
        // Identical triangles give the identity, inside or out.
        assert!(close(
            affine(p(0.3, 0.4), source, source, None),
            p(0.3, 0.4)
        ));
        assert!(close(
            affine(p(2.0, 2.0), source, source, None),
            p(2.0, 2.0)
        ));
    }

    #[test]
    fn unit_weights_change_nothing() {
        let source = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)];
        let dest = [p(3.0, 1.0), p(5.0, 1.5), p(2.5, 4.0)];
        for o in [p(0.25, 0.25), p(2.0, 2.0), p(-0.5, 0.2)] {
            assert!(close(
                affine(o, source, dest, Some([1.0, 1.0, 1.0])),
                affine(o, source, dest, None)
            ));
        }
    }

    #[test]
    fn weights_shift_the_barycentric_shares() {
        let tri = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)];
        let out = affine(p(0.25, 0.25), tri, tri, Some([1.0, 2.0, 2.0]));
        // u = v = 0.25; rescaled shares are (0.25/2) / 0.75 = 1/6.
        assert!(close(out, p(1.0 / 6.0, 1.0 / 6.0)));
    }

    #[test]
    fn sector_choice_brackets_the_query_bearing() {
        // Corner bearings of a square seen from its middle, in ring
        // order (min,min), (max,min), (max,max), (min,max).
        let radians = [
            -3.0 * PI / 4.0,
            3.0 * PI / 4.0,
            PI / 4.0,
            -PI / 4.0,
        ];
        assert_eq!(decide_sector(0.0, &radians), Some(2));
        assert_eq!(decide_sector(PI, &radians), Some(0));
        // A query exactly on a boundary ray goes to the earlier sector.
        assert_eq!(decide_sector(PI / 4.0, &radians), Some(1));
        // Degenerate fans bracket nothing.
        assert_eq!(decide_sector(PI / 2.0, &[0.0; 4]), None);
    }

    #[test]
    fn radians_fold_into_the_half_open_interval() {
        assert!((normalize_radian(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_radian(-PI) - PI).abs() < 1e-12);
        assert!((normalize_radian(0.25) - 0.25).abs() < 1e-15);
        assert!((normalize_radian(-TAU - 0.25) + 0.25).abs() < 1e-12);
    }

    fn identity_state(status: StrictStatus, yaxis: YaxisMode) -> MeshState {
        let ids = [VertexId::Point(0), VertexId::Point(1), VertexId::Point(2)];
        let coords = [p(0.0, 0.0), p(10.0, 0.0), p(0.0, 10.0)];
        let tri = MeshTriangle::new(ids, coords, coords);
        let sector = MeshTriangle::new(
            [VertexId::Centroid, VertexId::Bbox(0), VertexId::Bbox(1)],
            coords,
            coords,
        );
        MeshState {
            points: coords.map(|c| PointPair::new(c, c)).to_vec(),
            edges: vec![],
            edge_nodes: vec![],
            centroid: PointPair::new(p(2.0, 2.0), p(2.0, 2.0)),
            corners: [PointPair::new(Point2::ZERO, Point2::ZERO); 4],
            arena: std::iter::once(tri).collect::<TriangleArena>(),
            bakw_tris: None,
            vparams: VerticesParams {
                forw_radians: [-3.0 * PI / 4.0, 3.0 * PI / 4.0, PI / 4.0, -PI / 4.0],
                bakw_radians: [-3.0 * PI / 4.0, 3.0 * PI / 4.0, PI / 4.0, -PI / 4.0],
                sectors: std::array::from_fn(|_| sector.clone()),
            },
            weights: WeightBuffer::default(),
            status,
            kinks: Kinks::default(),
            yaxis,
            bounds: None,
            xy: Point2::ZERO,
            wh: None,
        }
    }

    #[test]
    fn backward_is_refused_on_a_kinked_mesh() {
        let state = identity_state(StrictStatus::StrictError, YaxisMode::Invert);
        assert_eq!(
            apply(&state, p(2.0, 1.0), true, false),
            Err(TransformError::BackwardDisallowed)
        );
        assert!(apply(&state, p(2.0, 1.0), false, false).is_ok());
    }

    #[test]
    fn follow_mode_negates_the_geographic_axis() {
        let state = identity_state(StrictStatus::Strict, YaxisMode::Follow);
        // The mesh itself is the identity, so only the axis convention
        // shows up in the results.
        assert_eq!(apply(&state, p(2.0, 1.0), false, false), Ok(p(2.0, -1.0)));
        assert_eq!(apply(&state, p(2.0, -1.0), true, false), Ok(p(2.0, 1.0)));
    }

    #[test]
    fn bounds_gate_forward_queries_and_backward_results() {
        let mut state = identity_state(StrictStatus::Strict, YaxisMode::Invert);
        state.bounds = Some(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);

        assert_eq!(
            apply(&state, p(20.0, 20.0), false, false),
            Err(TransformError::OutOfBounds)
        );
        // The boundary itself is inside.
        assert!(apply(&state, p(10.0, 0.0), false, false).is_ok());
        assert!(apply(&state, p(20.0, 20.0), false, true).is_ok());

        // Backward checks the result, which the identity mesh keeps at
        // the query position.
        assert_eq!(
            apply(&state, p(2.0, 3.0), true, false),
            Ok(p(2.0, 3.0))
        );
        assert_eq!(
            apply(&state, p(3.0, 11.0), true, false),
            Err(TransformError::OutOfBounds)
        );
        assert!(apply(&state, p(3.0, 11.0), true, true).is_ok());
    }

    #[test]
    fn backward_prefers_the_independent_mesh() {
        let mut state = identity_state(StrictStatus::Loose, YaxisMode::Invert);
        // A backward mesh that doubles coordinates on the way out.
        let ids = [VertexId::Point(0), VertexId::Point(1), VertexId::Point(2)];
        let bakw = [p(0.0, 0.0), p(10.0, 0.0), p(0.0, 10.0)];
        let forw = [p(0.0, 0.0), p(20.0, 0.0), p(0.0, 20.0)];
        state.bakw_tris = Some(vec![MeshTriangle::new(ids, forw, bakw)]);

        assert_eq!(apply(&state, p(2.0, 3.0), true, false), Ok(p(4.0, 6.0)));
        // Forward still walks the main mesh.
        assert_eq!(apply(&state, p(2.0, 3.0), false, false), Ok(p(2.0, 3.0)));
    }
}
