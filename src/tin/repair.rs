//! Bidirectional consistency repair: flips folded triangle pairs in the
//! counter mesh, then classifies the residual state.

use std::collections::HashSet;

use crate::geom::{self, Point2};

use super::id::VertexId;
use super::mesh::{Kinks, MeshState, MeshTriangle, SearchIndex, TriKey};
use super::{BuildError, StrictStatus};

/// Scans the counter-derived backward mesh for folded pairs and flips
/// them to the other diagonal, then runs the kink finder over both
/// surfaces. Leaves `status` at `Strict` or `StrictError`.
pub fn run(state: &mut MeshState, constraints: &[(usize, usize)]) -> Result<(), BuildError> {
    let exempt = exempt_pairs(constraints, state.points.len());
    let mut index = SearchIndex::build(&state.arena);

    // Flag first, mutate after: a flip rewrites the index, and the scan
    // must not chase its own insertions.
    let flagged: Vec<TriKey> = index
        .keys()
        .copied()
        .filter(|key| {
            let handles = index.get(key);
            if handles.len() < 2 {
                return false;
            }
            match (state.arena.get(handles[0]), state.arena.get(handles[1])) {
                (Some(a), Some(b)) => geom::triangles_overlap(a.bakw, b.bakw),
                _ => false,
            }
        })
        .collect();

    for key in flagged {
        let handles = index.get(&key);
        if handles.len() < 2 {
            // A neighboring flip already consumed this pair.
            continue;
        }
        let (first, second) = (handles[0], handles[1]);
        let (a, b) = match (state.arena.get(first), state.arena.get(second)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => continue,
        };

        // Only flip when the forward quadrilateral is convex; otherwise
        // the alternate diagonal would fold the forward surface instead.
        if !geom::union_fills_hull(a.forw, b.forw) {
            continue;
        }
        if is_exempt(key, &exempt) {
            continue;
        }

        let TriKey::Edge(shared0, shared1) = key else {
            // Two triangles over the same vertex triple cannot be flipped.
            return Err(BuildError::InconsistentRepair);
        };
        let shared = [
            vertex_of(&a, shared0).ok_or(BuildError::InconsistentRepair)?,
            vertex_of(&a, shared1).ok_or(BuildError::InconsistentRepair)?,
        ];
        let opposite = [
            opposite_of(&a, shared0, shared1).ok_or(BuildError::InconsistentRepair)?,
            opposite_of(&b, shared0, shared1).ok_or(BuildError::InconsistentRepair)?,
        ];

        index.remove(first, a.ids);
        index.remove(second, b.ids);
        state.arena.remove(first);
        state.arena.remove(second);

        for vertex in shared {
            let tri = MeshTriangle::new(
                [vertex.id, opposite[0].id, opposite[1].id],
                [vertex.forw, opposite[0].forw, opposite[1].forw],
                [vertex.bakw, opposite[0].bakw, opposite[1].bakw],
            );
            let ids = tri.ids;
            let handle = state.arena.insert(tri);
            index.insert(handle, ids);
        }
        log::debug!("flipped folded pair across {}-{}", shared0, shared1);
    }

    classify(state);
    Ok(())
}

/// Runs the kink finder over both triangulated surfaces and records the
/// verdict on the state.
fn classify(state: &mut MeshState) {
    let forw_rings: Vec<Vec<Point2>> = state
        .arena
        .triangles()
        .map(|tri| tri.ring(false).to_vec())
        .collect();
    let bakw_rings: Vec<Vec<Point2>> = state
        .arena
        .triangles()
        .map(|tri| tri.ring(true).to_vec())
        .collect();

    let forw_kinks = geom::find_intersections(&forw_rings);
    let bakw_kinks = geom::find_intersections(&bakw_rings);
    if forw_kinks.is_empty() && bakw_kinks.is_empty() {
        state.status = StrictStatus::Strict;
        state.kinks = Kinks::default();
    } else {
        log::debug!(
            "mesh surfaces self-intersect: {} forward, {} backward kinks",
            forw_kinks.len(),
            bakw_kinks.len()
        );
        state.status = StrictStatus::StrictError;
        state.kinks = Kinks {
            forw: forw_kinks,
            bakw: bakw_kinks,
        };
    }
}

struct Vertex {
    id: VertexId,
    forw: Point2,
    bakw: Point2,
}

fn vertex_of(tri: &MeshTriangle, id: VertexId) -> Option<Vertex> {
    tri.ids.iter().position(|&v| v == id).map(|i| Vertex {
        id: tri.ids[i],
        forw: tri.forw[i],
        bakw: tri.bakw[i],
    })
}

fn opposite_of(tri: &MeshTriangle, shared0: VertexId, shared1: VertexId) -> Option<Vertex> {
    tri.ids
        .iter()
        .position(|&v| v != shared0 && v != shared1)
        .map(|i| Vertex {
            id: tri.ids[i],
            forw: tri.forw[i],
            bakw: tri.bakw[i],
        })
}

/// Constraint segments joining two control points, as sorted index
/// pairs. Segments that touch a synthetic edge node are not exempt.
fn exempt_pairs(constraints: &[(usize, usize)], n_points: usize) -> HashSet<(usize, usize)> {
    constraints
        .iter()
        .filter(|(a, b)| *a < n_points && *b < n_points)
        .map(|&(a, b)| if a <= b { (a, b) } else { (b, a) })
        .collect()
}

fn is_exempt(key: TriKey, exempt: &HashSet<(usize, usize)>) -> bool {
    if let TriKey::Edge(VertexId::Point(a), VertexId::Point(b)) = key {
        exempt.contains(&(a, b))
    } else {
        false
    }
}
