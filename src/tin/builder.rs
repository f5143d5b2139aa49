//! Mesh construction: control points and correspondence edges in, a
//! transform-ready state out.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::iter::once;

use crate::geom::{self, Point2, PointPair, TriangulateError};

use super::id::VertexId;
use super::mesh::{Kinks, MeshState, MeshTriangle, TriangleArena, VerticesParams, WeightBuffer};
use super::transform::affine;
use super::{BuildError, Edge, StrictStatus, Tin, VertexMode, YaxisMode};

/// Builds a fresh mesh state from the facade's staged inputs.
///
/// Also returns the expanded constraint list (registry positions), which
/// the repair pass and a later loose rebuild both need.
pub fn build(tin: &Tin) -> Result<(MeshState, Vec<(usize, usize)>), BuildError> {
    let wh = tin.wh.ok_or(BuildError::MissingExtent)?;
    let xy = tin.xy;

    let points = yaxis_points(&tin.points, tin.yaxis_mode);
    let edges = yaxis_edges(&tin.edges, tin.yaxis_mode);

    check_inside(&points, tin.bounds.as_deref(), xy, wh)?;

    let margin = MarginBox::new(xy, wh);
    let (edge_nodes, constraints) = expand_edges(&points, &edges)?;

    let mut registry: Vec<PointPair> = points.iter().chain(edge_nodes.iter()).copied().collect();
    let n_points = points.len();
    let n_nodes = edge_nodes.len();

    let forw_prov = provisional(&registry, &constraints, n_points, false)?;
    let bakw_prov = provisional(&registry, &constraints, n_points, true)?;
    if forw_prov.is_empty() || bakw_prov.is_empty() {
        return Err(BuildError::TooLinear);
    }

    let forw_coords: Vec<Point2> = registry.iter().map(|pair| pair.forw).collect();
    let cent_forw = geom::centroid(&forw_coords).ok_or(BuildError::TooLinear)?;
    let cent_bakw = mesh_transform(cent_forw, &forw_prov, false).ok_or(BuildError::TooLinear)?;
    let centroid = PointPair::new(cent_forw, cent_bakw);

    let buf = build_convex_buf(&registry, &forw_prov, &bakw_prov)?;
    let sides = expand_convex(&buf, centroid, &margin);
    let factors = orthant_factors(&buf, centroid, tin.vertex_mode)?;

    let corners = place_corners(&factors, centroid, &margin);
    let corners = expand_corners(corners, &sides, centroid);
    registry.extend(corners.iter().copied());

    let forw_coords: Vec<Point2> = registry.iter().map(|pair| pair.forw).collect();
    let triples = geom::triangulate(&forw_coords, &constraints).map_err(triangulation_error)?;
    let arena: TriangleArena = triples
        .into_iter()
        .map(|ids| {
            let mut tri = MeshTriangle::new(
                ids.map(|i| registry_id(i, n_points, n_nodes)),
                ids.map(|i| registry[i].forw),
                ids.map(|i| registry[i].bakw),
            );
            tri.normalize_corner_order();
            tri
        })
        .collect();

    log::debug!(
        "meshed {} control points, {} edge nodes into {} triangles",
        n_points,
        n_nodes,
        arena.len()
    );

    let state = MeshState {
        points,
        edges,
        edge_nodes,
        centroid,
        corners,
        arena,
        bakw_tris: None,
        vparams: vertex_params(centroid, &corners),
        weights: WeightBuffer::default(),
        status: StrictStatus::Strict,
        kinks: Kinks::default(),
        yaxis: tin.yaxis_mode,
        bounds: tin.bounds.clone(),
        xy,
        wh: Some(wh),
    };
    Ok((state, constraints))
}

/// Replaces the counter-derived backward mesh with an independent
/// triangulation of the geographic point set. Clears any recorded kinks
/// and marks the state loose.
pub fn build_loose_backward(
    state: &mut MeshState,
    constraints: &[(usize, usize)],
) -> Result<(), BuildError> {
    let registry: Vec<PointPair> = state
        .points
        .iter()
        .chain(state.edge_nodes.iter())
        .chain(state.corners.iter())
        .copied()
        .collect();
    let n_points = state.points.len();
    let n_nodes = state.edge_nodes.len();

    let bakw_coords: Vec<Point2> = registry.iter().map(|pair| pair.bakw).collect();
    let triples = geom::triangulate(&bakw_coords, constraints).map_err(triangulation_error)?;
    let tris: Vec<MeshTriangle> = triples
        .into_iter()
        .map(|ids| {
            let mut tri = MeshTriangle::new(
                ids.map(|i| registry_id(i, n_points, n_nodes)),
                ids.map(|i| registry[i].forw),
                ids.map(|i| registry[i].bakw),
            );
            tri.normalize_corner_order();
            tri
        })
        .collect();

    state.bakw_tris = Some(tris);
    state.kinks = Kinks::default();
    state.status = StrictStatus::Loose;
    Ok(())
}

fn triangulation_error(err: TriangulateError) -> BuildError {
    match err {
        TriangulateError::Insert { .. } => BuildError::TooLinear,
        TriangulateError::ConstraintCrossing(start, end) => {
            BuildError::ConstraintConflict { start, end }
        }
        TriangulateError::ForeignVertex => BuildError::InconsistentRepair,
    }
}

fn registry_id(index: usize, n_points: usize, n_nodes: usize) -> VertexId {
    if index < n_points {
        VertexId::Point(index)
    } else if index < n_points + n_nodes {
        VertexId::EdgeNode(index - n_points)
    } else {
        VertexId::Bbox((index - n_points - n_nodes) as u8)
    }
}

// ─────────────────────────── axis convention ───────────────────────────

fn yaxis_points(points: &[PointPair], mode: YaxisMode) -> Vec<PointPair> {
    match mode {
        YaxisMode::Invert => points.to_vec(),
        YaxisMode::Follow => points
            .iter()
            .map(|pair| PointPair::new(pair.forw, Point2::new(pair.bakw.x, -pair.bakw.y)))
            .collect(),
    }
}

fn yaxis_edges(edges: &[Edge], mode: YaxisMode) -> Vec<Edge> {
    match mode {
        YaxisMode::Invert => edges.to_vec(),
        YaxisMode::Follow => edges
            .iter()
            .map(|edge| Edge {
                start_end: edge.start_end,
                illst_nodes: edge.illst_nodes.clone(),
                merc_nodes: edge
                    .merc_nodes
                    .iter()
                    .map(|p| Point2::new(p.x, -p.y))
                    .collect(),
            })
            .collect(),
    }
}

// ───────────────────────────── bounding shape ──────────────────────────

fn check_inside(
    points: &[PointPair],
    bounds: Option<&[Point2]>,
    xy: Point2,
    wh: Point2,
) -> Result<(), BuildError> {
    for (index, pair) in points.iter().enumerate() {
        let p = pair.forw;
        let inside = match bounds {
            Some(ring) => geom::point_in_ring(p, ring),
            None => p.x >= xy.x && p.x <= xy.x + wh.x && p.y >= xy.y && p.y <= xy.y + wh.y,
        };
        if !inside {
            return Err(BuildError::OutOfBounds { index });
        }
    }
    Ok(())
}

/// Extent grown by 5% on every side; the bounding-box corners live on
/// this margin, not on the extent itself.
struct MarginBox {
    minx: f64,
    maxx: f64,
    miny: f64,
    maxy: f64,
}

impl MarginBox {
    fn new(xy: Point2, wh: Point2) -> Self {
        Self {
            minx: xy.x - 0.05 * wh.x,
            maxx: xy.x + 1.05 * wh.x,
            miny: xy.y - 0.05 * wh.y,
            maxy: xy.y + 1.05 * wh.y,
        }
    }

    /// Corners in orthant order: (-,-), (+,-), (-,+), (+,+).
    fn orthant_corners(&self) -> [Point2; 4] {
        [
            Point2::new(self.minx, self.miny),
            Point2::new(self.maxx, self.miny),
            Point2::new(self.minx, self.maxy),
            Point2::new(self.maxx, self.maxy),
        ]
    }
}

// ─────────────────────────── edge expansion ────────────────────────────

struct EdgeJoin {
    pair: PointPair,
    ratio: f64,
}

/// Expands waypoint edges into synthetic nodes matched by cumulative
/// arc-length ratio, and emits the constraint segments (as registry
/// positions) that pin each chain into the triangulation.
fn expand_edges(
    points: &[PointPair],
    edges: &[Edge],
) -> Result<(Vec<PointPair>, Vec<(usize, usize)>), BuildError> {
    let n_points = points.len();
    let mut edge_nodes: Vec<PointPair> = Vec::new();
    let mut constraints: Vec<(usize, usize)> = Vec::new();

    for edge in edges {
        let (start, end) = edge.start_end;
        let start_pair = *points.get(start).ok_or(BuildError::EdgeReference(start))?;
        let end_pair = *points.get(end).ok_or(BuildError::EdgeReference(end))?;

        if edge.illst_nodes.is_empty() && edge.merc_nodes.is_empty() {
            constraints.push((start, end));
            continue;
        }

        let illst: Vec<Point2> = once(start_pair.forw)
            .chain(edge.illst_nodes.iter().copied())
            .chain(once(end_pair.forw))
            .collect();
        let merc: Vec<Point2> = once(start_pair.bakw)
            .chain(edge.merc_nodes.iter().copied())
            .chain(once(end_pair.bakw))
            .collect();

        let illst_ratios = chain_ratios(&illst)?;
        let merc_ratios = chain_ratios(&merc)?;

        // The illustration chain drives; exact ratio matches claim their
        // geographic counterpart so the second walk does not duplicate it.
        let mut merc_handled = vec![false; merc.len()];
        let mut joins: Vec<EdgeJoin> = Vec::new();
        for index in 1..illst.len() - 1 {
            let ratio = illst_ratios[index];
            let counter = match_ratio(ratio, &merc, &merc_ratios, Some(&mut merc_handled))?;
            joins.push(EdgeJoin {
                pair: PointPair::new(illst[index], counter),
                ratio,
            });
        }
        for index in 1..merc.len() - 1 {
            if merc_handled[index] {
                continue;
            }
            let ratio = merc_ratios[index];
            let counter = match_ratio(ratio, &illst, &illst_ratios, None)?;
            joins.push(EdgeJoin {
                pair: PointPair::new(counter, merc[index]),
                ratio,
            });
        }
        joins.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));

        for (position, join) in joins.iter().enumerate() {
            edge_nodes.push(join.pair);
            let node_pos = n_points + edge_nodes.len() - 1;
            if position == 0 {
                constraints.push((start, node_pos));
            } else {
                constraints.push((node_pos - 1, node_pos));
            }
            if position == joins.len() - 1 {
                constraints.push((node_pos, end));
            }
        }
    }
    Ok((edge_nodes, constraints))
}

/// Cumulative arc-length ratios along a chain, 0 at the start and 1 at
/// the end. A zero-length chain cannot be parameterized.
fn chain_ratios(chain: &[Point2]) -> Result<Vec<f64>, BuildError> {
    let mut sums = Vec::with_capacity(chain.len());
    let mut total = 0.0;
    for (index, node) in chain.iter().enumerate() {
        if index > 0 {
            total += node.distance(chain[index - 1]);
        }
        sums.push(total);
    }
    if !total.is_finite() || total <= 0.0 {
        return Err(BuildError::TooLinear);
    }
    Ok(sums.into_iter().map(|sum| sum / total).collect())
}

/// The counterpart coordinate at `ratio` on the other chain: the exact
/// node when one sits on that ratio, a linear interpolation between the
/// bracketing nodes otherwise.
fn match_ratio(
    ratio: f64,
    chain: &[Point2],
    ratios: &[f64],
    mut handled: Option<&mut Vec<bool>>,
) -> Result<Point2, BuildError> {
    for index in 0..ratios.len() {
        if ratios[index] == ratio {
            if let Some(marks) = handled.as_deref_mut() {
                marks[index] = true;
            }
            return Ok(chain[index]);
        }
        if index + 1 < ratios.len() && ratios[index] < ratio && ratios[index + 1] > ratio {
            let t = (ratio - ratios[index]) / (ratios[index + 1] - ratios[index]);
            return Ok(chain[index].lerp(chain[index + 1], t));
        }
    }
    Err(BuildError::TooLinear)
}

// ─────────────────────── provisional triangulation ─────────────────────

fn provisional(
    registry: &[PointPair],
    constraints: &[(usize, usize)],
    n_points: usize,
    backward: bool,
) -> Result<Vec<MeshTriangle>, BuildError> {
    let coords: Vec<Point2> = registry.iter().map(|pair| pair.local(backward)).collect();
    let triples = geom::triangulate(&coords, constraints).map_err(triangulation_error)?;
    Ok(triples
        .into_iter()
        .map(|ids| {
            MeshTriangle::new(
                ids.map(|i| registry_id(i, n_points, registry.len() - n_points)),
                ids.map(|i| registry[i].forw),
                ids.map(|i| registry[i].bakw),
            )
        })
        .collect())
}

/// Plain barycentric transform through a triangle list; `None` when the
/// point hits no triangle.
fn mesh_transform(p: Point2, tris: &[MeshTriangle], backward: bool) -> Option<Point2> {
    let tri = tris
        .iter()
        .find(|tri| geom::point_in_triangle(p, tri.coords(backward)))?;
    Some(affine(p, tri.coords(backward), tri.coords(!backward), None))
}

// ──────────────────────── hull-based extrapolation ──────────────────────

/// Hull vertices of both spaces merged by forward coordinate. Insertion
/// order is kept; a repeated coordinate overwrites the earlier entry in
/// place.
#[derive(Default)]
struct ConvexBuf {
    entries: Vec<PointPair>,
    by_forw: HashMap<(u64, u64), usize>,
}

impl ConvexBuf {
    fn insert(&mut self, pair: PointPair) {
        let p = pair.forw.normalize_zero();
        match self.by_forw.entry((p.x.to_bits(), p.y.to_bits())) {
            Entry::Occupied(slot) => self.entries[*slot.get()] = pair,
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(pair);
            }
        }
    }
}

fn build_convex_buf(
    registry: &[PointPair],
    forw_prov: &[MeshTriangle],
    bakw_prov: &[MeshTriangle],
) -> Result<ConvexBuf, BuildError> {
    let mut buf = ConvexBuf::default();

    let forw_coords: Vec<Point2> = registry.iter().map(|pair| pair.forw).collect();
    for vertex in geom::convex_hull(&forw_coords) {
        let bakw = mesh_transform(vertex, forw_prov, false).ok_or(BuildError::TooLinear)?;
        buf.insert(PointPair::new(vertex, bakw));
    }

    let bakw_coords: Vec<Point2> = registry.iter().map(|pair| pair.bakw).collect();
    for vertex in geom::convex_hull(&bakw_coords) {
        let forw = mesh_transform(vertex, bakw_prov, true).ok_or(BuildError::TooLinear)?;
        buf.insert(PointPair::new(forw, vertex));
    }
    Ok(buf)
}

/// Projects every hull vertex from the centroid onto the margin box and
/// buckets the projections per box side (bottom, right, top, left).
///
/// A vertex near a diagonal can land on two sides; one exactly between
/// the band thresholds lands on none.
fn expand_convex(buf: &ConvexBuf, centroid: PointPair, margin: &MarginBox) -> [Vec<PointPair>; 4] {
    let mut sides: [Vec<PointPair>; 4] = Default::default();
    for entry in &buf.entries {
        let delta_forw = entry.forw - centroid.forw;
        let delta_bakw = entry.bakw - centroid.bakw;

        let x_rate = if delta_forw.x == 0.0 {
            f64::INFINITY
        } else {
            ((if delta_forw.x < 0.0 {
                margin.minx
            } else {
                margin.maxx
            }) - centroid.forw.x)
                / delta_forw.x
        };
        let y_rate = if delta_forw.y == 0.0 {
            f64::INFINITY
        } else {
            ((if delta_forw.y < 0.0 {
                margin.miny
            } else {
                margin.maxy
            }) - centroid.forw.y)
                / delta_forw.y
        };

        if x_rate.abs() / y_rate.abs() < 1.1 {
            let projected = PointPair::new(
                centroid.forw + delta_forw * x_rate,
                centroid.bakw + delta_bakw * x_rate,
            );
            sides[if delta_forw.x < 0.0 { 3 } else { 1 }].push(projected);
        }
        if y_rate.abs() / x_rate.abs() < 1.1 {
            let projected = PointPair::new(
                centroid.forw + delta_forw * y_rate,
                centroid.bakw + delta_bakw * y_rate,
            );
            sides[if delta_forw.y < 0.0 { 0 } else { 2 }].push(projected);
        }
    }
    sides
}

/// Scale and rotation between forward and backward centroid offsets, per
/// orthant of the forward plane.
///
/// Orthants are pooled into one shared factor unless the vertex mode is
/// birdeye and every orthant holds at least one hull vertex.
fn orthant_factors(
    buf: &ConvexBuf,
    centroid: PointPair,
    mode: VertexMode,
) -> Result<[(f64, f64); 4], BuildError> {
    let mut groups: [Vec<(Point2, Point2)>; 4] = Default::default();
    for entry in &buf.entries {
        let delta_forw = entry.forw - centroid.forw;
        // Backward offsets flip y so both spaces share a screen-down axis.
        let delta_bakw = Point2::new(
            entry.bakw.x - centroid.bakw.x,
            centroid.bakw.y - entry.bakw.y,
        );
        if delta_forw.x == 0.0 || delta_forw.y == 0.0 {
            continue;
        }
        let mut index = 0;
        if delta_forw.x > 0.0 {
            index += 1;
        }
        if delta_forw.y > 0.0 {
            index += 2;
        }
        groups[index].push((delta_forw, delta_bakw));
    }

    let split = mode == VertexMode::Birdeye && groups.iter().all(|group| !group.is_empty());
    if split {
        let mut out = [(0.0, 0.0); 4];
        for (slot, group) in out.iter_mut().zip(groups.iter()) {
            *slot = finalize_factor(group).ok_or(BuildError::TooLinear)?;
        }
        Ok(out)
    } else {
        let merged: Vec<(Point2, Point2)> = groups.iter().flatten().copied().collect();
        let factor = finalize_factor(&merged).ok_or(BuildError::TooLinear)?;
        Ok([factor; 4])
    }
}

/// Minimum distance ratio and circular-mean rotation over a set of
/// forward/backward offset pairs.
fn finalize_factor(deltas: &[(Point2, Point2)]) -> Option<(f64, f64)> {
    if deltas.is_empty() {
        return None;
    }
    let mut scale = f64::INFINITY;
    let mut sum_cos = 0.0;
    let mut sum_sin = 0.0;
    for (forw, bakw) in deltas {
        let ratio = forw.length() / bakw.length();
        if ratio < scale {
            scale = ratio;
        }
        let theta = forw.bearing() - bakw.bearing();
        sum_cos += theta.cos();
        sum_sin += theta.sin();
    }
    Some((scale, sum_sin.atan2(sum_cos)))
}

// ───────────────────────── bounding-box corners ─────────────────────────

/// Maps the margin-box corners into backward space with the orthant
/// factors, then reorders them into ring order (2 and 3 swap).
fn place_corners(
    factors: &[(f64, f64); 4],
    centroid: PointPair,
    margin: &MarginBox,
) -> [PointPair; 4] {
    let orthant_corners = margin.orthant_corners();
    let mut out = [PointPair::new(Point2::ZERO, Point2::ZERO); 4];
    for index in 0..4 {
        let (scale, rotation) = factors[index];
        let forw = orthant_corners[index];
        let delta = forw - centroid.forw;
        let bak_distance = delta.length() / scale;
        let theta = delta.bearing() - rotation;
        let bakw = Point2::new(
            centroid.bakw.x + bak_distance * theta.sin(),
            centroid.bakw.y - bak_distance * theta.cos(),
        );
        out[index] = PointPair::new(forw, bakw);
    }
    out.swap(2, 3);
    out
}

/// Pushes each corner outward along its centroid ray until every hull
/// projection falls inside the backward quadrilateral. Both corners of a
/// side take the larger of competing ratios.
fn expand_corners(
    corners: [PointPair; 4],
    sides: &[Vec<PointPair>; 4],
    centroid: PointPair,
) -> [PointPair; 4] {
    let mut rates = [1.0_f64; 4];
    for i in 0..4 {
        let j = (i + 1) % 4;
        for candidate in &sides[i] {
            let Some(hit) = geom::segment_intersection(
                corners[i].bakw,
                corners[j].bakw,
                centroid.bakw,
                candidate.bakw,
            ) else {
                continue;
            };
            let rate = candidate.bakw.distance(centroid.bakw) / hit.distance(centroid.bakw);
            if rate > rates[i] {
                rates[i] = rate;
            }
            if rate > rates[j] {
                rates[j] = rate;
            }
        }
    }

    let mut out = corners;
    for index in 0..4 {
        out[index] = PointPair::new(
            corners[index].forw,
            centroid.bakw + (corners[index].bakw - centroid.bakw) * rates[index],
        );
    }
    out
}

fn vertex_params(centroid: PointPair, corners: &[PointPair; 4]) -> VerticesParams {
    let forw_radians: [f64; 4] =
        std::array::from_fn(|i| (corners[i].forw - centroid.forw).bearing());
    let bakw_radians: [f64; 4] =
        std::array::from_fn(|i| (corners[i].bakw - centroid.bakw).bearing());
    let sectors: [MeshTriangle; 4] = std::array::from_fn(|i| {
        let j = (i + 1) % 4;
        MeshTriangle::new(
            [
                VertexId::Centroid,
                VertexId::Bbox(i as u8),
                VertexId::Bbox(j as u8),
            ],
            [centroid.forw, corners[i].forw, corners[j].forw],
            [centroid.bakw, corners[i].bakw, corners[j].bakw],
        )
    });
    VerticesParams {
        forw_radians,
        bakw_radians,
        sectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(fx: f64, fy: f64, bx: f64, by: f64) -> PointPair {
        PointPair::new(Point2::new(fx, fy), Point2::new(bx, by))
    }

    #[test]
    fn chain_ratios_follow_arc_length() {
        let chain = [
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 1.0),
        ];
        let ratios = chain_ratios(&chain).unwrap();
        assert_eq!(ratios, vec![0.0, 0.75, 1.0]);
    }

    #[test]
    fn zero_length_chain_is_rejected() {
        let chain = [Point2::new(2.0, 2.0), Point2::new(2.0, 2.0)];
        assert!(matches!(chain_ratios(&chain), Err(BuildError::TooLinear)));
    }

    #[test]
    fn direct_edge_becomes_a_single_constraint() {
        let points = vec![pair(0.0, 0.0, 0.0, 0.0), pair(10.0, 0.0, 20.0, 0.0)];
        let edges = vec![Edge {
            start_end: (0, 1),
            illst_nodes: vec![],
            merc_nodes: vec![],
        }];
        let (nodes, constraints) = expand_edges(&points, &edges).unwrap();
        assert!(nodes.is_empty());
        assert_eq!(constraints, vec![(0, 1)]);
    }

    #[test]
    fn matching_ratios_pair_waypoints_exactly() {
        // Both chains put their single waypoint at ratio 0.5.
        let points = vec![pair(0.0, 0.0, 0.0, 0.0), pair(10.0, 0.0, 20.0, 0.0)];
        let edges = vec![Edge {
            start_end: (0, 1),
            illst_nodes: vec![Point2::new(5.0, 0.0)],
            merc_nodes: vec![Point2::new(10.0, 0.0)],
        }];
        let (nodes, constraints) = expand_edges(&points, &edges).unwrap();
        assert_eq!(nodes, vec![pair(5.0, 0.0, 10.0, 0.0)]);
        // One synthetic node at registry position 2, chained to both ends.
        assert_eq!(constraints, vec![(0, 2), (2, 1)]);
    }

    #[test]
    fn unmatched_ratios_interpolate_the_other_chain() {
        let points = vec![pair(0.0, 0.0, 0.0, 0.0), pair(10.0, 0.0, 20.0, 0.0)];
        let edges = vec![Edge {
            start_end: (0, 1),
            illst_nodes: vec![Point2::new(2.5, 0.0)],
            merc_nodes: vec![Point2::new(15.0, 0.0)],
        }];
        let (nodes, constraints) = expand_edges(&points, &edges).unwrap();
        // Illustration waypoint at ratio 0.25 lands between geographic
        // nodes; geographic waypoint at 0.75 lands between illustration
        // nodes. Sorted by ratio.
        assert_eq!(
            nodes,
            vec![pair(2.5, 0.0, 5.0, 0.0), pair(7.5, 0.0, 15.0, 0.0)]
        );
        assert_eq!(constraints, vec![(0, 2), (2, 3), (3, 1)]);
    }

    #[test]
    fn edge_nodes_number_globally_across_edges() {
        let points = vec![
            pair(0.0, 0.0, 0.0, 0.0),
            pair(10.0, 0.0, 10.0, 0.0),
            pair(10.0, 10.0, 10.0, 10.0),
        ];
        let edges = vec![
            Edge {
                start_end: (0, 1),
                illst_nodes: vec![Point2::new(5.0, 0.0)],
                merc_nodes: vec![Point2::new(5.0, 0.0)],
            },
            Edge {
                start_end: (1, 2),
                illst_nodes: vec![Point2::new(10.0, 5.0)],
                merc_nodes: vec![Point2::new(10.0, 5.0)],
            },
        ];
        let (nodes, constraints) = expand_edges(&points, &edges).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(constraints, vec![(0, 3), (3, 1), (1, 4), (4, 2)]);
    }

    #[test]
    fn edge_to_a_missing_point_is_reported() {
        let points = vec![pair(0.0, 0.0, 0.0, 0.0)];
        let edges = vec![Edge {
            start_end: (0, 5),
            illst_nodes: vec![],
            merc_nodes: vec![],
        }];
        assert!(matches!(
            expand_edges(&points, &edges),
            Err(BuildError::EdgeReference(5))
        ));
    }

    #[test]
    fn margin_box_grows_five_percent_per_side() {
        let margin = MarginBox::new(Point2::new(0.0, 0.0), Point2::new(100.0, 40.0));
        assert_eq!(margin.minx, -5.0);
        assert_eq!(margin.maxx, 105.0);
        assert_eq!(margin.miny, -2.0);
        assert_eq!(margin.maxy, 42.0);
        assert_eq!(
            margin.orthant_corners(),
            [
                Point2::new(-5.0, -2.0),
                Point2::new(105.0, -2.0),
                Point2::new(-5.0, 42.0),
                Point2::new(105.0, 42.0),
            ]
        );
    }

    #[test]
    fn plain_mode_pools_all_orthants() {
        let centroid = pair(5.0, 5.0, 5.0, 5.0);
        let mut buf = ConvexBuf::default();
        // Identical spaces, vertices in only two orthants.
        buf.insert(pair(0.0, 0.0, 0.0, 0.0));
        buf.insert(pair(10.0, 10.0, 10.0, 10.0));
        let factors = orthant_factors(&buf, centroid, VertexMode::Plain).unwrap();
        assert_eq!(factors[0], factors[1]);
        assert_eq!(factors[1], factors[2]);
        assert_eq!(factors[2], factors[3]);
        // Identity mapping with the screen-down flip: scale 1.
        assert!((factors[0].0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn birdeye_mode_keeps_orthants_apart_when_all_are_filled() {
        let centroid = pair(5.0, 5.0, 5.0, 5.0);
        let mut buf = ConvexBuf::default();
        buf.insert(pair(0.0, 0.0, 0.0, 0.0));
        buf.insert(pair(10.0, 0.0, 12.0, 0.0));
        buf.insert(pair(0.0, 10.0, 0.0, 14.0));
        buf.insert(pair(10.0, 10.0, 10.0, 10.0));
        let split = orthant_factors(&buf, centroid, VertexMode::Birdeye).unwrap();
        let pooled = orthant_factors(&buf, centroid, VertexMode::Plain).unwrap();
        assert_ne!(split[0], split[1]);
        assert_eq!(pooled[0], pooled[3]);
    }

    #[test]
    fn axis_aligned_hull_vertices_cannot_scale() {
        let centroid = pair(5.0, 5.0, 5.0, 5.0);
        let mut buf = ConvexBuf::default();
        buf.insert(pair(0.0, 5.0, 0.0, 5.0));
        buf.insert(pair(10.0, 5.0, 10.0, 5.0));
        assert!(matches!(
            orthant_factors(&buf, centroid, VertexMode::Plain),
            Err(BuildError::TooLinear)
        ));
    }

    #[test]
    fn convex_buf_overwrites_in_place() {
        let mut buf = ConvexBuf::default();
        buf.insert(pair(1.0, 1.0, 2.0, 2.0));
        buf.insert(pair(3.0, 3.0, 4.0, 4.0));
        buf.insert(pair(1.0, 1.0, 9.0, 9.0));
        assert_eq!(buf.entries.len(), 2);
        assert_eq!(buf.entries[0], pair(1.0, 1.0, 9.0, 9.0));
        assert_eq!(buf.entries[1], pair(3.0, 3.0, 4.0, 4.0));
    }

    #[test]
    fn registry_ids_partition_by_section() {
        assert_eq!(registry_id(2, 4, 3), VertexId::Point(2));
        assert_eq!(registry_id(4, 4, 3), VertexId::EdgeNode(0));
        assert_eq!(registry_id(6, 4, 3), VertexId::EdgeNode(2));
        assert_eq!(registry_id(7, 4, 3), VertexId::Bbox(0));
        assert_eq!(registry_id(10, 4, 3), VertexId::Bbox(3));
    }

    #[test]
    fn follow_mode_negates_the_geographic_side() {
        let points = vec![pair(1.0, 2.0, 3.0, 4.0)];
        let adjusted = yaxis_points(&points, YaxisMode::Follow);
        assert_eq!(adjusted[0], pair(1.0, 2.0, 3.0, -4.0));
        let kept = yaxis_points(&points, YaxisMode::Invert);
        assert_eq!(kept[0], points[0]);

        let edges = vec![Edge {
            start_end: (0, 1),
            illst_nodes: vec![Point2::new(1.0, 1.0)],
            merc_nodes: vec![Point2::new(2.0, 2.0)],
        }];
        let adjusted = yaxis_edges(&edges, YaxisMode::Follow);
        assert_eq!(adjusted[0].illst_nodes[0], Point2::new(1.0, 1.0));
        assert_eq!(adjusted[0].merc_nodes[0], Point2::new(2.0, -2.0));
    }
}
