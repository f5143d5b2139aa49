//! Triangle storage shared by the build, repair and transform stages.

use std::collections::BTreeMap;

use crate::geom::{Point2, PointPair};

use super::id::VertexId;
use super::{Edge, StrictStatus, YaxisMode};

/// One triangle of the mesh, carrying both coordinate spaces.
///
/// `forw` holds the illustration-space corners, `bakw` the geographic
/// ones, in the same vertex order as `ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTriangle {
    pub ids: [VertexId; 3],
    pub forw: [Point2; 3],
    pub bakw: [Point2; 3],
}

impl MeshTriangle {
    #[must_use]
    pub fn new(ids: [VertexId; 3], forw: [Point2; 3], bakw: [Point2; 3]) -> Self {
        Self { ids, forw, bakw }
    }

    /// The same triangle with the two coordinate roles swapped.
    #[must_use]
    pub fn counter(&self) -> Self {
        Self {
            ids: self.ids,
            forw: self.bakw,
            bakw: self.forw,
        }
    }

    #[must_use]
    pub fn coords(&self, backward: bool) -> [Point2; 3] {
        if backward { self.bakw } else { self.forw }
    }

    /// Closed ring of the triangle in one coordinate space.
    #[must_use]
    pub fn ring(&self, backward: bool) -> [Point2; 4] {
        let corners = self.coords(backward);
        [corners[0], corners[1], corners[2], corners[0]]
    }

    /// Rotates the vertex order so that a triangle with two bounding-box
    /// corners leads with its remaining vertex.
    pub fn normalize_corner_order(&mut self) {
        let [a, b, c] = self.ids;
        if a.is_bbox() && b.is_bbox() {
            self.rotate(2);
        } else if c.is_bbox() && a.is_bbox() {
            self.rotate(1);
        }
    }

    fn rotate(&mut self, start: usize) {
        self.ids.rotate_left(start);
        self.forw.rotate_left(start);
        self.bakw.rotate_left(start);
    }
}

/// Stable handle into a [`TriangleArena`]. Stays valid across removals
/// of other triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriHandle(usize);

/// Append-only triangle store with tombstoned removal.
///
/// Iteration yields live triangles in insertion order, which the repair
/// pass and the compiled encoding both depend on.
#[derive(Debug, Clone, Default)]
pub struct TriangleArena {
    slots: Vec<Option<MeshTriangle>>,
}

impl TriangleArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triangle: MeshTriangle) -> TriHandle {
        self.slots.push(Some(triangle));
        TriHandle(self.slots.len() - 1)
    }

    pub fn remove(&mut self, handle: TriHandle) -> Option<MeshTriangle> {
        self.slots.get_mut(handle.0).and_then(Option::take)
    }

    #[must_use]
    pub fn get(&self, handle: TriHandle) -> Option<&MeshTriangle> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriHandle, &MeshTriangle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|tri| (TriHandle(index), tri)))
    }

    pub fn triangles(&self) -> impl Iterator<Item = &MeshTriangle> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

impl FromIterator<MeshTriangle> for TriangleArena {
    fn from_iter<I: IntoIterator<Item = MeshTriangle>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().map(Some).collect(),
        }
    }
}

/// Key under which triangles are grouped for the consistency scan:
/// either a shared (sorted) edge or the full sorted vertex triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriKey {
    Edge(VertexId, VertexId),
    Tri(VertexId, VertexId, VertexId),
}

impl TriKey {
    #[must_use]
    pub fn edge(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Self::Edge(a, b)
        } else {
            Self::Edge(b, a)
        }
    }

    #[must_use]
    pub fn tri(ids: [VertexId; 3]) -> Self {
        let mut sorted = ids;
        sorted.sort_unstable();
        Self::Tri(sorted[0], sorted[1], sorted[2])
    }
}

/// The four keys a triangle registers under: its three edges plus the
/// vertex triple itself.
#[must_use]
pub fn search_keys(ids: [VertexId; 3]) -> [TriKey; 4] {
    [
        TriKey::edge(ids[0], ids[1]),
        TriKey::edge(ids[1], ids[2]),
        TriKey::edge(ids[0], ids[2]),
        TriKey::tri(ids),
    ]
}

/// Edge- and triple-keyed lookup over arena handles, kept in step with
/// the arena during repair. Handles stay in insertion order per key.
#[derive(Debug, Default)]
pub struct SearchIndex {
    map: BTreeMap<TriKey, Vec<TriHandle>>,
}

impl SearchIndex {
    #[must_use]
    pub fn build(arena: &TriangleArena) -> Self {
        let mut index = Self::default();
        for (handle, triangle) in arena.iter() {
            index.insert(handle, triangle.ids);
        }
        index
    }

    pub fn insert(&mut self, handle: TriHandle, ids: [VertexId; 3]) {
        for key in search_keys(ids) {
            self.map.entry(key).or_default().push(handle);
        }
    }

    pub fn remove(&mut self, handle: TriHandle, ids: [VertexId; 3]) {
        for key in search_keys(ids) {
            if let Some(handles) = self.map.get_mut(&key) {
                handles.retain(|other| *other != handle);
                if handles.is_empty() {
                    self.map.remove(&key);
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &TriKey) -> &[TriHandle] {
        self.map.get(key).map_or(&[], Vec::as_slice)
    }

    /// Keys in sorted order, for a deterministic scan.
    pub fn keys(&self) -> impl Iterator<Item = &TriKey> {
        self.map.keys()
    }
}

/// Angular fan parameters around the centroid, used when a query point
/// falls outside every mesh triangle.
#[derive(Debug, Clone)]
pub struct VerticesParams {
    pub forw_radians: [f64; 4],
    pub bakw_radians: [f64; 4],
    pub sectors: [MeshTriangle; 4],
}

/// Per-vertex scale correction applied by the barycentric transform.
#[derive(Debug, Clone, Default)]
pub struct WeightBuffer {
    pub forw: BTreeMap<VertexId, f64>,
    pub bakw: BTreeMap<VertexId, f64>,
}

/// Self-intersection points found in either triangulated surface.
#[derive(Debug, Clone, Default)]
pub struct Kinks {
    pub forw: Vec<Point2>,
    pub bakw: Vec<Point2>,
}

/// Everything a finished build produces. The facade swaps a fresh state
/// in atomically, so a failed rebuild leaves the previous mesh intact.
#[derive(Debug, Clone)]
pub struct MeshState {
    /// Control points with the axis convention already applied.
    pub points: Vec<PointPair>,
    pub edges: Vec<Edge>,
    pub edge_nodes: Vec<PointPair>,
    pub centroid: PointPair,
    /// Expanded bounding-box corners in ring order.
    pub corners: [PointPair; 4],
    /// Forward mesh; backward coordinates ride along on each triangle.
    pub arena: TriangleArena,
    /// Independent backward mesh, present once the state went loose.
    pub bakw_tris: Option<Vec<MeshTriangle>>,
    pub vparams: VerticesParams,
    pub weights: WeightBuffer,
    pub status: StrictStatus,
    pub kinks: Kinks,
    pub yaxis: YaxisMode,
    pub bounds: Option<Vec<Point2>>,
    pub xy: Point2,
    pub wh: Option<Point2>,
}

impl MeshState {
    /// Both-space coordinates of a registry vertex.
    #[must_use]
    pub fn registry_pair(&self, id: VertexId) -> Option<PointPair> {
        match id {
            VertexId::Point(index) => self.points.get(index).copied(),
            VertexId::EdgeNode(index) => self.edge_nodes.get(index).copied(),
            VertexId::Bbox(index) => self.corners.get(usize::from(index)).copied(),
            VertexId::Centroid => Some(self.centroid),
        }
    }
}
