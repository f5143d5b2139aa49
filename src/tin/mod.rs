//! The [`Tin`] facade: staged inputs, the build pipeline, and point
//! queries over the finished mesh.

mod builder;
mod compiled;
mod id;
mod mesh;
mod repair;
mod transform;
mod weights;

pub use compiled::{CompiledError, CompiledTin};
pub use id::{ParseVertexIdError, VertexId};
pub use transform::TransformError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{Point2, PointPair};

use mesh::MeshState;

// ───────────────────────────── mode switches ────────────────────────────

/// How much mutual consistency [`Tin::update`] demands between the two
/// triangulated directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictMode {
    /// Keep the counter-derived backward mesh even when it folds over
    /// itself; backward queries are then refused.
    Strict,
    /// Try strict first, rebuild the backward mesh independently when
    /// folds remain.
    #[default]
    Auto,
    /// Triangulate both directions independently from the start.
    Loose,
}

/// The consistency level a finished mesh actually reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictStatus {
    /// Forward and backward meshes are mutual counters, fold-free.
    Strict,
    /// The counter mesh folds; the recorded kinks mark where. Backward
    /// queries are refused in this state.
    StrictError,
    /// The backward mesh is an independent triangulation.
    Loose,
}

/// Orientation of the geographic y axis relative to the illustration's
/// screen-down axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YaxisMode {
    /// Geographic y grows the same way as illustration y. Coordinates
    /// are stored with y negated so the two spaces stay mirror-aligned.
    Follow,
    /// Geographic y grows opposite to illustration y (map-style data).
    #[default]
    Invert,
}

/// How bounding-box extrapolation treats the four orthants around the
/// centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexMode {
    /// One pooled scale/rotation estimate shared by all four corners.
    #[default]
    Plain,
    /// Per-orthant estimates, used when every orthant holds at least
    /// one hull vertex.
    Birdeye,
}

// ─────────────────────────────── inputs ────────────────────────────────

/// A known correspondence line between two control points, optionally
/// threaded through waypoints in both spaces.
///
/// Waypoints run start to end with the endpoints themselves excluded.
/// Field names follow the historical document spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Indices of the two control points the edge connects.
    #[serde(rename = "startEnd")]
    pub start_end: (usize, usize),
    /// Waypoints in illustration space.
    #[serde(rename = "illstNodes", default)]
    pub illst_nodes: Vec<Point2>,
    /// Waypoints in geographic space.
    #[serde(rename = "mercNodes", default)]
    pub merc_nodes: Vec<Point2>,
}

/// Why a mesh build was abandoned. A failed build never touches the
/// previously built mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A control point's illustration coordinate lies outside the
    /// bounding shape.
    #[error("control point {index} lies outside the map bounds")]
    OutOfBounds { index: usize },
    /// Neither a bounds polygon nor an extent rectangle has been set.
    #[error("no extent is set; provide bounds or a width/height first")]
    MissingExtent,
    /// The point set is too degenerate to triangulate or extrapolate
    /// from.
    #[error("point set is too linear to form a mesh")]
    TooLinear,
    /// Two required edges cross each other.
    #[error("required edge {start}-{end} crosses an earlier one")]
    ConstraintConflict { start: usize, end: usize },
    /// The repair pass met a triangle pairing it cannot resolve.
    #[error("mesh repair hit an inconsistent triangle pairing")]
    InconsistentRepair,
    /// An edge references a control point index that does not exist.
    #[error("edge references missing control point {0}")]
    EdgeReference(usize),
}

// ─────────────────────────────── facade ────────────────────────────────

/// Bidirectional piecewise-affine map between an illustration plane and
/// geographic space, built from paired control points.
///
/// Setters only stage inputs; [`update`](Self::update) builds the mesh
/// the transforms run on. A built mesh serializes with
/// [`compiled`](Self::compiled) and restores with
/// [`set_compiled`](Self::set_compiled).
#[derive(Debug, Clone)]
pub struct Tin {
    points: Vec<PointPair>,
    edges: Vec<Edge>,
    bounds: Option<Vec<Point2>>,
    xy: Point2,
    wh: Option<Point2>,
    strict_mode: StrictMode,
    vertex_mode: VertexMode,
    yaxis_mode: YaxisMode,
    state: Option<MeshState>,
}

impl Tin {
    #[must_use]
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            edges: Vec::new(),
            bounds: None,
            xy: Point2::ZERO,
            wh: None,
            strict_mode: StrictMode::default(),
            vertex_mode: VertexMode::default(),
            yaxis_mode: YaxisMode::default(),
            state: None,
        }
    }

    /// Replaces the staged control points. Takes effect at the next
    /// [`update`](Self::update).
    pub fn set_points(&mut self, points: Vec<PointPair>) {
        self.points = points;
    }

    /// Replaces the staged correspondence edges.
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    /// Sets a polygon bounding shape, given as an open ring of
    /// illustration coordinates. The extent rectangle is derived from
    /// the ring's bounding box, and the vertex mode reverts to plain,
    /// which a polygon-bounded map requires.
    pub fn set_bounds(&mut self, bounds: Vec<Point2>) {
        if let Some(first) = bounds.first() {
            let mut min = *first;
            let mut max = *first;
            for p in &bounds[1..] {
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
            self.xy = min;
            self.wh = Some(max - min);
        }
        self.bounds = Some(bounds);
        self.vertex_mode = VertexMode::Plain;
    }

    /// Sets a rectangular extent: `origin` is the minimum corner and
    /// `size` the width/height. Clears any bounds polygon.
    pub fn set_extent(&mut self, origin: Point2, size: Point2) {
        self.xy = origin;
        self.wh = Some(size);
        self.bounds = None;
    }

    pub fn set_strict_mode(&mut self, mode: StrictMode) {
        self.strict_mode = mode;
    }

    pub fn set_vertex_mode(&mut self, mode: VertexMode) {
        self.vertex_mode = mode;
    }

    pub fn set_yaxis_mode(&mut self, mode: YaxisMode) {
        self.yaxis_mode = mode;
    }

    /// Rebuilds the mesh from the staged inputs and returns the
    /// consistency status it reached.
    ///
    /// The new mesh replaces the previous one only when every stage
    /// succeeds; on error the previous mesh, if any, stays queryable.
    pub fn update(&mut self) -> Result<StrictStatus, BuildError> {
        let (mut state, constraints) = builder::build(self)?;
        if self.strict_mode == StrictMode::Loose {
            builder::build_loose_backward(&mut state, &constraints)?;
        } else {
            repair::run(&mut state, &constraints)?;
            if self.strict_mode == StrictMode::Auto && state.status == StrictStatus::StrictError {
                log::warn!(
                    "backward mesh keeps {} kinks after repair, rebuilding loose",
                    state.kinks.bakw.len()
                );
                builder::build_loose_backward(&mut state, &constraints)?;
            }
        }
        weights::calculate(&mut state);
        let status = state.status;
        self.state = Some(state);
        log::debug!("mesh updated with status {:?}", status);
        Ok(status)
    }

    /// Maps a point through the built mesh. Forward goes illustration
    /// to geographic; `backward` the other way. `ignore_bounds` lifts
    /// the bounds-polygon checks.
    pub fn transform(
        &self,
        point: Point2,
        backward: bool,
        ignore_bounds: bool,
    ) -> Result<Point2, TransformError> {
        let state = self.state.as_ref().ok_or(TransformError::NoMesh)?;
        transform::apply(state, point, backward, ignore_bounds)
    }

    /// Consistency status of the current mesh, if one has been built.
    #[must_use]
    pub fn strict_status(&self) -> Option<StrictStatus> {
        self.state.as_ref().map(|state| state.status)
    }

    /// Encodes the built mesh as a compact document.
    pub fn compiled(&self) -> Result<CompiledTin, CompiledError> {
        let state = self.state.as_ref().ok_or(CompiledError::NoMesh)?;
        Ok(compiled::encode(state))
    }

    /// Restores a mesh from a compiled document and stages its inputs,
    /// so a later [`update`](Self::update) rebuilds from the same data.
    ///
    /// Returns the normalized compact encoding of whatever was
    /// restored, which for historical GeoJSON-shaped documents differs
    /// from the input.
    pub fn set_compiled(&mut self, document: CompiledTin) -> Result<CompiledTin, CompiledError> {
        let state = compiled::decode(&document)?;
        let normalized = compiled::encode(&state);

        // Internal storage negates geographic y in follow mode; the
        // staged inputs hold what the caller would have supplied.
        match state.yaxis {
            YaxisMode::Invert => {
                self.points = state.points.clone();
                self.edges = state.edges.clone();
            }
            YaxisMode::Follow => {
                self.points = state
                    .points
                    .iter()
                    .map(|pair| PointPair::new(pair.forw, Point2::new(pair.bakw.x, -pair.bakw.y)))
                    .collect();
                self.edges = state
                    .edges
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
                    .collect();
            }
        }
        self.bounds = state.bounds.clone();
        self.xy = state.xy;
        self.wh = state.wh;
        self.yaxis_mode = state.yaxis;
        if self.bounds.is_some() {
            self.vertex_mode = VertexMode::Plain;
        }
        self.state = Some(state);
        Ok(normalized)
    }
}

impl Default for Tin {
    fn default() -> Self {
        Self::new()
    }
}
