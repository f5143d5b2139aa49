//! Portable compiled form of a built mesh.
//!
//! The compact layout stores control points once and refers to them by
//! vertex identifier everywhere else, which keeps documents small. Two
//! generations of documents ingest through the same type: the compact
//! layout round-trips as-is, while the older GeoJSON-based layout is
//! converted to compact form on deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::geom::{Point2, PointPair};

use super::id::VertexId;
use super::mesh::{Kinks, MeshState, MeshTriangle, TriangleArena, VerticesParams, WeightBuffer};
use super::{Edge, StrictStatus, YaxisMode};

/// Why a compiled document could not be produced or restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompiledError {
    /// The facade holds no built mesh to compile.
    #[error("no mesh state is available to compile")]
    NoMesh,
    /// The document carries no usable triangle lists.
    #[error("compiled document carries no usable triangle lists")]
    Malformed,
    /// A vertex reference is neither an index nor a known identifier.
    #[error("unrecognized vertex identifier `{0}`")]
    UnknownIdentifier(String),
    /// A vertex index points past the document's own registry.
    #[error("vertex index {0} is outside the compiled registry")]
    IndexOutOfRange(usize),
}

/// A mesh in its serialized-friendly shape.
///
/// Obtained from [`Tin::compiled`](super::Tin::compiled) or by
/// deserializing a stored document; feed it back through
/// [`Tin::set_compiled`](super::Tin::set_compiled).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompiledTin {
    fields: CompactFields,
}

impl<'de> Deserialize<'de> for CompiledTin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawDoc::deserialize(deserializer)? {
            RawDoc::Compact(fields) => Ok(Self { fields }),
            RawDoc::Legacy(doc) => {
                let state = decode_legacy(&doc).map_err(serde::de::Error::custom)?;
                Ok(encode(&state))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDoc {
    Compact(CompactFields),
    Legacy(Box<LegacyDoc>),
}

/// A vertex reference as it appears on the wire: control points are
/// bare numbers, everything else is a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum RawId {
    Index(u64),
    Name(String),
}

impl From<VertexId> for RawId {
    fn from(id: VertexId) -> Self {
        match id {
            VertexId::Point(index) => Self::Index(index as u64),
            other => Self::Name(other.to_string()),
        }
    }
}

fn vertex_id(raw: &RawId) -> Result<VertexId, CompiledError> {
    match raw {
        RawId::Index(value) => usize::try_from(*value)
            .map(VertexId::Point)
            .map_err(|_| CompiledError::UnknownIdentifier(value.to_string())),
        RawId::Name(text) => text
            .parse()
            .map_err(|_| CompiledError::UnknownIdentifier(text.clone())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct WeightBufferRepr {
    #[serde(default)]
    forw: BTreeMap<VertexId, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    bakw: BTreeMap<VertexId, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompactFields {
    points: Vec<PointPair>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(rename = "edgeNodes", default)]
    edge_nodes: Vec<PointPair>,
    #[serde(default)]
    weight_buffer: WeightBufferRepr,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict_status: Option<StrictStatus>,
    centroid_point: PointPair,
    /// Corner bearings around the centroid, forward then backward.
    vertices_params: [[f64; 4]; 2],
    vertices_points: [PointPair; 4],
    /// Vertex triples of the forward mesh, plus the backward mesh when
    /// the state is loose.
    tins_points: Vec<Vec<[RawId; 3]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kinks_points: Option<Vec<Point2>>,
    #[serde(rename = "yaxisMode", skip_serializing_if = "Option::is_none")]
    yaxis_mode: Option<YaxisMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<Vec<Point2>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xy: Option<Point2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wh: Option<Point2>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

pub fn encode(state: &MeshState) -> CompiledTin {
    let mut tins_points = vec![triples_of(state.arena.triangles())];
    let mut kinks_points = None;
    match state.status {
        StrictStatus::Strict => {}
        StrictStatus::Loose => {
            if let Some(tris) = &state.bakw_tris {
                tins_points.push(triples_of(tris.iter()));
            }
        }
        StrictStatus::StrictError => {
            kinks_points = Some(state.kinks.bakw.clone());
        }
    }

    CompiledTin {
        fields: CompactFields {
            points: state.points.clone(),
            edges: state.edges.clone(),
            edge_nodes: state.edge_nodes.clone(),
            weight_buffer: WeightBufferRepr {
                forw: state.weights.forw.clone(),
                bakw: state.weights.bakw.clone(),
            },
            strict_status: Some(state.status),
            centroid_point: state.centroid,
            vertices_params: [state.vparams.forw_radians, state.vparams.bakw_radians],
            vertices_points: state.corners,
            tins_points,
            kinks_points,
            yaxis_mode: (state.yaxis == YaxisMode::Follow).then_some(YaxisMode::Follow),
            bounds: state.bounds.clone(),
            // The extent origin travels only alongside a bounds polygon;
            // extent-only states always sit at the origin.
            xy: state.bounds.is_some().then_some(state.xy),
            wh: state.wh,
        },
    }
}

fn triples_of<'a, I>(tris: I) -> Vec<[RawId; 3]>
where
    I: Iterator<Item = &'a MeshTriangle>,
{
    tris.map(|tri| tri.ids.map(RawId::from)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

pub fn decode(compiled: &CompiledTin) -> Result<MeshState, CompiledError> {
    let fields = &compiled.fields;
    if fields.tins_points.is_empty() || fields.tins_points.len() > 2 {
        return Err(CompiledError::Malformed);
    }

    let arena: TriangleArena = fields.tins_points[0]
        .iter()
        .map(|triple| triangle_from(fields, triple))
        .collect::<Result<_, _>>()?;
    let bakw_tris = if fields.tins_points.len() == 2 {
        Some(
            fields.tins_points[1]
                .iter()
                .map(|triple| triangle_from(fields, triple))
                .collect::<Result<_, _>>()?,
        )
    } else {
        None
    };

    let status = match fields.strict_status {
        Some(status) => status,
        None if fields.kinks_points.is_some() => StrictStatus::StrictError,
        None if fields.tins_points.len() == 2 => StrictStatus::Loose,
        None => StrictStatus::Strict,
    };

    let (bounds, xy, wh) = match &fields.bounds {
        Some(ring) => {
            let (origin, extent) = ring_extent(ring);
            (
                Some(ring.clone()),
                fields.xy.unwrap_or(origin),
                Some(fields.wh.unwrap_or(extent)),
            )
        }
        None => (None, Point2::ZERO, fields.wh),
    };

    Ok(MeshState {
        points: fields.points.clone(),
        edges: fields.edges.clone(),
        edge_nodes: fields.edge_nodes.clone(),
        centroid: fields.centroid_point,
        corners: fields.vertices_points,
        arena,
        bakw_tris,
        vparams: VerticesParams {
            forw_radians: fields.vertices_params[0],
            bakw_radians: fields.vertices_params[1],
            sectors: sectors_from(fields.centroid_point, &fields.vertices_points),
        },
        weights: WeightBuffer {
            forw: fields.weight_buffer.forw.clone(),
            bakw: fields.weight_buffer.bakw.clone(),
        },
        status,
        kinks: Kinks {
            forw: Vec::new(),
            bakw: fields.kinks_points.clone().unwrap_or_default(),
        },
        yaxis: fields.yaxis_mode.unwrap_or(YaxisMode::Invert),
        bounds,
        xy,
        wh,
    })
}

fn pair_for(fields: &CompactFields, id: VertexId) -> Result<PointPair, CompiledError> {
    match id {
        VertexId::Point(index) => fields
            .points
            .get(index)
            .copied()
            .ok_or(CompiledError::IndexOutOfRange(index)),
        VertexId::EdgeNode(index) => fields
            .edge_nodes
            .get(index)
            .copied()
            .ok_or(CompiledError::IndexOutOfRange(index)),
        VertexId::Bbox(index) => Ok(fields.vertices_points[usize::from(index)]),
        VertexId::Centroid => Ok(fields.centroid_point),
    }
}

fn triangle_from(fields: &CompactFields, triple: &[RawId; 3]) -> Result<MeshTriangle, CompiledError> {
    let mut ids = [VertexId::Centroid; 3];
    let mut forw = [Point2::ZERO; 3];
    let mut bakw = [Point2::ZERO; 3];
    for (slot, raw) in triple.iter().enumerate() {
        let id = vertex_id(raw)?;
        let pair = pair_for(fields, id)?;
        ids[slot] = id;
        forw[slot] = pair.forw;
        bakw[slot] = pair.bakw;
    }
    Ok(MeshTriangle::new(ids, forw, bakw))
}

fn sectors_from(centroid: PointPair, corners: &[PointPair; 4]) -> [MeshTriangle; 4] {
    std::array::from_fn(|i| {
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
    })
}

fn ring_extent(ring: &[Point2]) -> (Point2, Point2) {
    let first = ring.first().copied().unwrap_or(Point2::ZERO);
    let mut min = first;
    let mut max = first;
    for p in ring {
        min = Point2::new(min.x.min(p.x), min.y.min(p.y));
        max = Point2::new(max.x.max(p.x), max.y.max(p.y));
    }
    (min, max - min)
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy GeoJSON documents
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LegacyDoc {
    tins: LegacyTins,
    strict_status: Option<StrictStatus>,
    #[serde(default)]
    weight_buffer: WeightBufferRepr,
    vertices_params: LegacyVerticesParams,
    centroid: LegacyCentroid,
    kinks: Option<LegacyKinks>,
}

#[derive(Deserialize)]
struct LegacyTins {
    forw: LegacyCollection<TriangleFeature>,
    bakw: LegacyCollection<TriangleFeature>,
}

#[derive(Deserialize)]
struct LegacyCollection<F> {
    features: Vec<F>,
}

#[derive(Deserialize)]
struct TriangleFeature {
    geometry: PolygonGeometry,
    properties: TriangleProps,
}

#[derive(Deserialize)]
struct PolygonGeometry {
    coordinates: Vec<Vec<Point2>>,
}

#[derive(Deserialize)]
struct TriangleProps {
    a: VertexProp,
    b: VertexProp,
    c: VertexProp,
}

#[derive(Deserialize)]
struct VertexProp {
    geom: Point2,
    index: RawId,
}

#[derive(Deserialize)]
struct LegacyVerticesParams {
    forw: LegacyDirectionParams,
    bakw: LegacyDirectionParams,
}

#[derive(Deserialize)]
struct LegacyDirectionParams([f64; 4], Vec<LegacyCollection<TriangleFeature>>);

#[derive(Deserialize)]
struct LegacyCentroid {
    forw: PointFeature,
}

#[derive(Deserialize)]
struct PointFeature {
    geometry: PointGeometry,
    properties: PointProps,
}

#[derive(Deserialize)]
struct PointGeometry {
    coordinates: Point2,
}

#[derive(Deserialize)]
struct PointProps {
    target: TargetProp,
}

#[derive(Deserialize)]
struct TargetProp {
    geom: Point2,
}

#[derive(Deserialize)]
struct LegacyKinks {
    #[serde(default)]
    forw: Option<LegacyCollection<BareFeature>>,
    #[serde(default)]
    bakw: Option<LegacyCollection<BareFeature>>,
}

#[derive(Deserialize)]
struct BareFeature {
    geometry: PointGeometry,
}

/// Converts a triangle feature. The geometry ring carries the feature's
/// own space; the per-vertex properties carry the counter space.
fn legacy_triangle(feature: &TriangleFeature, backward: bool) -> Result<MeshTriangle, CompiledError> {
    let ring = feature
        .geometry
        .coordinates
        .first()
        .ok_or(CompiledError::Malformed)?;
    if ring.len() < 3 {
        return Err(CompiledError::Malformed);
    }
    let props = [
        &feature.properties.a,
        &feature.properties.b,
        &feature.properties.c,
    ];
    let mut ids = [VertexId::Centroid; 3];
    let mut local = [Point2::ZERO; 3];
    let mut counter = [Point2::ZERO; 3];
    for slot in 0..3 {
        ids[slot] = vertex_id(&props[slot].index)?;
        local[slot] = ring[slot];
        counter[slot] = props[slot].geom;
    }
    Ok(if backward {
        MeshTriangle::new(ids, counter, local)
    } else {
        MeshTriangle::new(ids, local, counter)
    })
}

fn decode_legacy(doc: &LegacyDoc) -> Result<MeshState, CompiledError> {
    let forw_tris: Vec<MeshTriangle> = doc
        .tins
        .forw
        .features
        .iter()
        .map(|f| legacy_triangle(f, false))
        .collect::<Result<_, _>>()?;
    let bakw_tris: Vec<MeshTriangle> = doc
        .tins
        .bakw
        .features
        .iter()
        .map(|f| legacy_triangle(f, true))
        .collect::<Result<_, _>>()?;

    // Control points and synthetic edge nodes only survive inside the
    // triangle properties; gather them back into dense arrays.
    let mut points: Vec<Option<PointPair>> = Vec::new();
    let mut edge_nodes: Vec<Option<PointPair>> = Vec::new();
    for tri in &forw_tris {
        for slot in 0..3 {
            let pair = PointPair::new(tri.forw[slot], tri.bakw[slot]);
            match tri.ids[slot] {
                VertexId::Point(index) => store_sparse(&mut points, index, pair),
                VertexId::EdgeNode(index) => store_sparse(&mut edge_nodes, index, pair),
                VertexId::Bbox(_) | VertexId::Centroid => {}
            }
        }
    }
    let points: Vec<PointPair> = points
        .into_iter()
        .map(|slot| slot.unwrap_or(PointPair::new(Point2::ZERO, Point2::ZERO)))
        .collect();
    let edge_nodes: Vec<PointPair> = edge_nodes
        .into_iter()
        .map(|slot| slot.unwrap_or(PointPair::new(Point2::ZERO, Point2::ZERO)))
        .collect();

    // The corner pairs sit at the `b` vertex of each sector triangle.
    let sectors = &doc.vertices_params.forw.1;
    if sectors.len() < 4 || doc.vertices_params.bakw.1.len() < 4 {
        return Err(CompiledError::Malformed);
    }
    let mut corners = [PointPair::new(Point2::ZERO, Point2::ZERO); 4];
    for (slot, collection) in corners.iter_mut().zip(sectors.iter()) {
        let feature = collection.features.first().ok_or(CompiledError::Malformed)?;
        let tri = legacy_triangle(feature, false)?;
        *slot = PointPair::new(tri.forw[1], tri.bakw[1]);
    }

    let centroid = PointPair::new(
        doc.centroid.forw.geometry.coordinates,
        doc.centroid.forw.properties.target.geom,
    );

    let kink_coords = |collection: &Option<LegacyCollection<BareFeature>>| {
        collection.as_ref().map_or_else(Vec::new, |c| {
            c.features.iter().map(|f| f.geometry.coordinates).collect()
        })
    };
    let kinks = doc.kinks.as_ref().map_or_else(Kinks::default, |k| Kinks {
        forw: kink_coords(&k.forw),
        bakw: kink_coords(&k.bakw),
    });

    let status = match doc.strict_status {
        Some(status) => status,
        None if !kinks.bakw.is_empty() || !kinks.forw.is_empty() => StrictStatus::StrictError,
        None if same_triples(&forw_tris, &bakw_tris) => StrictStatus::Strict,
        None => StrictStatus::Loose,
    };

    Ok(MeshState {
        points,
        edges: Vec::new(),
        edge_nodes,
        centroid,
        corners,
        arena: forw_tris.into_iter().collect(),
        bakw_tris: Some(bakw_tris),
        vparams: VerticesParams {
            forw_radians: doc.vertices_params.forw.0,
            bakw_radians: doc.vertices_params.bakw.0,
            sectors: sectors_from(centroid, &corners),
        },
        weights: WeightBuffer {
            forw: doc.weight_buffer.forw.clone(),
            bakw: doc.weight_buffer.bakw.clone(),
        },
        status,
        kinks,
        yaxis: YaxisMode::Invert,
        bounds: None,
        xy: Point2::ZERO,
        wh: None,
    })
}

fn store_sparse(slots: &mut Vec<Option<PointPair>>, index: usize, pair: PointPair) {
    if slots.len() <= index {
        slots.resize(index + 1, None);
    }
    slots[index] = Some(pair);
}

fn same_triples(a: &[MeshTriangle], b: &[MeshTriangle]) -> bool {
    let key = |tris: &[MeshTriangle]| {
        let mut keys: Vec<[VertexId; 3]> = tris
            .iter()
            .map(|tri| {
                let mut ids = tri.ids;
                ids.sort_unstable();
                ids
            })
            .collect();
        keys.sort_unstable();
        keys
    };
    key(a) == key(b)
}
