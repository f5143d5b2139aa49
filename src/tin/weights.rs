//! Per-vertex scale weights derived from mesh edge-length ratios.
//!
//! Every mesh edge relates a length in one space to a length in the
//! other; a vertex's weight is the mean ratio over its incident edges.
//! The barycentric transform uses these to damp distortion near
//! vertices whose neighborhoods scale very differently.

use std::collections::{BTreeMap, HashSet};

use super::StrictStatus;
use super::id::VertexId;
use super::mesh::{MeshState, MeshTriangle, TriKey, WeightBuffer};

/// Fills `state.weights` for the directions the current status allows.
///
/// Forward weights always come from the forward mesh. Backward weights
/// are reciprocals when the surfaces are strictly consistent, come from
/// the independent backward mesh when loose, and stay absent entirely
/// when the state carries kinks.
pub fn calculate(state: &mut MeshState) {
    let mut buffer = WeightBuffer {
        forw: direction_weights(state.arena.triangles(), false),
        bakw: BTreeMap::new(),
    };
    match state.status {
        StrictStatus::Strict => {
            buffer.bakw = buffer
                .forw
                .iter()
                .map(|(id, weight)| (*id, 1.0 / weight))
                .collect();
        }
        StrictStatus::Loose => {
            if let Some(tris) = &state.bakw_tris {
                buffer.bakw = direction_weights(tris.iter(), true);
            }
        }
        StrictStatus::StrictError => {}
    }
    state.weights = buffer;
}

fn direction_weights<'a, I>(tris: I, backward: bool) -> BTreeMap<VertexId, f64>
where
    I: Iterator<Item = &'a MeshTriangle>,
{
    let mut sums: BTreeMap<VertexId, (f64, f64)> = BTreeMap::new();
    let mut checked: HashSet<TriKey> = HashSet::new();

    for tri in tris {
        let local = tri.coords(backward);
        let counter = tri.coords(!backward);
        for i in 0..3 {
            let j = (i + 1) % 3;
            let key = TriKey::edge(tri.ids[i], tri.ids[j]);
            if !checked.insert(key) {
                continue;
            }
            let weight = counter[i].distance(counter[j]) / local[i].distance(local[j]);
            for id in [tri.ids[i], tri.ids[j]] {
                let entry = sums.entry(id).or_insert((0.0, 0.0));
                entry.0 += weight;
                entry.1 += 1.0;
            }
        }
    }

    let mut weights: BTreeMap<VertexId, f64> = sums
        .into_iter()
        .map(|(id, (total, count))| (id, total / count))
        .collect();

    // The centroid sits in no mesh triangle; it inherits the mean of the
    // four bounding-box corners.
    let corners: [f64; 4] = std::array::from_fn(|i| {
        weights
            .get(&VertexId::Bbox(i as u8))
            .copied()
            .unwrap_or(1.0)
    });
    weights.insert(VertexId::Centroid, corners.iter().sum::<f64>() / 4.0);
    weights
}
