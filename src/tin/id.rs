//! Stable identifiers for triangulation vertices.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifies one vertex of the shared triangulation.
///
/// The derived ordering (control points, then edge nodes, then corners,
/// then the centroid) is what search keys sort by, so the variant order
/// here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexId {
    /// Control point, by position in the point registry.
    Point(usize),
    /// Interpolated node generated along a correspondence edge.
    EdgeNode(usize),
    /// Expanded bounding-box corner, counter-clockwise from the minimum corner.
    Bbox(u8),
    /// Centroid of the control points.
    Centroid,
}

impl VertexId {
    #[must_use]
    pub fn is_point(self) -> bool {
        matches!(self, Self::Point(_))
    }

    #[must_use]
    pub fn is_bbox(self) -> bool {
        matches!(self, Self::Bbox(_))
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point(index) => write!(f, "{index}"),
            Self::EdgeNode(index) => write!(f, "edgeNode{index}"),
            Self::Bbox(index) => write!(f, "bbox{index}"),
            Self::Centroid => f.write_str("cent"),
        }
    }
}

/// Error returned when a serialized vertex identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized vertex identifier `{0}`")]
pub struct ParseVertexIdError(String);

impl FromStr for VertexId {
    type Err = ParseVertexIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "cent" {
            return Ok(Self::Centroid);
        }
        if let Some(rest) = s.strip_prefix("bbox") {
            return match rest.parse::<u8>() {
                Ok(index) if index < 4 => Ok(Self::Bbox(index)),
                _ => Err(ParseVertexIdError(s.to_owned())),
            };
        }
        if let Some(rest) = s.strip_prefix("edgeNode") {
            return rest
                .parse()
                .map(Self::EdgeNode)
                .map_err(|_| ParseVertexIdError(s.to_owned()));
        }
        s.parse()
            .map(Self::Point)
            .map_err(|_| ParseVertexIdError(s.to_owned()))
    }
}

// Control points serialize as bare numbers, every other vertex as its
// identifier string. Map keys always come back as strings, so numeric
// strings parse as control points on the way in.
impl Serialize for VertexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Point(index) => serializer.serialize_u64(*index as u64),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for VertexId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = VertexId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a vertex index or identifier string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<VertexId, E> {
                usize::try_from(value)
                    .map(VertexId::Point)
                    .map_err(|_| E::custom(format!("vertex index {value} out of range")))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<VertexId, E> {
                usize::try_from(value)
                    .map(VertexId::Point)
                    .map_err(|_| E::custom(format!("vertex index {value} out of range")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<VertexId, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::VertexId;

    #[test]
    fn ordering_groups_variants() {
        let mut ids = vec![
            VertexId::Centroid,
            VertexId::Bbox(0),
            VertexId::EdgeNode(2),
            VertexId::Point(7),
            VertexId::Point(1),
            VertexId::EdgeNode(0),
            VertexId::Bbox(3),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                VertexId::Point(1),
                VertexId::Point(7),
                VertexId::EdgeNode(0),
                VertexId::EdgeNode(2),
                VertexId::Bbox(0),
                VertexId::Bbox(3),
                VertexId::Centroid,
            ]
        );
    }

    #[test]
    fn display_and_parse_round_trip() {
        for id in [
            VertexId::Point(12),
            VertexId::EdgeNode(3),
            VertexId::Bbox(0),
            VertexId::Bbox(3),
            VertexId::Centroid,
        ] {
            assert_eq!(id.to_string().parse::<VertexId>().unwrap(), id);
        }
    }

    #[test]
    fn parse_rejects_malformed_identifiers() {
        for text in ["bbox4", "bbox", "edgeNode", "-1", "1.5", "center", ""] {
            assert!(text.parse::<VertexId>().is_err(), "accepted `{text}`");
        }
    }

    #[test]
    fn points_serialize_as_numbers() {
        assert_eq!(
            serde_json::to_value(VertexId::Point(4)).unwrap(),
            serde_json::json!(4)
        );
        assert_eq!(
            serde_json::to_value(VertexId::EdgeNode(1)).unwrap(),
            serde_json::json!("edgeNode1")
        );
        assert_eq!(
            serde_json::to_value(VertexId::Centroid).unwrap(),
            serde_json::json!("cent")
        );
    }

    #[test]
    fn numeric_values_and_strings_both_deserialize() {
        assert_eq!(
            serde_json::from_value::<VertexId>(serde_json::json!(9)).unwrap(),
            VertexId::Point(9)
        );
        assert_eq!(
            serde_json::from_value::<VertexId>(serde_json::json!("9")).unwrap(),
            VertexId::Point(9)
        );
        assert_eq!(
            serde_json::from_value::<VertexId>(serde_json::json!("bbox2")).unwrap(),
            VertexId::Bbox(2)
        );
    }

    #[test]
    fn map_keys_round_trip_through_strings() {
        let mut weights = BTreeMap::new();
        weights.insert(VertexId::Point(2), 1.25);
        weights.insert(VertexId::Bbox(1), 0.5);
        weights.insert(VertexId::Centroid, 2.0);

        let json = serde_json::to_string(&weights).unwrap();
        assert!(json.contains("\"2\""), "numeric key stringified: {json}");
        let back: BTreeMap<VertexId, f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, weights);
    }
}
