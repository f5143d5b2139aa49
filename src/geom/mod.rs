mod collab;
mod kinks;
mod point;

pub use collab::{
    TriangulateError, centroid, convex_hull, point_in_ring, point_in_triangle,
    segment_intersection, triangles_overlap, triangulate, union_fills_hull,
};
pub use kinks::find_intersections;
pub use point::{Point2, PointPair};
