#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod tin;

pub use geom::{Point2, PointPair};
pub use tin::{
    BuildError, CompiledError, CompiledTin, Edge, StrictMode, StrictStatus, Tin, TransformError,
    VertexId, VertexMode, YaxisMode,
};
