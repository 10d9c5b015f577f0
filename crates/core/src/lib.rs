mod error;
mod eval;
mod geometry;
mod graph;
mod host;
mod op;
mod registry;
mod source;

pub use error::{HostError, Mismatch, OpError};
pub use eval::{
    evaluate_from, DirtyNodeReport, DirtyReason, EvalCacheStats, EvalError, EvalNodeReport,
    EvalReport, EvalState, NodeEvaluator,
};
pub use geometry::{GeoObject, GeometryList, Scene};
pub use graph::{
    Graph, GraphError, Link, LinkId, Node, NodeDefinition, NodeId, Pin, PinId, PinKind,
};
pub use host::{GeometryEvalResult, GeometryEvalState, Host, HostSettings};
pub use op::{GeoOp, Inputs, NodeHandle, OpConstructor, OpDescription};
pub use registry::OpRegistry;
pub use source::{GeometrySource, CLASS as SOURCE_CLASS};
