//! Operator contract between the host and geometry plugins.
//!
//! The host drives every operator in the same order: construct it from an
//! [`OpDescription`], call [`GeoOp::validate`], ask for [`GeoOp::geometry_hash`]
//! and, unless the hash matches the cached one, run [`GeoOp::geometry_engine`]
//! into a fresh [`GeometryList`].

use std::hash::{Hash, Hasher};

use crate::error::OpError;
use crate::geometry::{GeometryList, Scene};
use crate::graph::NodeId;

/// Graph node an operator instance is bound to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(NodeId);

impl NodeHandle {
    pub fn new(node: NodeId) -> Self {
        Self(node)
    }

    pub fn id(&self) -> NodeId {
        self.0
    }
}

/// Host view of an operator's upstream producers.
pub trait Inputs {
    fn input_count(&self) -> usize;

    /// Validates the producer on `input`. Fails with `MissingInput` when the
    /// slot is empty and with `UpstreamFailure` when the producer errored.
    fn validate(&self, input: usize, for_real: bool) -> Result<(), OpError>;

    /// Fills `list` with the producer's current geometry and records the
    /// request in `scene`.
    fn fetch(&self, input: usize, scene: &mut Scene, list: &mut GeometryList)
        -> Result<(), OpError>;

    fn hash(&self, input: usize) -> Option<u64>;
}

pub trait GeoOp: Send {
    fn class(&self) -> &'static str;

    fn node_help(&self) -> &'static str;

    fn minimum_inputs(&self) -> usize;

    fn maximum_inputs(&self) -> usize;

    fn validate(&mut self, inputs: &dyn Inputs, for_real: bool) -> Result<(), OpError>;

    fn geometry_hash(&self, input_hashes: &[u64]) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.class().hash(&mut hasher);
        input_hashes.hash(&mut hasher);
        hasher.finish()
    }

    fn geometry_engine(
        &mut self,
        inputs: &dyn Inputs,
        scene: &mut Scene,
        out: &mut GeometryList,
    ) -> Result<(), OpError>;
}

pub type OpConstructor = fn(NodeHandle) -> Box<dyn GeoOp>;

/// Registration record published by a plugin so the host can build it by name.
#[derive(Clone, Copy)]
pub struct OpDescription {
    pub class: &'static str,
    pub help: &'static str,
    pub constructor: OpConstructor,
}

impl OpDescription {
    pub const fn new(class: &'static str, help: &'static str, constructor: OpConstructor) -> Self {
        Self {
            class,
            help,
            constructor,
        }
    }

    pub fn build(&self, node: NodeHandle) -> Box<dyn GeoOp> {
        (self.constructor)(node)
    }
}

impl std::fmt::Debug for OpDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpDescription")
            .field("class", &self.class)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}
