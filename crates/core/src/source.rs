use crate::error::OpError;
use crate::geometry::{GeometryList, Scene};
use crate::op::{GeoOp, Inputs, NodeHandle, OpDescription};

pub const CLASS: &str = "GeometrySource";
pub const HELP: &str = "Holds a fixed geometry list";

pub const DESCRIPTION: OpDescription = OpDescription::new(CLASS, HELP, build);

fn build(node: NodeHandle) -> Box<dyn GeoOp> {
    Box::new(GeometrySource::new(node))
}

/// Host-owned producer with no inputs that hands out a stored geometry list.
#[derive(Debug, Clone)]
pub struct GeometrySource {
    node: NodeHandle,
    geometry: GeometryList,
}

impl GeometrySource {
    pub fn new(node: NodeHandle) -> Self {
        Self {
            node,
            geometry: GeometryList::new(),
        }
    }

    pub fn with_geometry(node: NodeHandle, geometry: GeometryList) -> Self {
        Self { node, geometry }
    }

    pub fn node(&self) -> NodeHandle {
        self.node
    }
}

impl GeoOp for GeometrySource {
    fn class(&self) -> &'static str {
        CLASS
    }

    fn node_help(&self) -> &'static str {
        HELP
    }

    fn minimum_inputs(&self) -> usize {
        0
    }

    fn maximum_inputs(&self) -> usize {
        0
    }

    fn validate(&mut self, _inputs: &dyn Inputs, _for_real: bool) -> Result<(), OpError> {
        Ok(())
    }

    fn geometry_hash(&self, _input_hashes: &[u64]) -> u64 {
        self.geometry.content_hash()
    }

    fn geometry_engine(
        &mut self,
        _inputs: &dyn Inputs,
        _scene: &mut Scene,
        out: &mut GeometryList,
    ) -> Result<(), OpError> {
        out.clone_from(&self.geometry);
        Ok(())
    }
}
