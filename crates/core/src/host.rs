use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HostError, OpError};
use crate::eval::{evaluate_from, EvalReport, EvalState, NodeEvaluator};
use crate::geometry::{GeometryList, Scene};
use crate::graph::{Graph, GraphError, LinkId, NodeDefinition, NodeId};
use crate::op::{GeoOp, Inputs, NodeHandle};
use crate::registry::OpRegistry;
use crate::source::{self, GeometrySource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub cache_outputs: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            cache_outputs: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct GeometryEvalState {
    pub eval: EvalState,
    outputs: BTreeMap<NodeId, GeometryList>,
    hashes: BTreeMap<NodeId, u64>,
    failures: BTreeMap<NodeId, OpError>,
}

impl GeometryEvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry_for_node(&self, node_id: NodeId) -> Option<&GeometryList> {
        self.outputs.get(&node_id)
    }

    fn forget(&mut self, node_id: NodeId) {
        self.eval.forget(node_id);
        self.outputs.remove(&node_id);
        self.hashes.remove(&node_id);
        self.failures.remove(&node_id);
    }
}

#[derive(Debug)]
pub struct GeometryEvalResult {
    pub report: EvalReport,
    pub output: Option<GeometryList>,
}

/// In-process 3D graph runtime that loads operators by class name and drives them.
pub struct Host {
    registry: OpRegistry,
    settings: HostSettings,
    graph: Graph,
    ops: BTreeMap<NodeId, Box<dyn GeoOp>>,
    state: GeometryEvalState,
}

impl Host {
    pub fn new(registry: OpRegistry) -> Self {
        Self::with_settings(registry, HostSettings::default())
    }

    pub fn with_settings(registry: OpRegistry, settings: HostSettings) -> Self {
        Self {
            registry,
            settings,
            graph: Graph::default(),
            ops: BTreeMap::new(),
            state: GeometryEvalState::new(),
        }
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn op(&self, node: NodeId) -> Option<&dyn GeoOp> {
        self.ops.get(&node).map(|op| op.as_ref())
    }

    pub fn state(&self) -> &GeometryEvalState {
        &self.state
    }

    pub fn create_node(&mut self, class: &str) -> Result<NodeId, HostError> {
        let node_id = self.graph.next_node_id();
        let op = self.registry.create(class, NodeHandle::new(node_id))?;
        let added = self
            .graph
            .add_node(NodeDefinition::with_arity(op.class(), op.maximum_inputs()));
        debug_assert_eq!(added, node_id);
        tracing::debug!("created {} as {:?}", op.class(), node_id);
        self.ops.insert(node_id, op);
        Ok(node_id)
    }

    pub fn add_source(&mut self, geometry: GeometryList) -> NodeId {
        let node_id = self
            .graph
            .add_node(NodeDefinition::with_arity(source::CLASS, 0));
        self.ops.insert(
            node_id,
            Box::new(GeometrySource::with_geometry(
                NodeHandle::new(node_id),
                geometry,
            )),
        );
        node_id
    }

    pub fn set_source_geometry(
        &mut self,
        node_id: NodeId,
        geometry: GeometryList,
    ) -> Result<(), HostError> {
        let is_source = self
            .ops
            .get(&node_id)
            .map(|op| op.class() == source::CLASS)
            .ok_or(GraphError::MissingNode(node_id))?;
        if !is_source {
            return Err(HostError::NotASource(node_id));
        }
        self.ops.insert(
            node_id,
            Box::new(GeometrySource::with_geometry(
                NodeHandle::new(node_id),
                geometry,
            )),
        );
        Ok(())
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId, input: usize) -> Result<LinkId, HostError> {
        let from_pin = self.graph.output_pin(from)?;
        let to_pin = self.graph.input_pin(to, input)?;
        let link = self.graph.add_link(from_pin, to_pin)?;
        tracing::debug!("connected {:?} -> {:?} input {}", from, to, input);
        Ok(link)
    }

    pub fn disconnect(&mut self, to: NodeId, input: usize) -> Result<usize, HostError> {
        let to_pin = self.graph.input_pin(to, input)?;
        Ok(self.graph.remove_links_for_pin(to_pin))
    }

    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        self.ops.remove(&node_id);
        self.state.forget(node_id);
        self.graph.remove_node(node_id)
    }

    pub fn geometry_for_node(&self, node_id: NodeId) -> Option<&GeometryList> {
        self.state.geometry_for_node(node_id)
    }

    pub fn evaluate(&mut self, output: NodeId) -> Result<GeometryEvalResult, GraphError> {
        let GeometryEvalState {
            eval,
            outputs,
            hashes,
            failures,
        } = &mut self.state;
        failures.clear();

        let mut evaluator = HostEvaluator {
            graph: &self.graph,
            ops: &mut self.ops,
            outputs,
            hashes,
            failures,
        };
        let report = evaluate_from(
            &self.graph,
            output,
            eval,
            &mut evaluator,
            self.settings.cache_outputs,
        )?;

        if !report.output_valid {
            for err in &report.errors {
                self.state.outputs.remove(&err.node);
            }
            self.state.outputs.remove(&output);
            return Ok(GeometryEvalResult {
                report,
                output: None,
            });
        }

        let output_geometry = self.state.outputs.get(&output).cloned();
        Ok(GeometryEvalResult {
            report,
            output: output_geometry,
        })
    }
}

struct HostEvaluator<'a> {
    graph: &'a Graph,
    ops: &'a mut BTreeMap<NodeId, Box<dyn GeoOp>>,
    outputs: &'a mut BTreeMap<NodeId, GeometryList>,
    hashes: &'a mut BTreeMap<NodeId, u64>,
    failures: &'a mut BTreeMap<NodeId, OpError>,
}

impl HostEvaluator<'_> {
    fn fail(&mut self, node: NodeId, error: OpError) -> OpError {
        self.outputs.remove(&node);
        self.hashes.remove(&node);
        self.failures.insert(node, error.clone());
        error
    }
}

impl NodeEvaluator for HostEvaluator<'_> {
    fn prepare(&mut self, node: NodeId) -> Result<u64, OpError> {
        let result = {
            let op = self
                .ops
                .get_mut(&node)
                .ok_or_else(|| OpError::Message(format!("no operator bound to {node:?}")))?;
            let inputs = NodeInputs {
                node,
                graph: self.graph,
                outputs: self.outputs,
                hashes: self.hashes,
                failures: self.failures,
            };
            op.validate(&inputs, true).map(|()| {
                let input_hashes: Vec<u64> = (0..inputs.input_count())
                    .map(|index| inputs.hash(index).unwrap_or(0))
                    .collect();
                op.geometry_hash(&input_hashes)
            })
        };
        match result {
            Ok(hash) => {
                self.hashes.insert(node, hash);
                Ok(hash)
            }
            Err(error) => Err(self.fail(node, error)),
        }
    }

    fn compute(&mut self, node: NodeId) -> Result<(), OpError> {
        let mut out = GeometryList::new();
        let result = {
            let op = self
                .ops
                .get_mut(&node)
                .ok_or_else(|| OpError::Message(format!("no operator bound to {node:?}")))?;
            let inputs = NodeInputs {
                node,
                graph: self.graph,
                outputs: self.outputs,
                hashes: self.hashes,
                failures: self.failures,
            };
            let mut scene = Scene::new();
            op.geometry_engine(&inputs, &mut scene, &mut out)
        };
        match result {
            Ok(()) => {
                self.outputs.insert(node, out);
                Ok(())
            }
            Err(error) => Err(self.fail(node, error)),
        }
    }

    fn has_output(&self, node: NodeId) -> bool {
        self.outputs.contains_key(&node)
    }
}

struct NodeInputs<'a> {
    node: NodeId,
    graph: &'a Graph,
    outputs: &'a BTreeMap<NodeId, GeometryList>,
    hashes: &'a BTreeMap<NodeId, u64>,
    failures: &'a BTreeMap<NodeId, OpError>,
}

impl NodeInputs<'_> {
    fn upstream(&self, input: usize) -> Result<NodeId, OpError> {
        self.graph
            .upstream_for_input(self.node, input)
            .ok_or(OpError::MissingInput { input })
    }
}

impl Inputs for NodeInputs<'_> {
    fn input_count(&self) -> usize {
        self.graph
            .node(self.node)
            .map(|node| node.inputs.len())
            .unwrap_or(0)
    }

    fn validate(&self, input: usize, _for_real: bool) -> Result<(), OpError> {
        let upstream = self.upstream(input)?;
        if let Some(error) = self.failures.get(&upstream) {
            return Err(OpError::UpstreamFailure {
                input,
                source: Box::new(error.clone()),
            });
        }
        if !self.outputs.contains_key(&upstream) {
            return Err(OpError::UpstreamFailure {
                input,
                source: Box::new(OpError::Message(format!(
                    "{upstream:?} produced no geometry"
                ))),
            });
        }
        Ok(())
    }

    fn fetch(
        &self,
        input: usize,
        scene: &mut Scene,
        list: &mut GeometryList,
    ) -> Result<(), OpError> {
        self.validate(input, true)?;
        let upstream = self.upstream(input)?;
        let geometry = self
            .outputs
            .get(&upstream)
            .ok_or(OpError::MissingInput { input })?;
        list.clone_from(geometry);
        scene.fill(upstream, self.hashes.get(&upstream).copied().unwrap_or(0));
        Ok(())
    }

    fn hash(&self, input: usize) -> Option<u64> {
        let upstream = self.graph.upstream_for_input(self.node, input)?;
        self.hashes.get(&upstream).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoObject;

    fn points(values: &[[f32; 3]]) -> GeometryList {
        GeometryList::from_objects(vec![GeoObject::with_points(values.to_vec())])
    }

    #[test]
    fn source_output_matches_stored_geometry() {
        let mut host = Host::new(OpRegistry::with_builtins());
        let geometry = points(&[[1.0, 2.0, 3.0]]);
        let node = host.add_source(geometry.clone());

        let result = host.evaluate(node).unwrap();
        assert!(result.report.output_valid);
        assert_eq!(result.output, Some(geometry));
    }

    #[test]
    fn source_edits_invalidate_cache() {
        let mut host = Host::new(OpRegistry::with_builtins());
        let node = host.add_source(points(&[[1.0, 2.0, 3.0]]));
        host.evaluate(node).unwrap();

        let again = host.evaluate(node).unwrap();
        assert_eq!(again.report.cache_hits, 1);

        host.set_source_geometry(node, points(&[[4.0, 5.0, 6.0]]))
            .unwrap();
        let edited = host.evaluate(node).unwrap();
        assert_eq!(edited.report.computed, vec![node]);
        assert_eq!(edited.output, Some(points(&[[4.0, 5.0, 6.0]])));
    }

    #[test]
    fn settings_can_disable_cache() {
        let settings = HostSettings {
            cache_outputs: false,
        };
        let mut host = Host::with_settings(OpRegistry::with_builtins(), settings);
        let node = host.add_source(GeometryList::new());
        host.evaluate(node).unwrap();
        let again = host.evaluate(node).unwrap();
        assert_eq!(again.report.cache_hits, 0);
        assert_eq!(again.report.computed, vec![node]);
    }

    #[test]
    fn created_source_starts_empty() {
        let mut host = Host::new(OpRegistry::default());
        let node = host.create_node(source::CLASS).unwrap();
        assert_eq!(host.op(node).map(|op| op.class()), Some(source::CLASS));

        let result = host.evaluate(node).unwrap();
        assert_eq!(result.output, Some(GeometryList::new()));
    }

    #[test]
    fn unknown_class_and_non_source_edits_fail() {
        let mut host = Host::new(OpRegistry::with_builtins());
        assert_eq!(
            host.create_node("Missing"),
            Err(HostError::UnknownClass("Missing".to_string()))
        );

        let node = host.add_source(GeometryList::new());
        assert!(host.remove_node(node));
        assert!(matches!(
            host.set_source_geometry(node, GeometryList::new()),
            Err(HostError::Graph(GraphError::MissingNode(_)))
        ));
        assert!(host.geometry_for_node(node).is_none());
    }

    #[test]
    fn connect_rejects_missing_input_slot() {
        let mut host = Host::new(OpRegistry::with_builtins());
        let a = host.add_source(GeometryList::new());
        let b = host.add_source(GeometryList::new());
        assert!(matches!(
            host.connect(a, b, 0),
            Err(HostError::Graph(GraphError::InputOutOfRange { .. }))
        ));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: HostSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.cache_outputs);

        let settings: HostSettings =
            serde_json::from_str(r#"{ "cache_outputs": false }"#).unwrap();
        assert!(!settings.cache_outputs);
    }
}
