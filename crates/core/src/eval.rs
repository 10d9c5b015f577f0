use std::collections::BTreeMap;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::error::OpError;
use crate::graph::{Graph, GraphError, NodeId};

#[derive(Debug, Clone, Copy, Default)]
pub struct EvalCacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct EvalState {
    nodes: BTreeMap<NodeId, NodeEvalState>,
    pub stats: EvalCacheStats,
}

#[derive(Debug, Default)]
struct NodeEvalState {
    last_signature: u64,
    initialized: bool,
    output_version: u64,
}

#[derive(Debug, Default)]
pub struct EvalReport {
    pub ordered: Vec<NodeId>,
    pub computed: Vec<NodeId>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub node_reports: BTreeMap<NodeId, EvalNodeReport>,
    pub dirty: Vec<DirtyNodeReport>,
    pub errors: Vec<EvalError>,
    pub output_valid: bool,
}

impl EvalReport {
    pub fn error_for(&self, node: NodeId) -> Option<&OpError> {
        self.errors
            .iter()
            .find(|err| err.node == node)
            .map(|err| &err.error)
    }
}

#[derive(Debug, Clone)]
pub struct EvalNodeReport {
    pub node: NodeId,
    pub duration_ms: f32,
    pub cache_hit: bool,
    pub output_version: u64,
    pub geometry_hash: Option<u64>,
    pub error: Option<EvalError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    NewNode,
    HashChanged,
    MissingOutput,
    CacheDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyNodeReport {
    pub node: NodeId,
    pub reason: DirtyReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub node: NodeId,
    pub error: OpError,
}

/// Per-node hooks the driver calls in upstream-first order.
pub trait NodeEvaluator {
    /// Validates the node and returns its geometry hash.
    fn prepare(&mut self, node: NodeId) -> Result<u64, OpError>;

    /// Produces the node's output geometry.
    fn compute(&mut self, node: NodeId) -> Result<(), OpError>;

    fn has_output(&self, node: NodeId) -> bool;
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_output_version(&self, node_id: NodeId) -> Option<u64> {
        self.nodes.get(&node_id).map(|state| state.output_version)
    }

    pub fn forget(&mut self, node_id: NodeId) {
        self.nodes.remove(&node_id);
    }

    fn node_state_mut(&mut self, node_id: NodeId) -> &mut NodeEvalState {
        self.nodes.entry(node_id).or_default()
    }
}

pub fn evaluate_from<E: NodeEvaluator>(
    graph: &Graph,
    output: NodeId,
    state: &mut EvalState,
    evaluator: &mut E,
    use_cache: bool,
) -> Result<EvalReport, GraphError> {
    let ordered = graph.topo_sort_from(output)?;
    let mut report = EvalReport {
        output_valid: true,
        ..Default::default()
    };

    for node_id in &ordered {
        let (last_signature, initialized, output_version) = {
            let node_state = state.node_state_mut(*node_id);
            (
                node_state.last_signature,
                node_state.initialized,
                node_state.output_version,
            )
        };
        let mut node_report = EvalNodeReport {
            node: *node_id,
            duration_ms: 0.0,
            cache_hit: false,
            output_version,
            geometry_hash: None,
            error: None,
        };

        let start = Instant::now();
        let signature = match evaluator.prepare(*node_id) {
            Ok(signature) => signature,
            Err(error) => {
                record_failure(&mut report, &mut node_report, *node_id, error);
                continue;
            }
        };
        node_report.geometry_hash = Some(signature);

        let signature_matches = initialized && last_signature == signature;
        let has_output = evaluator.has_output(*node_id);
        let cache_valid = signature_matches && has_output;
        if use_cache && cache_valid {
            report.cache_hits += 1;
            state.stats.hits += 1;
            node_report.cache_hit = true;
            node_report.duration_ms = start.elapsed().as_secs_f32() * 1000.0;
            tracing::trace!("cache hit for {:?}", node_id);
            report.node_reports.insert(*node_id, node_report);
            continue;
        }

        let reason = if !initialized {
            DirtyReason::NewNode
        } else if !signature_matches {
            DirtyReason::HashChanged
        } else if !has_output {
            DirtyReason::MissingOutput
        } else {
            DirtyReason::CacheDisabled
        };
        report.dirty.push(DirtyNodeReport {
            node: *node_id,
            reason,
        });

        let compute_result = evaluator.compute(*node_id);
        node_report.duration_ms = start.elapsed().as_secs_f32() * 1000.0;

        match compute_result {
            Ok(()) => {
                let node_state = state.node_state_mut(*node_id);
                node_state.last_signature = signature;
                node_state.initialized = true;
                node_state.output_version = node_state.output_version.wrapping_add(1);
                node_report.output_version = node_state.output_version;
                report.cache_misses += 1;
                state.stats.misses += 1;
                report.computed.push(*node_id);
                tracing::debug!(
                    "computed {:?} in {:.3} ms ({:?})",
                    node_id,
                    node_report.duration_ms,
                    reason
                );
            }
            Err(error) => {
                state.node_state_mut(*node_id).initialized = false;
                record_failure(&mut report, &mut node_report, *node_id, error);
                continue;
            }
        }

        report.node_reports.insert(*node_id, node_report);
    }

    report.ordered = ordered;
    Ok(report)
}

fn record_failure(
    report: &mut EvalReport,
    node_report: &mut EvalNodeReport,
    node: NodeId,
    error: OpError,
) {
    tracing::warn!("node {:?} failed: {}", node, error);
    let error = EvalError { node, error };
    node_report.error = Some(error.clone());
    report.errors.push(error);
    report.output_valid = false;
    report.node_reports.insert(node, node_report.clone());
}
