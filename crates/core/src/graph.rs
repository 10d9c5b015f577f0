use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    pins: BTreeMap<PinId, Pin>,
    links: BTreeMap<LinkId, Link>,
    next_node_id: u64,
    next_pin_id: u64,
    next_link_id: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            pins: BTreeMap::new(),
            links: BTreeMap::new(),
            next_node_id: 1,
            next_pin_id: 1,
            next_link_id: 1,
        }
    }
}

impl Graph {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(&id)
    }

    /// Id the next call to `add_node` will hand out.
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.next_node_id)
    }

    pub fn add_node(&mut self, def: NodeDefinition) -> NodeId {
        let node_id = self.alloc_node_id();
        let mut input_ids = Vec::new();
        let mut output_ids = Vec::new();

        for name in def.inputs {
            let pin_id = self.alloc_pin_id();
            self.pins.insert(
                pin_id,
                Pin {
                    id: pin_id,
                    node: node_id,
                    name,
                    kind: PinKind::Input,
                },
            );
            input_ids.push(pin_id);
        }

        for name in def.outputs {
            let pin_id = self.alloc_pin_id();
            self.pins.insert(
                pin_id,
                Pin {
                    id: pin_id,
                    node: node_id,
                    name,
                    kind: PinKind::Output,
                },
            );
            output_ids.push(pin_id);
        }

        self.nodes.insert(
            node_id,
            Node {
                id: node_id,
                class: def.class,
                inputs: input_ids,
                outputs: output_ids,
            },
        );

        node_id
    }

    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        let Some(node) = self.nodes.remove(&node_id) else {
            return false;
        };

        let mut pins_to_remove: HashSet<PinId> = node.inputs.into_iter().collect();
        pins_to_remove.extend(node.outputs);

        self.links.retain(|_, link| {
            !pins_to_remove.contains(&link.from) && !pins_to_remove.contains(&link.to)
        });

        for pin_id in pins_to_remove {
            self.pins.remove(&pin_id);
        }

        true
    }

    pub fn input_pin(&self, node_id: NodeId, index: usize) -> Result<PinId, GraphError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::MissingNode(node_id))?;
        node.inputs
            .get(index)
            .copied()
            .ok_or(GraphError::InputOutOfRange {
                node: node_id,
                index,
            })
    }

    pub fn output_pin(&self, node_id: NodeId) -> Result<PinId, GraphError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::MissingNode(node_id))?;
        node.outputs
            .first()
            .copied()
            .ok_or(GraphError::MissingOutput(node_id))
    }

    pub fn add_link(&mut self, from: PinId, to: PinId) -> Result<LinkId, GraphError> {
        let from_pin = self.pins.get(&from).ok_or(GraphError::MissingPin(from))?;
        let to_pin = self.pins.get(&to).ok_or(GraphError::MissingPin(to))?;

        if from_pin.kind != PinKind::Output || to_pin.kind != PinKind::Input {
            return Err(GraphError::WrongPinDirection { from, to });
        }

        if self.links.values().any(|link| link.to == to) {
            return Err(GraphError::InputAlreadyConnected { to });
        }

        let link_id = self.alloc_link_id();
        self.links.insert(
            link_id,
            Link {
                id: link_id,
                from,
                to,
            },
        );
        Ok(link_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn remove_links_for_pin(&mut self, pin_id: PinId) -> usize {
        let before = self.links.len();
        self.links
            .retain(|_, link| link.from != pin_id && link.to != pin_id);
        before - self.links.len()
    }

    /// Node feeding the given input slot, if that slot is linked.
    pub fn upstream_for_input(&self, node_id: NodeId, index: usize) -> Option<NodeId> {
        let pin_id = self.input_pin(node_id, index).ok()?;
        let link = self.links.values().find(|link| link.to == pin_id)?;
        self.node_for_pin(link.from)
    }

    pub fn topo_sort_from(&self, output: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if !self.nodes.contains_key(&output) {
            return Err(GraphError::MissingNode(output));
        }

        let mut ordered = Vec::new();
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        self.visit_node(
            output,
            &mut visiting,
            &mut visited,
            &mut ordered,
            &mut stack,
        )?;

        Ok(ordered)
    }

    fn visit_node(
        &self,
        node_id: NodeId,
        visiting: &mut HashSet<NodeId>,
        visited: &mut HashSet<NodeId>,
        ordered: &mut Vec<NodeId>,
        stack: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        if visited.contains(&node_id) {
            return Ok(());
        }
        if visiting.contains(&node_id) {
            stack.push(node_id);
            return Err(GraphError::CycleDetected(stack.clone()));
        }

        visiting.insert(node_id);
        stack.push(node_id);

        for upstream in self.upstream_nodes(node_id) {
            self.visit_node(upstream, visiting, visited, ordered, stack)?;
        }

        visiting.remove(&node_id);
        visited.insert(node_id);
        ordered.push(node_id);
        stack.pop();
        Ok(())
    }

    pub fn upstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        (0..node.inputs.len())
            .filter_map(|index| self.upstream_for_input(node_id, index))
            .collect()
    }

    fn node_for_pin(&self, pin_id: PinId) -> Option<NodeId> {
        self.pins.get(&pin_id).map(|pin| pin.node)
    }

    fn alloc_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        NodeId(id)
    }

    fn alloc_pin_id(&mut self) -> PinId {
        let id = self.next_pin_id;
        self.next_pin_id += 1;
        PinId(id)
    }

    fn alloc_link_id(&mut self) -> LinkId {
        let id = self.next_link_id;
        self.next_link_id += 1;
        LinkId(id)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub class: String,
    pub inputs: Vec<PinId>,
    pub outputs: Vec<PinId>,
}

#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub class: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl NodeDefinition {
    /// Definition with `inputs` numbered geometry inputs and a single output.
    pub fn with_arity(class: &str, inputs: usize) -> Self {
        Self {
            class: class.to_string(),
            inputs: (0..inputs).map(|i| format!("input{i}")).collect(),
            outputs: vec!["out".to_string()],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinKind {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct Pin {
    pub id: PinId,
    pub node: NodeId,
    pub name: String,
    pub kind: PinKind,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub from: PinId,
    pub to: PinId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    MissingNode(NodeId),
    MissingPin(PinId),
    MissingOutput(NodeId),
    WrongPinDirection { from: PinId, to: PinId },
    InputAlreadyConnected { to: PinId },
    InputOutOfRange { node: NodeId, index: usize },
    CycleDetected(Vec<NodeId>),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::MissingNode(id) => write!(f, "missing node {id:?}"),
            GraphError::MissingPin(id) => write!(f, "missing pin {id:?}"),
            GraphError::MissingOutput(id) => write!(f, "node {id:?} has no output"),
            GraphError::WrongPinDirection { from, to } => {
                write!(f, "cannot link {from:?} to {to:?}: wrong pin direction")
            }
            GraphError::InputAlreadyConnected { to } => {
                write!(f, "input {to:?} is already connected")
            }
            GraphError::InputOutOfRange { node, index } => {
                write!(f, "node {node:?} has no input {index}")
            }
            GraphError::CycleDetected(path) => write!(f, "cycle detected through {path:?}"),
        }
    }
}

impl std::error::Error for GraphError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(graph: &mut Graph, from: NodeId, to: NodeId, input: usize) {
        let from_pin = graph.output_pin(from).unwrap();
        let to_pin = graph.input_pin(to, input).unwrap();
        graph.add_link(from_pin, to_pin).unwrap();
    }

    #[test]
    fn add_and_remove_node() {
        let mut graph = Graph::default();
        let node_id = graph.add_node(NodeDefinition::with_arity("Demo", 1));
        assert!(graph.node(node_id).is_some());
        assert!(graph.remove_node(node_id));
        assert!(graph.node(node_id).is_none());
        assert!(!graph.remove_node(node_id));
    }

    #[test]
    fn rejects_second_link_into_input() {
        let mut graph = Graph::default();
        let a = graph.add_node(NodeDefinition::with_arity("A", 0));
        let b = graph.add_node(NodeDefinition::with_arity("B", 0));
        let c = graph.add_node(NodeDefinition::with_arity("C", 1));
        connect(&mut graph, a, c, 0);

        let from = graph.output_pin(b).unwrap();
        let to = graph.input_pin(c, 0).unwrap();
        assert!(matches!(
            graph.add_link(from, to),
            Err(GraphError::InputAlreadyConnected { .. })
        ));
    }

    #[test]
    fn rejects_reversed_links() {
        let mut graph = Graph::default();
        let a = graph.add_node(NodeDefinition::with_arity("A", 1));
        let b = graph.add_node(NodeDefinition::with_arity("B", 1));
        let from = graph.input_pin(a, 0).unwrap();
        let to = graph.output_pin(b).unwrap();
        assert!(matches!(
            graph.add_link(from, to),
            Err(GraphError::WrongPinDirection { .. })
        ));
    }

    #[test]
    fn input_index_out_of_range() {
        let mut graph = Graph::default();
        let a = graph.add_node(NodeDefinition::with_arity("A", 2));
        assert!(graph.input_pin(a, 1).is_ok());
        assert_eq!(
            graph.input_pin(a, 2),
            Err(GraphError::InputOutOfRange { node: a, index: 2 })
        );
    }

    #[test]
    fn upstream_for_input_follows_slots() {
        let mut graph = Graph::default();
        let a = graph.add_node(NodeDefinition::with_arity("A", 0));
        let b = graph.add_node(NodeDefinition::with_arity("B", 0));
        let c = graph.add_node(NodeDefinition::with_arity("C", 2));
        connect(&mut graph, b, c, 1);
        connect(&mut graph, a, c, 0);

        assert_eq!(graph.upstream_for_input(c, 0), Some(a));
        assert_eq!(graph.upstream_for_input(c, 1), Some(b));
        assert_eq!(graph.upstream_nodes(c), vec![a, b]);

        let pin = graph.input_pin(c, 1).unwrap();
        assert_eq!(graph.remove_links_for_pin(pin), 1);
        assert_eq!(graph.upstream_for_input(c, 1), None);
    }

    #[test]
    fn topo_sort_orders_upstream_first() {
        let mut graph = Graph::default();
        let source = graph.add_node(NodeDefinition::with_arity("Source", 0));
        let mid = graph.add_node(NodeDefinition::with_arity("Mid", 1));
        let output = graph.add_node(NodeDefinition::with_arity("Output", 1));
        connect(&mut graph, source, mid, 0);
        connect(&mut graph, mid, output, 0);

        let order = graph.topo_sort_from(output).unwrap();
        assert_eq!(order, vec![source, mid, output]);
    }

    #[test]
    fn topo_sort_detects_cycles() {
        let mut graph = Graph::default();
        let a = graph.add_node(NodeDefinition::with_arity("A", 1));
        let b = graph.add_node(NodeDefinition::with_arity("B", 1));
        connect(&mut graph, a, b, 0);
        connect(&mut graph, b, a, 0);

        let result = graph.topo_sort_from(a);
        assert!(matches!(result, Err(GraphError::CycleDetected(_))));
    }
}
