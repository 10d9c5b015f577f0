use std::collections::BTreeMap;

use crate::error::HostError;
use crate::op::{GeoOp, NodeHandle, OpDescription};
use crate::source;

/// Class name to operator description table.
#[derive(Debug, Clone)]
pub struct OpRegistry {
    descriptions: BTreeMap<&'static str, OpDescription>,
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl OpRegistry {
    /// Registry holding only the host's own operators.
    pub fn with_builtins() -> Self {
        let mut descriptions = BTreeMap::new();
        descriptions.insert(source::DESCRIPTION.class, source::DESCRIPTION);
        Self { descriptions }
    }

    pub fn register(&mut self, description: OpDescription) -> Result<(), HostError> {
        if self.descriptions.contains_key(description.class) {
            return Err(HostError::DuplicateClass(description.class.to_string()));
        }
        tracing::debug!("registered operator class {}", description.class);
        self.descriptions.insert(description.class, description);
        Ok(())
    }

    pub fn description(&self, class: &str) -> Option<&OpDescription> {
        self.descriptions.get(class)
    }

    pub fn create(&self, class: &str, node: NodeHandle) -> Result<Box<dyn GeoOp>, HostError> {
        self.description(class)
            .map(|description| description.build(node))
            .ok_or_else(|| HostError::UnknownClass(class.to_string()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptions.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, NodeDefinition};

    #[test]
    fn builtins_include_source() {
        let registry = OpRegistry::with_builtins();
        assert_eq!(registry.classes().collect::<Vec<_>>(), vec![source::CLASS]);
        assert_eq!(
            registry.description(source::CLASS).map(|d| d.help),
            Some(source::HELP)
        );
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = OpRegistry::with_builtins();
        assert_eq!(
            registry.register(source::DESCRIPTION),
            Err(HostError::DuplicateClass(source::CLASS.to_string()))
        );
    }

    #[test]
    fn create_builds_bound_instance() {
        let registry = OpRegistry::with_builtins();
        let mut graph = Graph::default();
        let node = graph.add_node(NodeDefinition::with_arity(source::CLASS, 0));

        let op = registry.create(source::CLASS, NodeHandle::new(node)).unwrap();
        assert_eq!(op.class(), source::CLASS);
        assert_eq!(op.maximum_inputs(), 0);

        assert!(matches!(
            registry.create("Nope", NodeHandle::new(node)),
            Err(HostError::UnknownClass(name)) if name == "Nope"
        ));
    }
}
