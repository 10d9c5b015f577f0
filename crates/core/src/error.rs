use thiserror::Error;

use crate::graph::GraphError;

/// Errors an operator reports through the host error channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("input {input} is not connected")]
    MissingInput { input: usize },

    #[error("mismatched inputs: {0}")]
    MismatchedInputs(Mismatch),

    #[error("input {input} failed: {source}")]
    UpstreamFailure {
        input: usize,
        #[source]
        source: Box<OpError>,
    },

    #[error("{0}")]
    Message(String),
}

impl OpError {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, OpError::MismatchedInputs(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("object count differs ({primary} vs {secondary})")]
    ObjectCount { primary: usize, secondary: usize },

    #[error("object {object} point count differs ({primary} vs {secondary})")]
    PointCount {
        object: usize,
        primary: usize,
        secondary: usize,
    },
}

/// Errors from host-side bookkeeping (node creation, wiring).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("unknown operator class '{0}'")]
    UnknownClass(String),

    #[error("operator class '{0}' is already registered")]
    DuplicateClass(String),

    #[error("node {0:?} is not a geometry source")]
    NotASource(crate::graph::NodeId),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
