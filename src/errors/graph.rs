//! Graph-related error types
//!
//! This module provides structured error types for graph assembly and
//! traversal. Edge-level errors are reported and the edge is dropped; only
//! an empty resource set aborts a build.
//!
//! # Examples
//!
//! ```rust
//! use azgraph::errors::GraphError;
//!
//! let err = GraphError::DanglingEdge {
//!     source_id: "vm1".to_string(),
//!     target_id: "nic-missing".to_string(),
//!     missing: "nic-missing".to_string(),
//! };
//! assert!(!err.is_fatal());
//!
//! let err = GraphError::EmptyResourceSet;
//! assert!(err.is_fatal());
//! ```

use thiserror::Error;

/// Graph-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge names an endpoint that is not in the node set
    #[error("Dangling edge {source_id} -> {target_id}: node '{missing}' not found")]
    DanglingEdge {
        /// Source node identifier
        source_id: String,
        /// Target node identifier
        target_id: String,
        /// The endpoint that could not be resolved
        missing: String,
    },

    /// An edge starts and ends on the same node
    #[error("Self-loop on node '{0}' is not allowed")]
    SelfLoop(String),

    /// Two resources share an identifier
    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    /// Nothing to build a graph from
    #[error("Cannot build a graph from an empty resource set")]
    EmptyResourceSet,

    /// Node not found by identifier
    #[error("Node '{0}' not found")]
    NodeNotFound(String),
}

impl GraphError {
    /// Whether the error aborts the whole build rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(self, GraphError::EmptyResourceSet)
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NodeNotFound(_))
    }

    /// Get error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::DanglingEdge { .. } => "DANGLING_EDGE",
            GraphError::SelfLoop(_) => "SELF_LOOP",
            GraphError::DuplicateNode(_) => "CONFLICT",
            GraphError::EmptyResourceSet => "EMPTY_INPUT",
            GraphError::NodeNotFound(_) => "NOT_FOUND",
        }
    }
}
