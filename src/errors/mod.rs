//! Domain-specific error types for azgraph
//!
//! # Error Categories
//!
//! - **RecordError**: one raw record could not be normalized
//! - **GraphError**: graph assembly (dangling edges, empty input)
//! - **ImportExportError**: loading exports and rendering projections
//!
//! Rule evaluation has no error type: a heuristic or exposure rule that does
//! not find the shape it expects simply does not match.

pub mod graph;
pub mod import_export;
pub mod record;

pub use graph::GraphError;
pub use import_export::ImportExportError;
pub use record::RecordError;

/// Result type alias for record normalization
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for import/export operations
pub type ImportExportResult<T> = Result<T, ImportExportError>;
