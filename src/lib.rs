pub mod common;
pub mod data_loader;
pub mod errors;
pub mod export;
pub mod generate_commands;
pub mod graph;
pub mod pipeline;
pub mod plan;
pub mod plan_execution;
pub mod resource;

pub use graph::{Edge, EdgeKind, Graph, GraphView, Node};
pub use pipeline::exposure::{Exposure, ExposureStatus, ExposureSummary};
pub use pipeline::{run, Pipeline, PipelineReport};
pub use resource::{PropertyBag, Record, Resource, ResourceKind};
