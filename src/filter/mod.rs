mod graph;
mod node;
mod output;
mod tag;

pub use graph::{FilterGraph, Lifetime, NodeId, NodeState};
pub use node::{Filter, Optimize, OptimizeCtx, SourceFilter};
pub use output::Renderable;
pub use tag::FilterTag;
