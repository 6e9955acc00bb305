//! framechain is a lazy filter-graph render pipeline with a compiled-artifact cache.
//!
//! Independently authored chain steps extend one acyclic [`FilterGraph`]. The graph is compiled
//! and initialized once, then rendered per frame:
//!
//! - Compose steps into a [`Chain`] (or resolve a [`ChainConfig`] through a [`FilterRegistry`])
//! - Drive it with a [`ChainScript`], which rebuilds the graph and falls back to an error chain
//! - Fetch shader and kernel binaries through a [`CacheManager`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Reference filters over a CPU plane.
pub mod builtin;
/// Compiled-artifact cache keyed by source signature and modification time.
pub mod cache;
/// Chain composition, compilation and the per-frame engine.
pub mod chain;
/// Filter node contract and the graph arena.
pub mod filter;

pub use crate::cache::{
    Artifact, ArtifactCache, ArtifactKind, CacheConfig, CacheManager, CacheStats,
};
pub use crate::chain::{
    Chain, ChainConfig, ChainScript, ChainSource, ChainStep, CompiledGraph, FilterRegistry,
    OutputSink, Preset, StepConfig, build_chain, compile_chain,
};
pub use crate::filter::{
    Filter, FilterGraph, FilterTag, Lifetime, NodeId, NodeState, Optimize, OptimizeCtx,
    Renderable, SourceFilter,
};
pub use crate::foundation::error::{ChainError, ChainResult, ErrorReport};
