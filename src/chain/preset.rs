use crate::{
    chain::{Chain, ChainStep},
    filter::{FilterGraph, NodeId, Renderable},
    foundation::error::ChainResult,
};

/// A named chain usable as a single step.
pub struct Preset<R: Renderable> {
    name: String,
    chain: Chain<R>,
}

impl<R: Renderable> Preset<R> {
    /// Preset running `chain`.
    pub fn new(name: impl Into<String>, chain: Chain<R>) -> Self {
        Self {
            name: name.into(),
            chain,
        }
    }

    /// The wrapped chain.
    pub fn chain(&self) -> &Chain<R> {
        &self.chain
    }
}

impl<R: Renderable> ChainStep<R> for Preset<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, graph: &mut FilterGraph<R>, input: NodeId) -> ChainResult<NodeId> {
        self.chain.process(graph, input)
    }
}

impl<R: Renderable> std::fmt::Display for Preset<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
