use crate::{
    filter::{FilterGraph, NodeId, Renderable},
    foundation::error::ChainResult,
};

/// One stage of a chain: consumes the node built so far and returns the node that replaces it.
///
/// A step may add any number of nodes, fan out into branches and join them again, or return its
/// input unchanged.
pub trait ChainStep<R: Renderable> {
    /// Name shown in diagnostics.
    fn name(&self) -> &str {
        "step"
    }

    /// Extend `graph` downstream of `input`.
    fn apply(&self, graph: &mut FilterGraph<R>, input: NodeId) -> ChainResult<NodeId>;
}

impl<R, F> ChainStep<R> for F
where
    R: Renderable,
    F: Fn(&mut FilterGraph<R>, NodeId) -> ChainResult<NodeId>,
{
    fn apply(&self, graph: &mut FilterGraph<R>, input: NodeId) -> ChainResult<NodeId> {
        self(graph, input)
    }
}

/// Ordered sequence of steps applied left to right.
pub struct Chain<R: Renderable> {
    steps: Vec<Box<dyn ChainStep<R>>>,
}

impl<R: Renderable> Default for Chain<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderable> Chain<R> {
    /// Empty chain; processing returns the input unchanged.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Builder form of [`Chain::push`].
    pub fn then(mut self, step: impl ChainStep<R> + 'static) -> Self {
        self.push(step);
        self
    }

    /// Append a step.
    pub fn push(&mut self, step: impl ChainStep<R> + 'static) {
        self.steps.push(Box::new(step));
    }

    /// Append every step of `other` after the steps of this chain.
    pub fn append(mut self, other: Chain<R>) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Append an already boxed step.
    pub fn push_boxed(&mut self, step: Box<dyn ChainStep<R>>) {
        self.steps.push(step);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` for the identity chain.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Fold `input` through every step.
    pub fn process(&self, graph: &mut FilterGraph<R>, input: NodeId) -> ChainResult<NodeId> {
        let mut node = input;
        for step in &self.steps {
            node = step.apply(graph, node)?;
        }
        Ok(node)
    }
}

impl<R: Renderable> ChainStep<R> for Chain<R> {
    fn name(&self) -> &str {
        "chain"
    }

    fn apply(&self, graph: &mut FilterGraph<R>, input: NodeId) -> ChainResult<NodeId> {
        self.process(graph, input)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/chain/step.rs"]
mod tests;
