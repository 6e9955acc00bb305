use std::any::Any;

use crate::filter::{FilterGraph, NodeId, Renderable};

/// Behaviour of one node in a [`FilterGraph`].
///
/// A filter never sees other nodes directly: the graph hands it the outputs of its (compiled)
/// inputs when defining and rendering its own output.
pub trait Filter<R: Renderable>: Any {
    /// Stable type name used in diagnostics and error reports.
    fn type_name(&self) -> &'static str;

    /// Short label shown in chain descriptions.
    fn label(&self) -> String {
        self.type_name().to_string()
    }

    /// Describe (but do not allocate) this node's output given its inputs' outputs.
    fn define_output(&self, inputs: &[&R]) -> anyhow::Result<R>;

    /// Run the transformation. `output` has been allocated; every input has been rendered.
    fn render(&mut self, inputs: &[&R], output: &mut R) -> anyhow::Result<()>;

    /// Rewrite this node into a cheaper equivalent during compilation.
    fn optimize(&self, _ctx: &OptimizeCtx<'_, R>) -> Optimize<R> {
        Optimize::Keep
    }

    /// Called once when the node is part of an initialized graph, before its first render.
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Result of [`Filter::optimize`].
pub enum Optimize<R: Renderable> {
    /// Keep the node as is.
    Keep,
    /// Collapse the node onto its compiled input at this position.
    Forward(usize),
    /// Substitute a new node over already compiled inputs.
    Replace {
        /// Replacement behaviour.
        filter: Box<dyn Filter<R>>,
        /// Compiled inputs of the replacement.
        inputs: Vec<NodeId>,
    },
}

impl<R: Renderable> std::fmt::Debug for Optimize<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => f.write_str("Keep"),
            Self::Forward(pos) => f.debug_tuple("Forward").field(pos).finish(),
            Self::Replace { filter, inputs } => f
                .debug_struct("Replace")
                .field("filter", &filter.type_name())
                .field("inputs", inputs)
                .finish(),
        }
    }
}

/// Read-only view of the graph handed to [`Filter::optimize`].
pub struct OptimizeCtx<'a, R: Renderable> {
    pub(crate) graph: &'a FilterGraph<R>,
    pub(crate) node: NodeId,
}

impl<'a, R: Renderable> OptimizeCtx<'a, R> {
    /// Node being optimized.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Compiled inputs of the node being optimized.
    pub fn inputs(&self) -> &'a [NodeId] {
        self.graph.inputs(self.node).unwrap_or(&[])
    }

    /// Compiled inputs of any node.
    pub fn inputs_of(&self, node: NodeId) -> &'a [NodeId] {
        self.graph.inputs(node).unwrap_or(&[])
    }

    /// Filter of the compiled input at `pos`.
    pub fn input_filter(&self, pos: usize) -> Option<&'a (dyn Filter<R> + 'static)> {
        let id = *self.inputs().get(pos)?;
        self.graph.filter(id)
    }

    /// Filter of the compiled input at `pos`, if it has concrete type `F`.
    pub fn downcast_input<F: Filter<R>>(&self, pos: usize) -> Option<&'a F> {
        let filter: &'a (dyn Any + 'static) = self.input_filter(pos)?;
        filter.downcast_ref::<F>()
    }
}

/// Zero-input node emitting a host supplied resource, typically the decoded frame.
#[derive(Clone, Debug)]
pub struct SourceFilter<R> {
    label: String,
    output: R,
}

impl<R: Renderable + Clone> SourceFilter<R> {
    /// Source emitting copies of `output`.
    pub fn new(label: impl Into<String>, output: R) -> Self {
        Self {
            label: label.into(),
            output,
        }
    }
}

impl<R: Renderable + Clone> Filter<R> for SourceFilter<R> {
    fn type_name(&self) -> &'static str {
        "SourceFilter"
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn define_output(&self, _inputs: &[&R]) -> anyhow::Result<R> {
        Ok(self.output.clone())
    }

    fn render(&mut self, _inputs: &[&R], _output: &mut R) -> anyhow::Result<()> {
        Ok(())
    }
}
