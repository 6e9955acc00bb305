use crate::{
    filter::{Filter, FilterTag, Optimize, OptimizeCtx, Renderable, SourceFilter},
    foundation::error::{ChainError, ChainResult},
};

/// Index of a node inside its [`FilterGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Built by a chain step, not compiled yet.
    Uncompiled,
    /// Compiled (possibly into another node).
    Compiled,
    /// Compiled and initialized, idle between frames.
    Initialized,
    /// Rendered during the current frame.
    Rendered,
    /// Graph disposed; terminal.
    Disposed,
}

/// Lifetime indices assigned by [`FilterGraph::initialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifetime {
    /// Position of the node in the initialization order.
    pub filter_index: u32,
    /// Last position at which a consumer still reads this node's output.
    pub last_dependent_index: u32,
}

struct NodeSlot<R: Renderable> {
    filter: Option<Box<dyn Filter<R>>>,
    type_name: &'static str,
    inputs: Vec<NodeId>,
    compiled_inputs: Option<Vec<NodeId>>,
    compiled: Option<NodeId>,
    tag: FilterTag,
    output: Option<R>,
    filter_index: u32,
    last_dependent_index: u32,
    initialized: bool,
    rendered: bool,
}

/// Arena of filter nodes.
///
/// Chain steps add nodes; [`FilterGraph::compile`] and [`FilterGraph::initialize`] turn the
/// node reachable from a terminal into a renderable graph. Inputs can only reference nodes
/// that already exist, so every graph is acyclic by construction.
///
/// Dropping the graph releases every allocated output.
pub struct FilterGraph<R: Renderable> {
    nodes: Vec<NodeSlot<R>>,
    disposed: bool,
}

impl<R: Renderable> Default for FilterGraph<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderable> FilterGraph<R> {
    /// Empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            disposed: false,
        }
    }

    /// Number of nodes ever added (including nodes optimized away).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when no node was added.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `true` once [`FilterGraph::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Add a node consuming `inputs` in order.
    pub fn add(
        &mut self,
        filter: impl Filter<R>,
        inputs: impl IntoIterator<Item = NodeId>,
    ) -> ChainResult<NodeId> {
        self.add_boxed(Box::new(filter), inputs.into_iter().collect())
    }

    /// Add a node from an already boxed filter.
    pub fn add_boxed(
        &mut self,
        filter: Box<dyn Filter<R>>,
        inputs: Vec<NodeId>,
    ) -> ChainResult<NodeId> {
        self.ensure_live()?;
        for input in &inputs {
            if input.index() >= self.nodes.len() {
                return Err(ChainError::validation(format!(
                    "{} references unknown input node {}",
                    filter.type_name(),
                    input.0
                )));
            }
        }
        let tag = FilterTag::new(filter.label());
        Ok(self.push(filter, inputs, tag))
    }

    fn push(&mut self, filter: Box<dyn Filter<R>>, inputs: Vec<NodeId>, tag: FilterTag) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeSlot {
            type_name: filter.type_name(),
            filter: Some(filter),
            inputs,
            compiled_inputs: None,
            compiled: None,
            tag,
            output: None,
            filter_index: 0,
            last_dependent_index: 0,
            initialized: false,
            rendered: false,
        });
        id
    }

    /// Inputs of `id`: the compiled inputs once compiled, the declared inputs before.
    pub fn inputs(&self, id: NodeId) -> Option<&[NodeId]> {
        let node = self.nodes.get(id.index())?;
        Some(node.compiled_inputs.as_deref().unwrap_or(&node.inputs))
    }

    /// Filter behaviour of `id`, `None` for unknown ids or after dispose.
    pub fn filter(&self, id: NodeId) -> Option<&(dyn Filter<R> + 'static)> {
        self.nodes.get(id.index())?.filter.as_deref()
    }

    /// Type name of the filter at `id`.
    pub fn type_name(&self, id: NodeId) -> ChainResult<&'static str> {
        Ok(self.slot(id)?.type_name)
    }

    /// Diagnostic tag of `id`.
    pub fn tag(&self, id: NodeId) -> ChainResult<&FilterTag> {
        Ok(&self.slot(id)?.tag)
    }

    /// Mutable diagnostic tag of `id`.
    pub fn tag_mut(&mut self, id: NodeId) -> ChainResult<&mut FilterTag> {
        let i = self.live_index(id)?;
        Ok(&mut self.nodes[i].tag)
    }

    /// Current lifecycle state of `id`.
    pub fn state(&self, id: NodeId) -> ChainResult<NodeState> {
        let node = self.slot(id)?;
        Ok(if self.disposed {
            NodeState::Disposed
        } else if node.rendered {
            NodeState::Rendered
        } else if node.initialized {
            NodeState::Initialized
        } else if node.compiled.is_some() {
            NodeState::Compiled
        } else {
            NodeState::Uncompiled
        })
    }

    /// Lifetime indices of an initialized node.
    pub fn lifetime(&self, id: NodeId) -> Option<Lifetime> {
        let node = self.nodes.get(id.index())?;
        node.initialized.then_some(Lifetime {
            filter_index: node.filter_index,
            last_dependent_index: node.last_dependent_index,
        })
    }

    /// `true` while `id` holds a defined output (allocated or not).
    pub fn has_output(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index())
            .is_some_and(|n| n.output.is_some())
    }

    /// Output of `id`, defined on first access. Never allocates.
    pub fn output(&mut self, id: NodeId) -> ChainResult<&R> {
        let i = self.live_index(id)?;
        self.define_output(i)?;
        self.nodes[i]
            .output
            .as_ref()
            .ok_or_else(|| ChainError::invalid_operation("output vanished after definition"))
    }

    fn define_output(&mut self, i: usize) -> ChainResult<()> {
        if self.nodes[i].output.is_some() {
            return Ok(());
        }
        let inputs = self.effective_inputs(i);
        for input in &inputs {
            self.define_output(input.index())?;
        }

        let node = &self.nodes[i];
        let filter = node
            .filter
            .as_deref()
            .ok_or_else(|| ChainError::invalid_operation("graph disposed"))?;
        let refs = self.input_outputs(&inputs)?;
        let output = filter
            .define_output(&refs)
            .map_err(|e| ChainError::render(node.type_name, e))?;
        self.nodes[i].output = Some(output);
        Ok(())
    }

    /// Compile the node `id` and everything it depends on.
    ///
    /// Inputs are compiled first, their tags are merged into this node's tag, then the filter
    /// may optimize itself. The result is memoized: compiling again returns the same node.
    pub fn compile(&mut self, id: NodeId) -> ChainResult<NodeId> {
        let i = self.live_index(id)?;
        if let Some(done) = self.nodes[i].compiled {
            return Ok(done);
        }

        let declared = self.nodes[i].inputs.clone();
        let mut compiled_inputs = Vec::with_capacity(declared.len());
        for input in &declared {
            compiled_inputs.push(self.compile(*input)?);
        }

        let input_tags: Vec<FilterTag> = declared
            .iter()
            .map(|n| self.nodes[n.index()].tag.clone())
            .collect();
        self.nodes[i].tag.add_prefix(&input_tags);
        self.nodes[i].compiled_inputs = Some(compiled_inputs.clone());

        let decision = {
            let filter = self.nodes[i]
                .filter
                .as_deref()
                .ok_or_else(|| ChainError::invalid_operation("graph disposed"))?;
            filter.optimize(&OptimizeCtx {
                graph: &*self,
                node: id,
            })
        };

        let result = match decision {
            Optimize::Keep => id,
            Optimize::Forward(pos) => *compiled_inputs.get(pos).ok_or_else(|| {
                ChainError::validation(format!(
                    "{} forwarded to missing input {pos}",
                    self.nodes[i].type_name
                ))
            })?,
            Optimize::Replace { filter, inputs } => {
                for input in &inputs {
                    let is_compiled = self
                        .nodes
                        .get(input.index())
                        .is_some_and(|n| n.compiled == Some(*input));
                    if !is_compiled {
                        return Err(ChainError::validation(format!(
                            "{} replacement references uncompiled node {}",
                            self.nodes[i].type_name, input.0
                        )));
                    }
                }
                let tag = self.nodes[i].tag.clone();
                let replaced = self.push(filter, inputs.clone(), tag);
                let slot = &mut self.nodes[replaced.index()];
                slot.compiled_inputs = Some(inputs);
                slot.compiled = Some(replaced);
                replaced
            }
        };

        if result != id {
            tracing::debug!(
                from = self.nodes[i].type_name,
                to = self.nodes[result.index()].type_name,
                "filter optimized"
            );
        }
        self.nodes[i].compiled = Some(result);
        Ok(result)
    }

    /// Assign lifetime indices to the compiled node `id` and its inputs.
    ///
    /// Indices are propagated down the inputs, the node's own index is fixed, then pushed back
    /// to the inputs so each one stays valid until its last consumer rendered. An initialized
    /// node only ever raises its last dependent index.
    pub fn initialize(&mut self, id: NodeId, time: u32) -> ChainResult<()> {
        let i = self.live_index(id)?;
        {
            let node = &mut self.nodes[i];
            if node.initialized {
                node.last_dependent_index = node.last_dependent_index.max(time);
                return Ok(());
            }
            if node.compiled != Some(id) {
                return Err(ChainError::invalid_operation(format!(
                    "uncompiled filter {} cannot be initialized",
                    node.type_name
                )));
            }
            node.last_dependent_index = time;
        }

        let inputs = self.effective_inputs(i);
        for input in &inputs {
            self.initialize(*input, self.nodes[i].last_dependent_index)?;
            self.nodes[i].last_dependent_index = self.nodes[input.index()].last_dependent_index;
        }

        let type_name = self.nodes[i].type_name;
        if let Some(filter) = self.nodes[i].filter.as_deref_mut() {
            filter
                .initialize()
                .map_err(|e| ChainError::Other(e.context(format!("initialize {type_name}"))))?;
        }

        let filter_index = self.nodes[i].last_dependent_index;
        self.nodes[i].filter_index = filter_index;
        for input in &inputs {
            self.initialize(*input, filter_index)?;
        }

        let node = &mut self.nodes[i];
        node.last_dependent_index += 1;
        node.initialized = true;
        Ok(())
    }

    /// Render `id` for the current frame.
    ///
    /// Inputs render first. Once this node rendered, every input whose last dependent index is
    /// not after this node is reset immediately, releasing its output. Rendering an already
    /// rendered node is a no-op until [`FilterGraph::reset`].
    pub fn render(&mut self, id: NodeId) -> ChainResult<()> {
        let i = self.live_index(id)?;
        if !self.nodes[i].initialized {
            return Err(ChainError::invalid_operation(format!(
                "{} rendered before initialization",
                self.nodes[i].type_name
            )));
        }
        if self.nodes[i].rendered {
            return Ok(());
        }
        self.nodes[i].rendered = true;
        self.define_output(i)?;

        let inputs = self.effective_inputs(i);
        for input in &inputs {
            self.render(*input)?;
        }

        let type_name = self.nodes[i].type_name;
        let mut filter = self.nodes[i]
            .filter
            .take()
            .ok_or_else(|| ChainError::invalid_operation("graph disposed"))?;
        let mut output = self.nodes[i]
            .output
            .take()
            .ok_or_else(|| ChainError::invalid_operation("output vanished before render"))?;

        let result = self.input_outputs(&inputs).and_then(|refs| {
            output
                .allocate()
                .and_then(|()| filter.render(&refs, &mut output))
                .map_err(|e| ChainError::render(type_name, e))
        });

        self.nodes[i].filter = Some(filter);
        self.nodes[i].output = Some(output);
        result?;

        let filter_index = self.nodes[i].filter_index;
        for input in &inputs {
            if self.nodes[input.index()].last_dependent_index <= filter_index {
                self.reset(*input)?;
            }
        }
        Ok(())
    }

    /// Clear the rendered flag of `id` and release its output. Safe without a prior render.
    pub fn reset(&mut self, id: NodeId) -> ChainResult<()> {
        let i = self.live_index(id)?;
        let node = &mut self.nodes[i];
        node.rendered = false;
        if let Some(mut output) = node.output.take() {
            output.deallocate();
        }
        Ok(())
    }

    /// Reset every node, used to recover after a failed frame.
    pub fn reset_all(&mut self) {
        for node in &mut self.nodes {
            node.rendered = false;
            if let Some(mut output) = node.output.take() {
                output.deallocate();
            }
        }
    }

    /// Release every output and drop every filter. Idempotent; later operations fail.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.reset_all();
        for node in &mut self.nodes {
            node.filter = None;
            node.initialized = false;
        }
        self.disposed = true;
        tracing::debug!(nodes = self.nodes.len(), "filter graph disposed");
    }

    fn effective_inputs(&self, i: usize) -> Vec<NodeId> {
        let node = &self.nodes[i];
        node.compiled_inputs.clone().unwrap_or_else(|| node.inputs.clone())
    }

    fn input_outputs(&self, inputs: &[NodeId]) -> ChainResult<Vec<&R>> {
        inputs
            .iter()
            .map(|input| {
                self.nodes[input.index()].output.as_ref().ok_or_else(|| {
                    ChainError::invalid_operation(format!(
                        "output of {} read after release",
                        self.nodes[input.index()].type_name
                    ))
                })
            })
            .collect()
    }

    fn slot(&self, id: NodeId) -> ChainResult<&NodeSlot<R>> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| ChainError::validation(format!("unknown node {}", id.0)))
    }

    fn live_index(&self, id: NodeId) -> ChainResult<usize> {
        self.ensure_live()?;
        self.slot(id)?;
        Ok(id.index())
    }

    fn ensure_live(&self) -> ChainResult<()> {
        if self.disposed {
            return Err(ChainError::invalid_operation("graph disposed"));
        }
        Ok(())
    }
}

impl<R: Renderable + Clone> FilterGraph<R> {
    /// Add a zero-input [`SourceFilter`] emitting copies of `output`.
    pub fn source(&mut self, label: impl Into<String>, output: R) -> ChainResult<NodeId> {
        self.add(SourceFilter::new(label, output), [])
    }
}

impl<R: Renderable> Drop for FilterGraph<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filter/graph.rs"]
mod tests;
