use crate::{
    chain::Chain,
    filter::{FilterGraph, NodeId, Renderable},
    foundation::error::{ChainError, ChainResult},
};

/// Receives the terminal output of every rendered frame.
///
/// The output is only valid for the duration of the call: it is released right after.
pub trait OutputSink<R> {
    /// Consume one rendered frame.
    fn push(&mut self, output: &R) -> anyhow::Result<()>;
}

impl<R, F> OutputSink<R> for F
where
    F: FnMut(&R) -> anyhow::Result<()>,
{
    fn push(&mut self, output: &R) -> anyhow::Result<()> {
        self(output)
    }
}

/// A compiled and initialized graph together with its terminal node.
pub struct CompiledGraph<R: Renderable> {
    graph: FilterGraph<R>,
    terminal: NodeId,
}

impl<R: Renderable> CompiledGraph<R> {
    /// Terminal node handed to the sink.
    pub fn terminal(&self) -> NodeId {
        self.terminal
    }

    /// Underlying graph.
    pub fn graph(&self) -> &FilterGraph<R> {
        &self.graph
    }

    /// Underlying graph, mutably.
    pub fn graph_mut(&mut self) -> &mut FilterGraph<R> {
        &mut self.graph
    }

    /// End-to-end description of the chain, taken from the terminal node's tag.
    pub fn status(&self) -> String {
        self.graph
            .tag(self.terminal)
            .map(|t| t.describe())
            .unwrap_or_default()
    }

    /// Render one frame: render the terminal, hand its output to `sink`, reset the terminal.
    pub fn render_frame<S>(&mut self, sink: &mut S) -> ChainResult<()>
    where
        S: OutputSink<R> + ?Sized,
    {
        self.graph.render(self.terminal)?;
        let output = self.graph.output(self.terminal)?;
        sink.push(output)
            .map_err(|e| ChainError::Other(e.context("output sink rejected frame")))?;
        self.graph.reset(self.terminal)
    }
}

/// Compile `terminal` and initialize the result, seeding lifetime indices at 1.
pub fn compile_chain<R: Renderable>(
    mut graph: FilterGraph<R>,
    terminal: NodeId,
) -> ChainResult<CompiledGraph<R>> {
    let terminal = graph.compile(terminal)?;
    graph.initialize(terminal, 1)?;
    tracing::debug!(
        nodes = graph.len(),
        terminal = graph.type_name(terminal)?,
        "chain compiled"
    );
    Ok(CompiledGraph { graph, terminal })
}

/// Build a fresh graph from `initial`, fold it through `chain` and compile the result.
pub fn build_chain<R, F>(chain: &Chain<R>, initial: F) -> ChainResult<CompiledGraph<R>>
where
    R: Renderable,
    F: FnOnce(&mut FilterGraph<R>) -> ChainResult<NodeId>,
{
    let mut graph = FilterGraph::new();
    let input = initial(&mut graph)?;
    let terminal = chain.process(&mut graph, input)?;
    compile_chain(graph, terminal)
}
