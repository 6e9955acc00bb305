use crate::{
    chain::{Chain, CompiledGraph, OutputSink, compile_chain},
    filter::{FilterGraph, NodeId, Renderable},
    foundation::error::{ChainError, ChainResult, ErrorReport},
};

const STATUS_INVALID: &str = "Status Invalid";

/// Host side of a [`ChainScript`]: supplies the initial node and the fallback chain.
pub trait ChainSource<R: Renderable> {
    /// Name used when attributing failures that are not tied to one filter.
    fn name(&self) -> &str;

    /// Add the node every chain starts from (usually a source filter for the current frame).
    fn make_initial(&mut self, graph: &mut FilterGraph<R>) -> ChainResult<NodeId>;

    /// Last chance to adjust the chain output before compilation.
    fn finalize_output(
        &mut self,
        _graph: &mut FilterGraph<R>,
        output: NodeId,
    ) -> ChainResult<NodeId> {
        Ok(output)
    }

    /// Build a minimal graph used when the configured chain cannot be built.
    fn handle_error(&mut self, graph: &mut FilterGraph<R>, err: &ChainError) -> ChainResult<NodeId>;
}

type Reporter = Box<dyn FnMut(&ErrorReport)>;

/// Drives one chain: rebuilds its graph on configuration changes and renders frames.
///
/// The current graph is only replaced once its successor is fully compiled and initialized;
/// the previous graph is disposed afterwards.
pub struct ChainScript<R: Renderable, S: ChainSource<R>> {
    chain: Chain<R>,
    source: S,
    current: Option<CompiledGraph<R>>,
    status: String,
    reporter: Option<Reporter>,
}

impl<R: Renderable, S: ChainSource<R>> ChainScript<R, S> {
    /// Script for `chain`; call [`ChainScript::update`] before rendering.
    pub fn new(chain: Chain<R>, source: S) -> Self {
        Self {
            chain,
            source,
            current: None,
            status: String::new(),
            reporter: None,
        }
    }

    /// Install a callback receiving every formatted failure.
    pub fn with_reporter(mut self, reporter: impl FnMut(&ErrorReport) + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Diagnostic status: the chain description, or the last failure.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The installed graph, if any.
    pub fn current(&self) -> Option<&CompiledGraph<R>> {
        self.current.as_ref()
    }

    /// `true` while a compiled graph is installed.
    pub fn has_graph(&self) -> bool {
        self.current.is_some()
    }

    /// Host collaborator.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Host collaborator, mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Replace the chain. Takes effect on the next [`ChainScript::update`].
    pub fn set_chain(&mut self, chain: Chain<R>) {
        self.chain = chain;
    }

    /// Rebuild the graph from the current chain.
    ///
    /// A failing chain is replaced by the source's error chain, labelled with the failure. Only
    /// when the error chain fails too is an error returned; the previous graph then stays
    /// installed.
    #[tracing::instrument(skip(self), fields(script = self.source.name()))]
    pub fn update(&mut self) -> ChainResult<()> {
        let next = match self.build() {
            Ok(graph) => graph,
            Err(err) => {
                let report = ErrorReport::new(self.source.name(), &err);
                tracing::warn!(error = %err, "chain build failed, using error chain");
                self.report(&report);
                match self.build_error_chain(&err, &report) {
                    Ok(graph) => graph,
                    Err(fatal) => {
                        self.status = ErrorReport::new(self.source.name(), &fatal).to_string();
                        return Err(fatal);
                    }
                }
            }
        };

        let previous = self.current.replace(next);
        drop(previous);
        self.update_status();
        Ok(())
    }

    /// Render one frame into `sink`. Returns `false` when the frame failed; the status then
    /// holds the formatted failure and the graph is reset for the next attempt.
    pub fn execute<K>(&mut self, sink: &mut K) -> bool
    where
        K: OutputSink<R> + ?Sized,
    {
        let Some(current) = self.current.as_mut() else {
            self.status = STATUS_INVALID.to_string();
            return false;
        };

        match current.render_frame(sink) {
            Ok(()) => true,
            Err(err) => {
                current.graph_mut().reset_all();
                let report = ErrorReport::new(self.source.name(), &err);
                tracing::error!(error = %err, "frame render failed");
                self.status = report.to_string();
                self.report(&report);
                false
            }
        }
    }

    /// Dispose the installed graph.
    pub fn dispose(&mut self) {
        self.current = None;
        self.status = STATUS_INVALID.to_string();
    }

    fn build(&mut self) -> ChainResult<CompiledGraph<R>> {
        let mut graph = FilterGraph::new();
        let initial = self.source.make_initial(&mut graph)?;
        let processed = self.chain.process(&mut graph, initial)?;
        let output = self.source.finalize_output(&mut graph, processed)?;
        compile_chain(graph, output)
    }

    fn build_error_chain(
        &mut self,
        err: &ChainError,
        report: &ErrorReport,
    ) -> ChainResult<CompiledGraph<R>> {
        let mut graph = FilterGraph::new();
        let output = self.source.handle_error(&mut graph, err)?;
        let mut compiled = compile_chain(graph, output)?;
        let terminal = compiled.terminal();
        compiled
            .graph_mut()
            .tag_mut(terminal)?
            .add_note(report.to_string());
        Ok(compiled)
    }

    fn update_status(&mut self) {
        self.status = match &self.current {
            Some(graph) => graph.status(),
            None => STATUS_INVALID.to_string(),
        };
    }

    fn report(&mut self, report: &ErrorReport) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter(report);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/chain/script.rs"]
mod tests;
