mod compiler;
mod preset;
mod registry;
mod script;
mod step;

pub use compiler::{CompiledGraph, OutputSink, build_chain, compile_chain};
pub use preset::Preset;
pub use registry::{ChainConfig, FilterRegistry, StepConfig, StepFactory, parse_params};
pub use script::{ChainScript, ChainSource};
pub use step::{Chain, ChainStep};
