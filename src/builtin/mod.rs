//! Reference filters over a CPU [`Plane`], used by the CLI and the tests.

mod filters;
mod kernel;
mod plane;

use std::{path::PathBuf, sync::Arc};

pub use filters::{Add, Gain, Identity, KernelFilter};
pub use kernel::PolyKernel;
pub use plane::Plane;

use crate::{
    cache::CacheManager,
    chain::{ChainStep, FilterRegistry, parse_params},
    filter::{FilterGraph, NodeId},
    foundation::error::{ChainError, ChainResult},
};

struct Step<F> {
    name: &'static str,
    build: F,
}

impl<F> ChainStep<Plane> for Step<F>
where
    F: Fn(&mut FilterGraph<Plane>, NodeId) -> ChainResult<NodeId>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, graph: &mut FilterGraph<Plane>, input: NodeId) -> ChainResult<NodeId> {
        (self.build)(graph, input)
    }
}

fn step<F>(name: &'static str, build: F) -> Box<dyn ChainStep<Plane>>
where
    F: Fn(&mut FilterGraph<Plane>, NodeId) -> ChainResult<NodeId> + 'static,
{
    Box::new(Step { name, build })
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GainParams {
    #[serde(default = "unit")]
    factor: f32,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BoostParams {
    #[serde(default = "unit")]
    amount: f32,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct KernelParams {
    path: PathBuf,
    #[serde(default = "default_entry")]
    entry: String,
}

fn unit() -> f32 {
    1.0
}

fn default_entry() -> String {
    "main".to_string()
}

/// Register `identity`, `gain`, `boost` and `kernel`.
///
/// `kernel` compiles its source through the in-memory kernel cache of `kernels` when the chain
/// is built, so a broken kernel surfaces as a chain build failure.
pub fn register_builtin(
    registry: &mut FilterRegistry<Plane>,
    kernels: Arc<CacheManager<PolyKernel>>,
) -> ChainResult<()> {
    registry.register("identity", |params| {
        let extra: serde_json::Map<String, serde_json::Value> = parse_params("identity", params)?;
        if !extra.is_empty() {
            return Err(ChainError::validation("identity takes no parameters"));
        }
        Ok(step("identity", |g, input| g.add(Identity, [input])))
    })?;

    registry.register("gain", |params| {
        let p: GainParams = parse_params("gain", params)?;
        Ok(step("gain", move |g, input| g.add(Gain::new(p.factor), [input])))
    })?;

    registry.register("boost", |params| {
        let p: BoostParams = parse_params("boost", params)?;
        Ok(step("boost", move |g, input| {
            let scaled = g.add(Gain::new(p.amount), [input])?;
            g.add(Add, [input, scaled])
        }))
    })?;

    registry.register("kernel", move |params| {
        let p: KernelParams = parse_params("kernel", params)?;
        let kernels = kernels.clone();
        Ok(step("kernel", move |g, input| {
            let kernel =
                kernels.compile_kernel(&p.path, &p.entry, None, PolyKernel::compile_source)?;
            let name = p
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "kernel".to_string());
            g.add(KernelFilter::new(name, kernel), [input])
        }))
    })?;

    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/builtin/registry.rs"]
mod tests;
