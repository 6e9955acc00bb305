use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    builtin::{Plane, PolyKernel},
    filter::{Filter, Optimize, OptimizeCtx},
};

fn first_input<'a>(type_name: &str, inputs: &[&'a Plane]) -> anyhow::Result<&'a Plane> {
    inputs
        .first()
        .copied()
        .with_context(|| format!("{type_name} needs an input"))
}

fn map_pixels(input: &Plane, output: &mut Plane, f: impl Fn(f32) -> f32) -> anyhow::Result<()> {
    let src = input.pixels()?;
    for (dst, &v) in output.pixels_mut()?.iter_mut().zip(src) {
        *dst = f(v);
    }
    Ok(())
}

/// Pass-through; compiled away onto its input.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Filter<Plane> for Identity {
    fn type_name(&self) -> &'static str {
        "Identity"
    }

    fn define_output(&self, inputs: &[&Plane]) -> anyhow::Result<Plane> {
        Ok(first_input(self.type_name(), inputs)?.like())
    }

    fn render(&mut self, inputs: &[&Plane], output: &mut Plane) -> anyhow::Result<()> {
        map_pixels(first_input(self.type_name(), inputs)?, output, |v| v)
    }

    fn optimize(&self, _ctx: &OptimizeCtx<'_, Plane>) -> Optimize<Plane> {
        Optimize::Forward(0)
    }
}

/// Multiplies every pixel by `factor`.
///
/// A unit gain compiles away and consecutive gains fuse into one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gain {
    /// Multiplier applied to each pixel.
    pub factor: f32,
}

impl Gain {
    /// Gain by `factor`.
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }
}

impl Filter<Plane> for Gain {
    fn type_name(&self) -> &'static str {
        "Gain"
    }

    fn label(&self) -> String {
        format!("Gain({})", self.factor)
    }

    fn define_output(&self, inputs: &[&Plane]) -> anyhow::Result<Plane> {
        Ok(first_input(self.type_name(), inputs)?.like())
    }

    fn render(&mut self, inputs: &[&Plane], output: &mut Plane) -> anyhow::Result<()> {
        let factor = self.factor;
        map_pixels(first_input(self.type_name(), inputs)?, output, |v| v * factor)
    }

    fn optimize(&self, ctx: &OptimizeCtx<'_, Plane>) -> Optimize<Plane> {
        if self.factor == 1.0 {
            return Optimize::Forward(0);
        }
        match (ctx.downcast_input::<Gain>(0), ctx.inputs().first()) {
            (Some(inner), Some(&inner_id)) => Optimize::Replace {
                filter: Box::new(Gain::new(self.factor * inner.factor)),
                inputs: ctx.inputs_of(inner_id).to_vec(),
            },
            _ => Optimize::Keep,
        }
    }
}

/// Pixel-wise sum of any number of equally sized inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Add;

impl Filter<Plane> for Add {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn define_output(&self, inputs: &[&Plane]) -> anyhow::Result<Plane> {
        let first = first_input(self.type_name(), inputs)?;
        if let Some(other) = inputs.iter().find(|p| !p.same_size(first)) {
            anyhow::bail!(
                "Add inputs differ in size: {}x{} vs {}x{}",
                first.width(),
                first.height(),
                other.width(),
                other.height()
            );
        }
        Ok(first.like())
    }

    fn render(&mut self, inputs: &[&Plane], output: &mut Plane) -> anyhow::Result<()> {
        let out = output.pixels_mut()?;
        out.fill(0.0);
        for input in inputs {
            for (dst, v) in out.iter_mut().zip(input.pixels()?) {
                *dst += v;
            }
        }
        Ok(())
    }
}

/// Applies a compiled [`PolyKernel`] to every pixel.
#[derive(Clone, Debug)]
pub struct KernelFilter {
    name: String,
    kernel: Arc<PolyKernel>,
}

impl KernelFilter {
    /// Filter labelled `name` running `kernel`.
    pub fn new(name: impl Into<String>, kernel: Arc<PolyKernel>) -> Self {
        Self {
            name: name.into(),
            kernel,
        }
    }

    /// Kernel applied by this filter.
    pub fn kernel(&self) -> &Arc<PolyKernel> {
        &self.kernel
    }
}

impl Filter<Plane> for KernelFilter {
    fn type_name(&self) -> &'static str {
        "KernelFilter"
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn define_output(&self, inputs: &[&Plane]) -> anyhow::Result<Plane> {
        Ok(first_input(self.type_name(), inputs)?.like())
    }

    fn render(&mut self, inputs: &[&Plane], output: &mut Plane) -> anyhow::Result<()> {
        let kernel = &self.kernel;
        map_pixels(first_input(self.type_name(), inputs)?, output, |v| {
            kernel.eval(v)
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/builtin/filters.rs"]
mod tests;
