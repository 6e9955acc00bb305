use std::path::Path;

use anyhow::Context as _;

use crate::cache::Artifact;

const MAGIC: &[u8; 4] = b"FCK1";

/// Polynomial point kernel `c0 + c1 x + c2 x^2 + ...`, the artifact compiled by the `kernel`
/// step.
///
/// Source files list coefficients separated by whitespace or commas; lines starting with `#`
/// or `//` are comments. Byte code is `FCK1` followed by little-endian `f32` coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct PolyKernel {
    coefficients: Vec<f32>,
    byte_code: Vec<u8>,
}

impl PolyKernel {
    /// Kernel from explicit coefficients, lowest order first. Fails when empty.
    pub fn from_coefficients(coefficients: Vec<f32>) -> anyhow::Result<Self> {
        if coefficients.is_empty() {
            anyhow::bail!("kernel has no coefficients");
        }
        let mut byte_code = Vec::with_capacity(MAGIC.len() + coefficients.len() * 4);
        byte_code.extend_from_slice(MAGIC);
        for c in &coefficients {
            byte_code.extend_from_slice(&c.to_le_bytes());
        }
        Ok(Self {
            coefficients,
            byte_code,
        })
    }

    /// Compile kernel source text.
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let mut coefficients = Vec::new();
        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            for token in line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
            {
                let value: f32 = token
                    .parse()
                    .with_context(|| format!("line {}: bad coefficient '{token}'", line_no + 1))?;
                coefficients.push(value);
            }
        }
        Self::from_coefficients(coefficients)
    }

    /// Compile the kernel source at `path`.
    pub fn compile_source(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("read kernel source '{}'", path.display()))?;
        Self::parse(&source)
    }

    /// Rebuild a kernel from persisted byte code.
    pub fn from_byte_code(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let body = bytes
            .strip_prefix(MAGIC.as_slice())
            .context("not kernel byte code")?;
        if body.len() % 4 != 0 {
            anyhow::bail!("truncated kernel byte code");
        }
        let coefficients = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_coefficients(coefficients)
    }

    /// Coefficients, lowest order first.
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Evaluate at `x`.
    pub fn eval(&self, x: f32) -> f32 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

impl Artifact for PolyKernel {
    fn byte_code(&self) -> Option<&[u8]> {
        Some(&self.byte_code)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/builtin/kernel.rs"]
mod tests;
