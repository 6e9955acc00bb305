/// A compiled binary unit (shader, kernel) stored by an [`ArtifactCache`](crate::ArtifactCache).
pub trait Artifact {
    /// Object code to persist so the artifact can be reloaded without recompiling.
    ///
    /// Artifacts returning `None` are only cached in memory.
    fn byte_code(&self) -> Option<&[u8]>;
}

impl<T: Artifact + ?Sized> Artifact for Box<T> {
    fn byte_code(&self) -> Option<&[u8]> {
        (**self).byte_code()
    }
}

/// Logical artifact kinds; each kind owns one cache and one index file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Pixel shaders for the legacy pipeline.
    Shader,
    /// Shaders for the shader-model-5 pipeline.
    Shader11,
    /// Compute kernels. Compiled per process, never persisted.
    Kernel,
}

impl ArtifactKind {
    /// Every kind, in a stable order.
    pub const ALL: [ArtifactKind; 3] = [Self::Shader, Self::Shader11, Self::Kernel];

    /// Deterministic index file name inside the cache root.
    pub fn index_file_name(self) -> &'static str {
        match self {
            Self::Shader => "ShaderIndex.json",
            Self::Shader11 => "Shader11Index.json",
            Self::Kernel => "KernelIndex.json",
        }
    }

    /// `true` when compiled artifacts of this kind are written to disk.
    pub fn is_persisted(self) -> bool {
        !matches!(self, Self::Kernel)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Shader => "shader",
            Self::Shader11 => "shader11",
            Self::Kernel => "kernel",
        })
    }
}
