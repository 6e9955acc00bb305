use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, Once},
};

use crate::{
    cache::{Artifact, ArtifactCache, ArtifactKind, CacheStats, ReloadFn},
    foundation::error::ChainResult,
};

/// Where sources are looked up and compiled artifacts are persisted.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    /// Root that cache keys are made relative to.
    pub source_root: PathBuf,
    /// Directory holding index files and byte code.
    pub cache_root: PathBuf,
}

impl CacheConfig {
    /// Config resolving keys against `source_root` and persisting under `cache_root`.
    pub fn new(source_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            cache_root: cache_root.into(),
        }
    }
}

/// Process-wide entry point to the per-kind artifact caches.
///
/// Each kind is guarded by its own lock, held across the whole lookup-or-compile sequence, so
/// concurrent requests for the same signature compile once. The persisted indices are read on
/// first use; every request waits until that read has finished.
pub struct CacheManager<T> {
    config: CacheConfig,
    shader: Mutex<ArtifactCache<T>>,
    shader11: Mutex<ArtifactCache<T>>,
    kernel: Mutex<ArtifactCache<T>>,
    loaded: Once,
}

impl<T: Artifact> CacheManager<T> {
    /// Manager over empty caches; indices are read lazily by [`CacheManager::load`].
    pub fn new(config: CacheConfig) -> Self {
        let cache = |kind| Mutex::new(ArtifactCache::new(kind, config.cache_root.clone()));
        Self {
            shader: cache(ArtifactKind::Shader),
            shader11: cache(ArtifactKind::Shader11),
            kernel: cache(ArtifactKind::Kernel),
            config,
            loaded: Once::new(),
        }
    }

    /// Roots this manager was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read the persisted indices. Runs once per manager; concurrent callers block until the
    /// first call has finished and later calls are no-ops.
    pub fn load(&self) {
        self.loaded.call_once(|| {
            for kind in ArtifactKind::ALL {
                self.lock(kind).load_index();
            }
        });
    }

    /// Write every index that changed.
    pub fn save(&self) -> ChainResult<()> {
        for kind in ArtifactKind::ALL {
            self.lock(kind).save()?;
        }
        Ok(())
    }

    /// Request counters of the `kind` cache.
    pub fn stats(&self, kind: ArtifactKind) -> CacheStats {
        self.lock(kind).stats()
    }

    /// Number of entries cached for `kind`.
    pub fn len(&self, kind: ArtifactKind) -> usize {
        self.lock(kind).len()
    }

    /// Compile (or fetch) a legacy pixel shader.
    pub fn compile_shader<C, L>(
        &self,
        file: &Path,
        entry: &str,
        profile: &str,
        macros: Option<&str>,
        compile: C,
        reload: L,
    ) -> ChainResult<Arc<T>>
    where
        C: FnOnce(&Path) -> anyhow::Result<T>,
        L: Fn(&Path) -> anyhow::Result<T>,
    {
        let rel = relative_path(&self.config.source_root, file)?;
        let key = shader_signature(&rel, entry, profile, macros);
        self.fetch(ArtifactKind::Shader, file, &key, compile, Some(&reload))
    }

    /// Compile (or fetch) a shader-model-5 shader.
    pub fn compile_shader11<C, L>(
        &self,
        file: &Path,
        entry: &str,
        profile: &str,
        macros: Option<&str>,
        compile: C,
        reload: L,
    ) -> ChainResult<Arc<T>>
    where
        C: FnOnce(&Path) -> anyhow::Result<T>,
        L: Fn(&Path) -> anyhow::Result<T>,
    {
        let rel = relative_path(&self.config.source_root, file)?;
        let key = shader_signature(&rel, entry, profile, macros);
        self.fetch(ArtifactKind::Shader11, file, &key, compile, Some(&reload))
    }

    /// Compile (or fetch) a compute kernel. Kernels live in memory only.
    pub fn compile_kernel<C>(
        &self,
        file: &Path,
        entry: &str,
        options: Option<&str>,
        compile: C,
    ) -> ChainResult<Arc<T>>
    where
        C: FnOnce(&Path) -> anyhow::Result<T>,
    {
        let rel = relative_path(&self.config.source_root, file)?;
        let key = kernel_signature(&rel, entry, options);
        self.fetch(ArtifactKind::Kernel, file, &key, compile, None)
    }

    /// Load a precompiled legacy shader straight from `file`.
    pub fn load_shader<F>(&self, file: &Path, load: F) -> ChainResult<Arc<T>>
    where
        F: FnOnce(&Path) -> anyhow::Result<T>,
    {
        self.lock(ArtifactKind::Shader).load_by_path(file, load)
    }

    /// Load a precompiled shader-model-5 shader straight from `file`.
    pub fn load_shader11<F>(&self, file: &Path, load: F) -> ChainResult<Arc<T>>
    where
        F: FnOnce(&Path) -> anyhow::Result<T>,
    {
        self.lock(ArtifactKind::Shader11).load_by_path(file, load)
    }

    fn fetch<C>(
        &self,
        kind: ArtifactKind,
        file: &Path,
        key: &str,
        compile: C,
        reload: Option<ReloadFn<'_, T>>,
    ) -> ChainResult<Arc<T>>
    where
        C: FnOnce(&Path) -> anyhow::Result<T>,
    {
        self.load();
        let mut cache = self.lock(kind);
        let artifact = cache.compile(file, key, || compile(file), reload)?;
        if let Err(err) = cache.save() {
            tracing::warn!(%kind, error = %err, "cache index not saved");
        }
        Ok(artifact)
    }

    fn lock(&self, kind: ArtifactKind) -> MutexGuard<'_, ArtifactCache<T>> {
        let cache = match kind {
            ArtifactKind::Shader => &self.shader,
            ArtifactKind::Shader11 => &self.shader11,
            ArtifactKind::Kernel => &self.kernel,
        };
        cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cache key of a shader compile.
pub fn shader_signature(rel: &str, entry: &str, profile: &str, macros: Option<&str>) -> String {
    format!(
        "\"{rel}\" /E {entry} /T {profile} /D {}",
        macros.unwrap_or_default()
    )
}

/// Cache key of a kernel compile.
pub fn kernel_signature(rel: &str, entry: &str, options: Option<&str>) -> String {
    format!("\"{rel}\" /E {entry} /Opts {}", options.unwrap_or_default())
}

/// `file` relative to `root` with `/` separators, or `file` itself when it lies elsewhere.
pub fn relative_path(root: &Path, file: &Path) -> ChainResult<String> {
    let root = std::path::absolute(root)?;
    let file = std::path::absolute(file)?;
    Ok(match file.strip_prefix(&root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file.to_string_lossy().replace('\\', "/"),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/cache/manager.rs"]
mod tests;
