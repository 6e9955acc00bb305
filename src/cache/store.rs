use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use crate::{
    cache::{
        Artifact, ArtifactKind,
        index::{CacheIndex, INDEX_VERSION, IndexEntry, read_index, write_index},
    },
    foundation::error::{ChainError, ChainResult},
};

/// Extension of persisted byte-code files.
pub const BYTE_CODE_EXTENSION: &str = "cso";

/// Reload function turning a persisted byte-code file back into an artifact.
pub type ReloadFn<'a, T> = &'a dyn Fn(&Path) -> anyhow::Result<T>;

/// Counters describing how requests were served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from an in-memory artifact.
    pub hits: u64,
    /// Rebuilt from persisted byte code.
    pub reloads: u64,
    /// Compiled from source.
    pub compiles: u64,
    /// Loaded through `load_by_path`.
    pub loads: u64,
}

struct CacheEntry<T> {
    artifact: Option<Arc<T>>,
    last_modified: SystemTime,
    cache_path: Option<PathBuf>,
}

struct LoadedEntry<T> {
    artifact: Arc<T>,
    last_modified: SystemTime,
}

/// Compiled artifacts of one [`ArtifactKind`], invalidated by source modification time.
///
/// Entries compiled through [`ArtifactCache::compile`] persist their byte code under the cache
/// root, so a later process can reload them from the index instead of compiling again.
/// Artifacts loaded through [`ArtifactCache::load_by_path`] are tracked apart and never indexed.
pub struct ArtifactCache<T> {
    kind: ArtifactKind,
    root: PathBuf,
    compiled: HashMap<String, CacheEntry<T>>,
    loaded: HashMap<String, LoadedEntry<T>>,
    saved: bool,
    stats: CacheStats,
}

impl<T: Artifact> ArtifactCache<T> {
    /// Empty cache persisting under `root`.
    pub fn new(kind: ArtifactKind, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            root: root.into(),
            compiled: HashMap::new(),
            loaded: HashMap::new(),
            saved: true,
            stats: CacheStats::default(),
        }
    }

    /// Kind of artifacts held by this cache.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Directory holding the index and byte-code files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the persisted index.
    pub fn index_path(&self) -> PathBuf {
        self.root.join(self.kind.index_file_name())
    }

    /// Number of compiled entries, including entries only known from the index.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// `true` when no compiled entry is known.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// `true` when a compiled entry exists for the signature `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.compiled.contains_key(key)
    }

    /// Number of artifacts loaded by path.
    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    /// Request counters since construction.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// `true` when nothing changed since the index was last read or written.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Artifact loaded straight from `path`, keyed by its absolute path.
    ///
    /// The cached artifact is reused while the file's modification time is unchanged.
    pub fn load_by_path<F>(&mut self, path: &Path, load: F) -> ChainResult<Arc<T>>
    where
        F: FnOnce(&Path) -> anyhow::Result<T>,
    {
        let path = std::path::absolute(path)?;
        let key = path.to_string_lossy().into_owned();
        let modified = modified_time(&path)?;

        if let Some(artifact) = self
            .loaded
            .get(&key)
            .filter(|e| e.last_modified == modified)
            .map(|e| e.artifact.clone())
        {
            self.stats.hits += 1;
            return Ok(artifact);
        }

        let artifact = Arc::new(load(&path).map_err(|e| ChainError::compile(&key, e))?);
        self.stats.loads += 1;
        tracing::debug!(kind = %self.kind, path = %path.display(), "artifact loaded");
        self.loaded.insert(
            key,
            LoadedEntry {
                artifact: artifact.clone(),
                last_modified: modified,
            },
        );
        Ok(artifact)
    }

    /// Artifact compiled from `source` under the signature `key`.
    ///
    /// An entry is valid while `source` keeps the modification time it had when the entry was
    /// compiled. A valid entry without an in-memory artifact is rebuilt from its byte code
    /// through `reload`; a failing reload falls back to compiling. Compile failures carry `key`.
    pub fn compile<C>(
        &mut self,
        source: &Path,
        key: &str,
        compile: C,
        reload: Option<ReloadFn<'_, T>>,
    ) -> ChainResult<Arc<T>>
    where
        C: FnOnce() -> anyhow::Result<T>,
    {
        let modified = modified_time(source)?;

        if let Some(entry) = self
            .compiled
            .get_mut(key)
            .filter(|e| e.last_modified == modified)
        {
            if let Some(artifact) = &entry.artifact {
                self.stats.hits += 1;
                return Ok(artifact.clone());
            }
            if let (Some(path), Some(reload)) = (&entry.cache_path, reload) {
                match reload(path) {
                    Ok(artifact) => {
                        let artifact = Arc::new(artifact);
                        entry.artifact = Some(artifact.clone());
                        self.stats.reloads += 1;
                        tracing::debug!(kind = %self.kind, key, "artifact reloaded");
                        return Ok(artifact);
                    }
                    Err(err) => {
                        tracing::debug!(kind = %self.kind, key, error = %err, "reload failed");
                    }
                }
            }
        }

        let artifact = Arc::new(compile().map_err(|e| ChainError::compile(key, e))?);
        self.stats.compiles += 1;
        tracing::debug!(kind = %self.kind, key, "artifact compiled");

        if let Some(obsolete) = self.compiled.get(key).and_then(|e| e.cache_path.clone()) {
            if let Err(err) = std::fs::remove_file(&obsolete) {
                tracing::debug!(path = %obsolete.display(), error = %err, "stale byte code kept");
            }
        }

        let cache_path = match artifact.byte_code() {
            Some(bytes) if self.kind.is_persisted() => match self.write_byte_code(bytes) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::warn!(kind = %self.kind, key, error = %err, "byte code not persisted");
                    None
                }
            },
            _ => None,
        };

        self.compiled.insert(
            key.to_string(),
            CacheEntry {
                artifact: Some(artifact.clone()),
                last_modified: modified,
                cache_path,
            },
        );
        self.saved = false;
        Ok(artifact)
    }

    /// Write the index if anything changed since the last load or save.
    ///
    /// Returns `true` when the file was written. Only entries with persisted byte code are
    /// indexed.
    pub fn save(&mut self) -> ChainResult<bool> {
        if self.saved || !self.kind.is_persisted() {
            return Ok(false);
        }
        let index = CacheIndex {
            version: INDEX_VERSION,
            entries: self
                .compiled
                .iter()
                .filter(|(_, e)| e.cache_path.is_some())
                .map(|(k, e)| {
                    (
                        k.clone(),
                        IndexEntry {
                            last_modified: e.last_modified,
                            cache_path: e.cache_path.clone(),
                        },
                    )
                })
                .collect(),
        };
        write_index(&self.index_path(), &index)?;
        self.saved = true;
        tracing::debug!(kind = %self.kind, entries = index.entries.len(), "cache index saved");
        Ok(true)
    }

    /// Merge the persisted index into memory. A missing or unreadable index leaves the cache
    /// cold; returns the number of entries read.
    pub fn load_index(&mut self) -> usize {
        if !self.kind.is_persisted() {
            return 0;
        }
        let path = self.index_path();
        let index = match read_index(&path) {
            Ok(index) => index,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache index ignored");
                return 0;
            }
        };
        let count = index.entries.len();
        for (key, entry) in index.entries {
            self.compiled.entry(key).or_insert(CacheEntry {
                artifact: None,
                last_modified: entry.last_modified,
                cache_path: entry.cache_path,
            });
        }
        tracing::debug!(kind = %self.kind, entries = count, "cache index loaded");
        count
    }

    fn write_byte_code(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        loop {
            let path = self
                .root
                .join(format!("{}.{BYTE_CODE_EXTENSION}", uuid::Uuid::new_v4()));
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

fn modified_time(path: &Path) -> ChainResult<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
