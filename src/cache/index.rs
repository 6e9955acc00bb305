use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::foundation::error::{ChainError, ChainResult};

/// On-disk form of one compiled entry. The artifact itself is never serialized, only where its
/// byte code lives.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct IndexEntry {
    pub(crate) last_modified: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) cache_path: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct CacheIndex {
    pub(crate) version: u32,
    pub(crate) entries: BTreeMap<String, IndexEntry>,
}

pub(crate) const INDEX_VERSION: u32 = 1;

pub(crate) fn read_index(path: &Path) -> ChainResult<CacheIndex> {
    let bytes = std::fs::read(path)?;
    let index: CacheIndex =
        serde_json::from_slice(&bytes).map_err(|e| ChainError::serde(e.to_string()))?;
    if index.version != INDEX_VERSION {
        return Err(ChainError::serde(format!(
            "unsupported cache index version {}",
            index.version
        )));
    }
    Ok(index)
}

/// Write through a temporary file so a crash never leaves a truncated index behind.
pub(crate) fn write_index(path: &Path, index: &CacheIndex) -> ChainResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(index).map_err(|e| ChainError::serde(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
