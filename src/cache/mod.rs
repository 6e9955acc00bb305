mod artifact;
mod index;
mod manager;
mod store;

pub use artifact::{Artifact, ArtifactKind};
pub use manager::{CacheConfig, CacheManager, kernel_signature, relative_path, shader_signature};
pub use store::{ArtifactCache, BYTE_CODE_EXTENSION, CacheStats, ReloadFn};
