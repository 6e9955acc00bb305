use std::{cell::Cell, path::Path, time::Duration};

use super::*;

#[derive(Debug, PartialEq)]
struct Blob(Vec<u8>);

impl Artifact for Blob {
    fn byte_code(&self) -> Option<&[u8]> {
        Some(&self.0)
    }
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "framechain_{name}_{}_{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn touch(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn reload_blob(path: &Path) -> anyhow::Result<Blob> {
    Ok(Blob(std::fs::read(path)?))
}

#[test]
fn unchanged_source_compiles_once() {
    let tmp = temp_dir("store_compile_once");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "float4 main() {}").unwrap();

    let mut cache = ArtifactCache::new(ArtifactKind::Shader, tmp.join("cache"));
    let calls = Cell::new(0);
    let compile = || -> anyhow::Result<Blob> {
        calls.set(calls.get() + 1);
        Ok(Blob(b"obj".to_vec()))
    };
    let a = cache.compile(&src, "k", compile, None).unwrap();
    let b = cache.compile(&src, "k", compile, None).unwrap();

    assert_eq!(calls.get(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().compiles, 1);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn modification_time_change_recompiles_and_drops_old_byte_code() {
    let tmp = temp_dir("store_touch");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "same content").unwrap();
    touch(&src, 1_000);

    let mut cache = ArtifactCache::new(ArtifactKind::Shader, tmp.join("cache"));
    cache
        .compile(&src, "k", || Ok(Blob(b"v1".to_vec())), None)
        .unwrap();
    let first: Vec<_> = std::fs::read_dir(tmp.join("cache")).unwrap().collect();
    assert_eq!(first.len(), 1);

    touch(&src, 2_000);
    let b = cache
        .compile(&src, "k", || Ok(Blob(b"v2".to_vec())), None)
        .unwrap();
    assert_eq!(b.0, b"v2");
    assert_eq!(cache.stats().compiles, 2);

    let files: Vec<_> = std::fs::read_dir(tmp.join("cache"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"v2");

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn compile_failure_carries_signature_key() {
    let tmp = temp_dir("store_compile_error");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("broken.hlsl");
    std::fs::write(&src, "x").unwrap();

    let mut cache: ArtifactCache<Blob> = ArtifactCache::new(ArtifactKind::Shader, tmp.join("c"));
    let err = cache
        .compile(&src, "\"broken.hlsl\" /E main", || anyhow::bail!("syntax error"), None)
        .unwrap_err();
    match &err {
        ChainError::Compile { key, source } => {
            assert_eq!(key, "\"broken.hlsl\" /E main");
            assert_eq!(source.to_string(), "syntax error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().starts_with("Compilation Error in \"broken.hlsl\""));
    assert!(cache.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn index_round_trip_reloads_without_compiling() {
    let tmp = temp_dir("store_round_trip");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "body").unwrap();
    let root = tmp.join("cache");

    let mut first = ArtifactCache::new(ArtifactKind::Shader, &root);
    first
        .compile(&src, "k", || Ok(Blob(b"persisted".to_vec())), None)
        .unwrap();
    assert!(first.save().unwrap());
    assert!(!first.save().unwrap());
    assert!(root.join("ShaderIndex.json").is_file());

    let mut second = ArtifactCache::new(ArtifactKind::Shader, &root);
    assert_eq!(second.load_index(), 1);
    let blob = second
        .compile(
            &src,
            "k",
            || -> anyhow::Result<Blob> { panic!("must reload") },
            Some(&reload_blob),
        )
        .unwrap();
    assert_eq!(blob.0, b"persisted");
    assert_eq!(second.stats().reloads, 1);
    assert_eq!(second.stats().compiles, 0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn failed_reload_falls_back_to_compile() {
    let tmp = temp_dir("store_reload_failure");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "body").unwrap();
    let root = tmp.join("cache");

    let mut first = ArtifactCache::new(ArtifactKind::Shader, &root);
    first
        .compile(&src, "k", || Ok(Blob(b"old".to_vec())), None)
        .unwrap();
    first.save().unwrap();

    let mut second = ArtifactCache::new(ArtifactKind::Shader, &root);
    second.load_index();
    let failing = |_: &Path| -> anyhow::Result<Blob> { anyhow::bail!("corrupt byte code") };
    let blob = second
        .compile(&src, "k", || Ok(Blob(b"fresh".to_vec())), Some(&failing))
        .unwrap();
    assert_eq!(blob.0, b"fresh");
    assert_eq!(second.stats().compiles, 1);
    assert!(!second.is_saved());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn corrupt_index_is_a_cold_cache() {
    let tmp = temp_dir("store_corrupt_index");
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("ShaderIndex.json"), "{ not json").unwrap();

    let mut cache: ArtifactCache<Blob> = ArtifactCache::new(ArtifactKind::Shader, &tmp);
    assert_eq!(cache.load_index(), 0);
    assert!(cache.is_empty());

    let mut missing: ArtifactCache<Blob> =
        ArtifactCache::new(ArtifactKind::Shader11, tmp.join("nowhere"));
    assert_eq!(missing.load_index(), 0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn kernels_stay_in_memory() {
    let tmp = temp_dir("store_kernel");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("k.cl");
    std::fs::write(&src, "kernel").unwrap();
    let root = tmp.join("cache");

    let mut cache = ArtifactCache::new(ArtifactKind::Kernel, &root);
    cache
        .compile(&src, "k", || Ok(Blob(b"bin".to_vec())), None)
        .unwrap();
    assert!(!cache.save().unwrap());
    assert!(!root.exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn load_by_path_reuses_until_touched() {
    let tmp = temp_dir("store_load_by_path");
    std::fs::create_dir_all(&tmp).unwrap();
    let file = tmp.join("precompiled.cso");
    std::fs::write(&file, b"abc").unwrap();
    touch(&file, 10);

    let mut cache = ArtifactCache::new(ArtifactKind::Shader, tmp.join("cache"));
    let a = cache.load_by_path(&file, reload_blob).unwrap();
    let b = cache.load_by_path(&file, reload_blob).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().loads, 1);

    std::fs::write(&file, b"xyz").unwrap();
    touch(&file, 20);
    let c = cache.load_by_path(&file, reload_blob).unwrap();
    assert_eq!(c.0, b"xyz");
    assert_eq!(cache.stats().loads, 2);
    assert_eq!(cache.loaded_len(), 1);
    assert!(cache.is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn loaded_artifacts_never_shadow_compiled_entries() {
    let tmp = temp_dir("store_loaded_apart");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, b"precompiled").unwrap();
    let key = std::path::absolute(&src)
        .unwrap()
        .to_string_lossy()
        .into_owned();
    let root = tmp.join("cache");

    let mut cache = ArtifactCache::new(ArtifactKind::Shader, &root);
    let loaded = cache.load_by_path(&src, reload_blob).unwrap();
    assert_eq!(loaded.0, b"precompiled");
    assert!(!cache.contains(&key));

    let compiled = cache
        .compile(&src, &key, || Ok(Blob(b"compiled".to_vec())), None)
        .unwrap();
    assert_eq!(compiled.0, b"compiled");
    assert_eq!(cache.stats().compiles, 1);
    assert_eq!(cache.stats().hits, 0);

    let again = cache.load_by_path(&src, reload_blob).unwrap();
    assert!(Arc::ptr_eq(&loaded, &again));
    assert_eq!((cache.len(), cache.loaded_len()), (1, 1));

    assert!(cache.save().unwrap());
    let index = crate::cache::index::read_index(&cache.index_path()).unwrap();
    assert_eq!(index.entries.len(), 1);

    std::fs::remove_dir_all(&tmp).ok();
}
