use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::SystemTime,
};

use super::*;

#[derive(Debug)]
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

fn reload_blob(path: &Path) -> anyhow::Result<Blob> {
    Ok(Blob(std::fs::read(path)?))
}

#[test]
fn signatures_have_fixed_layout() {
    assert_eq!(
        shader_signature("fx/sharpen.hlsl", "main", "ps_3_0", Some("QUALITY=2")),
        "\"fx/sharpen.hlsl\" /E main /T ps_3_0 /D QUALITY=2"
    );
    assert_eq!(
        shader_signature("a.hlsl", "main", "ps_5_0", None),
        "\"a.hlsl\" /E main /T ps_5_0 /D "
    );
    assert_eq!(
        kernel_signature("k.cl", "run", Some("-cl-fast-relaxed-math")),
        "\"k.cl\" /E run /Opts -cl-fast-relaxed-math"
    );
}

#[test]
fn relative_path_uses_forward_slashes() {
    let root = Path::new("/srv/shaders");
    assert_eq!(
        relative_path(root, Path::new("/srv/shaders/fx/sharpen.hlsl")).unwrap(),
        "fx/sharpen.hlsl"
    );
    assert_eq!(
        relative_path(root, Path::new("/elsewhere/a.hlsl")).unwrap(),
        "/elsewhere/a.hlsl"
    );
}

#[test]
fn same_shader_request_compiles_once_and_persists() {
    let tmp = temp_dir("manager_compile_once");
    std::fs::create_dir_all(tmp.join("src")).unwrap();
    let src = tmp.join("src").join("shader.hlsl");
    std::fs::write(&src, "float4 main() {}").unwrap();
    let config = CacheConfig::new(tmp.join("src"), tmp.join("cache"));

    let manager = CacheManager::new(config.clone());
    let calls = AtomicUsize::new(0);
    let compile = |_: &Path| -> anyhow::Result<Blob> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Blob(b"obj".to_vec()))
    };
    let a = manager
        .compile_shader(&src, "main", "ps_3_0", None, compile, reload_blob)
        .unwrap();
    let b = manager
        .compile_shader(&src, "main", "ps_3_0", None, compile, reload_blob)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(tmp.join("cache").join("ShaderIndex.json").is_file());

    // Different options are a different signature.
    manager
        .compile_shader(&src, "main", "ps_3_0", Some("FAST"), compile, reload_blob)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(manager.len(ArtifactKind::Shader), 2);

    let restarted = CacheManager::new(config);
    let c = restarted
        .compile_shader(&src, "main", "ps_3_0", None, compile, reload_blob)
        .unwrap();
    assert_eq!(c.0, b"obj");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(restarted.stats(ArtifactKind::Shader).reloads, 1);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn kinds_are_cached_separately() {
    let tmp = temp_dir("manager_kinds");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "body").unwrap();
    let manager: CacheManager<Blob> = CacheManager::new(CacheConfig::new(&tmp, tmp.join("cache")));

    let compile = |_: &Path| -> anyhow::Result<Blob> { Ok(Blob(b"x".to_vec())) };
    manager
        .compile_shader(&src, "main", "ps_3_0", None, compile, reload_blob)
        .unwrap();
    manager
        .compile_shader11(&src, "main", "ps_3_0", None, compile, reload_blob)
        .unwrap();
    manager.compile_kernel(&src, "main", None, compile).unwrap();

    for kind in ArtifactKind::ALL {
        assert_eq!(manager.stats(kind).compiles, 1, "{kind}");
    }
    assert!(tmp.join("cache").join("Shader11Index.json").is_file());
    assert!(!tmp.join("cache").join("KernelIndex.json").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn concurrent_requests_compile_once() {
    let tmp = temp_dir("manager_concurrent");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "body").unwrap();
    let manager: CacheManager<Blob> = CacheManager::new(CacheConfig::new(&tmp, tmp.join("cache")));
    let calls = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                manager
                    .compile_shader(
                        &src,
                        "main",
                        "ps_3_0",
                        None,
                        |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Blob(b"obj".to_vec()))
                        },
                        reload_blob,
                    )
                    .unwrap();
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn concurrent_first_requests_wait_for_the_index() {
    let tmp = temp_dir("manager_concurrent_load");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("shader.hlsl");
    std::fs::write(&src, "body").unwrap();
    let config = CacheConfig::new(&tmp, tmp.join("cache"));

    let warm: CacheManager<Blob> = CacheManager::new(config.clone());
    warm.compile_shader(
        &src,
        "main",
        "ps_3_0",
        None,
        |_| Ok(Blob(b"obj".to_vec())),
        reload_blob,
    )
    .unwrap();
    drop(warm);

    for _ in 0..8 {
        let manager: CacheManager<Blob> = CacheManager::new(config.clone());
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let blob = manager
                        .compile_shader(
                            &src,
                            "main",
                            "ps_3_0",
                            None,
                            |_| {
                                calls.fetch_add(1, Ordering::SeqCst);
                                Ok(Blob(b"fresh".to_vec()))
                            },
                            reload_blob,
                        )
                        .unwrap();
                    assert_eq!(blob.0, b"obj");
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.stats(ArtifactKind::Shader).reloads, 1);
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn kernels_use_their_own_signature() {
    let tmp = temp_dir("manager_kernel_signature");
    std::fs::create_dir_all(&tmp).unwrap();
    let src = tmp.join("k.cl");
    std::fs::write(&src, "kernel").unwrap();
    let manager: CacheManager<Blob> = CacheManager::new(CacheConfig::new(&tmp, tmp.join("cache")));

    let err = manager
        .compile_kernel(&src, "run", None, |_| anyhow::bail!("no device"))
        .unwrap_err();
    match err {
        crate::ChainError::Compile { key, .. } => assert_eq!(key, "\"k.cl\" /E run /Opts "),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(manager.len(ArtifactKind::Kernel), 0);

    std::fs::remove_dir_all(&tmp).ok();
}
