use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framechain::{
    ArtifactCache, ArtifactKind, CacheConfig, CacheManager, Chain, ChainConfig, ChainError,
    ChainResult, ChainScript, ChainSource, FilterGraph, FilterRegistry, NodeId,
    builtin::{Plane, PolyKernel, register_builtin},
};

#[derive(Parser, Debug)]
#[command(name = "framechain", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render frames through a chain described in JSON.
    Render(RenderArgs),
    /// Print the persisted artifact cache indices.
    Cache(CacheArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Chain description JSON.
    #[arg(long)]
    config: PathBuf,

    /// Number of frames to render.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 64)]
    height: u32,

    /// Value of every input pixel.
    #[arg(long, default_value_t = 0.5)]
    value: f32,

    /// Root kernel paths are made relative to (defaults to the config's directory).
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Directory for cache indices and byte code.
    #[arg(long, default_value = ".framechain-cache")]
    cache_root: PathBuf,

    /// Write the last frame as a grayscale PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CacheArgs {
    /// Directory holding cache indices.
    #[arg(long, default_value = ".framechain-cache")]
    cache_root: PathBuf,
}

struct PlaneSource {
    width: u32,
    height: u32,
    value: f32,
}

impl PlaneSource {
    fn frame(&self) -> Plane {
        Plane::filled(self.width, self.height, self.value)
    }
}

impl ChainSource<Plane> for PlaneSource {
    fn name(&self) -> &str {
        "PlaneSource"
    }

    fn make_initial(&mut self, graph: &mut FilterGraph<Plane>) -> ChainResult<NodeId> {
        graph.source("Frame", self.frame())
    }

    fn handle_error(
        &mut self,
        graph: &mut FilterGraph<Plane>,
        _err: &ChainError,
    ) -> ChainResult<NodeId> {
        graph.source("Passthrough", self.frame())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Cache(args) => cmd_cache(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = ChainConfig::from_path(&args.config)
        .with_context(|| format!("read chain config '{}'", args.config.display()))?;

    let source_root = args.source_root.clone().unwrap_or_else(|| {
        args.config
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    });
    let kernels = Arc::new(CacheManager::<PolyKernel>::new(CacheConfig::new(
        source_root,
        &args.cache_root,
    )));

    let mut registry = FilterRegistry::new();
    register_builtin(&mut registry, kernels)?;
    let preset = registry.build_preset(&config)?;

    let source = PlaneSource {
        width: args.width,
        height: args.height,
        value: args.value,
    };
    let mut script = ChainScript::new(Chain::new().then(preset), source);
    script.update()?;
    eprintln!("chain: {}", script.status());

    let mut last: Option<Plane> = None;
    for frame in 0..args.frames {
        let mut sink = |p: &Plane| -> anyhow::Result<()> {
            last = Some(p.clone());
            Ok(())
        };
        if !script.execute(&mut sink) {
            anyhow::bail!("frame {frame} failed:\n{}", script.status());
        }
    }

    let Some(plane) = last else {
        eprintln!("no frames rendered");
        return Ok(());
    };
    let pixels = plane.pixels()?;
    let mean = pixels.iter().sum::<f32>() / pixels.len().max(1) as f32;
    eprintln!("rendered {} frame(s), mean {mean:.4}", args.frames);

    if let Some(out) = &args.out {
        write_png(out, &plane)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

fn write_png(path: &Path, plane: &Plane) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let bytes = plane
        .pixels()?
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let img = image::GrayImage::from_raw(plane.width(), plane.height(), bytes)
        .context("plane size does not match its pixels")?;
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

fn cmd_cache(args: CacheArgs) -> anyhow::Result<()> {
    for kind in ArtifactKind::ALL {
        let mut cache = ArtifactCache::<PolyKernel>::new(kind, &args.cache_root);
        let entries = cache.load_index();
        let state = if !kind.is_persisted() {
            "memory only"
        } else if cache.index_path().is_file() {
            "persisted"
        } else {
            "empty"
        };
        let name = kind.to_string();
        println!(
            "{name:<9} {entries:>5} entries  {state:<11}  {}",
            cache.index_path().display()
        );
    }
    Ok(())
}
