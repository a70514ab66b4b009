//! `flowadm images` subcommands.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use flowclient::models::{DEFAULT_ARTIFACT_TYPE, VERSION_ANNOTATION};
use flowclient::{local_name, publish_image, pull_image, tarball, PullOptions};
use serde_json::{json, Value};

use crate::config::FlowConfig;
use crate::output;

#[derive(Subcommand)]
pub enum ImagesCommand {
    /// List local flow images
    #[command(alias = "ls")]
    List(ListArgs),
    /// Pull a flow image from an OCI registry
    Pull(PullArgs),
    /// Push a flow image to an OCI registry
    Push(PushArgs),
    /// Save a flow image from a registry as a tarball
    Save(SaveArgs),
    /// Load a flow image from a tarball (local file or URL)
    Load(LoadArgs),
    /// Remove a local flow image version (by folder name)
    #[command(alias = "rm")]
    Remove(RemoveArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Output format: table|json
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct PullArgs {
    /// Image reference (e.g. "ghcr.io/org/flow:1.0")
    pub image: String,
}

#[derive(Args)]
pub struct PushArgs {
    /// Image reference to publish under
    pub image: String,

    /// File(s) to include in the artifact (repeatable)
    #[arg(long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Root directory for path preservation inside the artifact
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// OCI artifact type
    #[arg(long = "type", default_value = DEFAULT_ARTIFACT_TYPE)]
    pub artifact_type: String,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Image reference to save
    pub image: String,

    /// Path to the output tarball (e.g. image.tar or image.tar.gz)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Compress the tarball using gzip
    #[arg(long)]
    pub compress: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Tarball source: local path or HTTP(S) URL
    pub source: String,

    /// Directory to extract the artifact contents to (default: under image_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Image folder name, e.g. "flow:1.0"
    pub folder: String,
}

pub async fn execute(command: ImagesCommand, config: Option<&Path>, trace: bool) -> Result<()> {
    let cfg = FlowConfig::load(config)?;
    match command {
        ImagesCommand::List(args) => list(args, &cfg),
        ImagesCommand::Pull(args) => pull(args, &cfg, trace).await,
        ImagesCommand::Push(args) => push(args, &cfg, trace).await,
        ImagesCommand::Save(args) => save(args, &cfg, trace).await,
        ImagesCommand::Load(args) => load(args, &cfg).await,
        ImagesCommand::Remove(args) => remove(args, &cfg),
    }
}

async fn pull(args: PullArgs, cfg: &FlowConfig, trace: bool) -> Result<()> {
    let destination = cfg.image_dir.join(local_name(&args.image, false));
    let options = PullOptions {
        trace,
        ..Default::default()
    };
    pull_image(&cfg.registries, &args.image, &destination, &options)
        .await
        .context("pull failed")?;
    println!("Image {} pulled to {}", args.image, destination.display());
    Ok(())
}

async fn push(args: PushArgs, cfg: &FlowConfig, trace: bool) -> Result<()> {
    let descriptor = publish_image(
        &cfg.registries,
        &args.image,
        &args.artifact_type,
        &args.files,
        &args.root,
        trace,
    )
    .await
    .context("push failed")?;
    eprintln!(
        "Image {} pushed to registry as type {} ({})",
        args.image, args.artifact_type, descriptor.digest
    );
    Ok(())
}

async fn save(args: SaveArgs, cfg: &FlowConfig, trace: bool) -> Result<()> {
    // stage the pull in a scratch directory; only the tarball survives
    let staging = tempfile::tempdir().context("failed to create temp dir")?;
    let options = PullOptions {
        tarball: Some(args.output.clone()),
        compress: args.compress,
        trace,
    };
    pull_image(&cfg.registries, &args.image, staging.path(), &options)
        .await
        .context("save failed")?;
    println!("Image saved to {}", args.output.display());
    Ok(())
}

async fn load(args: LoadArgs, cfg: &FlowConfig) -> Result<()> {
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => cfg.image_dir.join(local_name(&args.source, false)),
    };
    fs::create_dir_all(&output_dir).context("failed to create output dir")?;
    eprintln!("Loading image from {} to {}", args.source, output_dir.display());
    tarball::extract(&args.source, &output_dir)
        .await
        .context("failed to load image")?;
    println!("Image loaded to {}", output_dir.display());
    Ok(())
}

fn list(args: ListArgs, cfg: &FlowConfig) -> Result<()> {
    let mut rows = Vec::new();
    if cfg.image_dir.exists() {
        let mut entries: Vec<_> = fs::read_dir(&cfg.image_dir)
            .context("failed to read image dir")?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let (version, digest) = manifest_summary(&entry.path().join("manifest.json"));
            rows.push((name, version, digest));
        }
    }

    let format = output_format(args.output.as_deref());
    if format == "json" {
        for (name, version, digest) in &rows {
            let obj = json!({"name": name, "version": version, "digest": digest});
            println!("{}", obj);
        }
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No flow images are available locally.");
        return Ok(());
    }
    let mut table = output::new_table(&["NAME", "VERSION", "DIGEST"]);
    for (name, version, digest) in &rows {
        table.add_row(vec![name, version, &output::short_digest(digest)]);
    }
    println!("{table}");
    Ok(())
}

fn remove(args: RemoveArgs, cfg: &FlowConfig) -> Result<()> {
    let path = cfg.image_dir.join(&args.folder);
    if !path.exists() {
        eprintln!(
            "Image folder {} does not exist locally, skipping removal.",
            args.folder
        );
        return Ok(());
    }
    fs::remove_dir_all(&path).context("failed to remove image directory")?;
    eprintln!("Image folder {} removed ({})", args.folder, path.display());
    Ok(())
}

/// Read version and digest out of a pulled manifest.json for display.
fn manifest_summary(path: &Path) -> (String, String) {
    let unknown = || ("<unknown>".to_string(), "<unknown>".to_string());
    let Ok(data) = fs::read(path) else {
        return unknown();
    };
    let Ok(manifest) = serde_json::from_slice::<Value>(&data) else {
        return unknown();
    };
    let version = manifest["annotations"][VERSION_ANNOTATION]
        .as_str()
        .unwrap_or("<unknown>")
        .to_string();
    let digest = manifest["digest"]
        .as_str()
        .or_else(|| manifest["config"]["digest"].as_str())
        .unwrap_or("<unknown>")
        .to_string();
    (version, digest)
}

/// Output format selection: explicit flag first, then TTY detection.
pub(crate) fn output_format(flag: Option<&str>) -> &'static str {
    match flag {
        Some("json") | Some("jsonl") => "json",
        Some(_) => "table",
        None => {
            if std::io::stdout().is_terminal() {
                "table"
            } else {
                "json"
            }
        }
    }
}
