//! `flowadm instances` subcommands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use flowclient::models::VERSION_ANNOTATION;
use flowclient::{local_name, pull_image, trim_version, PullOptions};
use serde_json::json;
use toml::{Table, Value};

use crate::config::FlowConfig;
use crate::instance::{set_nested_value, InstanceFile, InstanceMqtt, InstanceStep};
use crate::output;

use super::images::output_format;

/// Entrypoint script expected inside every flow image.
const ENTRYPOINT: &str = "dist/main.mjs";

/// Flow definition files looked up inside an image, in priority order.
const FLOW_DEFINITIONS: &[&str] = &["flow.toml", "pipeline.toml"];

#[derive(Subcommand)]
pub enum InstancesCommand {
    /// List deployed flow instances
    #[command(alias = "ls", alias = "ps")]
    List(ListArgs),
    /// Deploy a flow instance
    #[command(alias = "run")]
    Deploy(DeployArgs),
    /// Remove a deployed flow instance
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
pub struct DeployArgs {
    /// Instance name
    pub name: String,

    /// Image reference (e.g. "ghcr.io/org/flow:1.0")
    pub image: String,

    /// Input topics (repeatable, required)
    #[arg(long = "topics", required = true)]
    pub topics: Vec<String>,

    /// Tick interval in seconds (optional)
    #[arg(long)]
    pub tick: Option<i64>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Instance name
    pub name: String,
}

pub async fn execute(command: InstancesCommand, config: Option<&Path>, trace: bool) -> Result<()> {
    let cfg = FlowConfig::load(config)?;
    match command {
        InstancesCommand::List(args) => list(args, &cfg),
        InstancesCommand::Deploy(args) => deploy(args, &cfg, trace).await,
        InstancesCommand::Remove(args) => remove(args, &cfg),
    }
}

async fn deploy(args: DeployArgs, cfg: &FlowConfig, trace: bool) -> Result<()> {
    fs::create_dir_all(&cfg.deploy_dir).context("failed to create deploy dir")?;

    let image_path = cfg.image_dir.join(local_name(&args.image, false));
    let script_path = image_path.join(ENTRYPOINT);

    if !image_path.exists() {
        eprintln!("Image {} not found locally. Pulling...", args.image);
        let options = PullOptions {
            trace,
            ..Default::default()
        };
        pull_image(&cfg.registries, &args.image, &image_path, &options)
            .await
            .context("failed to pull image")?;
    }

    if !script_path.exists() {
        bail!(
            "image {} does not contain the expected entrypoint at {}",
            args.image,
            script_path.display()
        );
    }

    let instance_path = cfg.deploy_dir.join(format!("{}.toml", args.name));
    let definition = FLOW_DEFINITIONS
        .iter()
        .map(|name| image_path.join(name))
        .find(|path| path.exists());

    let rendered = match definition {
        Some(path) => rewrite_definition(&path, &script_path, &args.topics, args.tick)?,
        None => minimal_instance(&script_path, &args.topics, args.tick)?,
    };
    fs::write(&instance_path, rendered).context("failed to write instance file")?;

    eprintln!(
        "Instance {} deployed at {}",
        args.name,
        instance_path.display()
    );
    Ok(())
}

/// Rewrite an image's flow definition for deployment: inject the input
/// topics, point every step at the image entrypoint, and apply the
/// optional tick interval. All other fields pass through untouched.
fn rewrite_definition(
    path: &Path,
    script_path: &Path,
    topics: &[String],
    tick: Option<i64>,
) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut table: Table = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let topics = Value::Array(
        topics
            .iter()
            .map(|t| Value::String(t.clone()))
            .collect(),
    );
    set_nested_value(&mut table, &["input", "mqtt", "topics"], topics)
        .context("failed to set input.mqtt.topics")?;

    if let Some(Value::Array(steps)) = table.get_mut("steps") {
        for step in steps {
            if let Value::Table(step) = step {
                step.insert(
                    "script".to_string(),
                    Value::String(script_path.display().to_string()),
                );
                if let Some(tick) = tick {
                    if tick > 0 {
                        step.insert("tick_every_seconds".to_string(), Value::Integer(tick));
                    }
                }
            }
        }
    }

    Ok(toml::to_string_pretty(&table)?)
}

/// Fallback instance file for images that carry no flow definition.
fn minimal_instance(script_path: &Path, topics: &[String], tick: Option<i64>) -> Result<String> {
    let instance = InstanceFile {
        input: crate::instance::InstanceInput {
            mqtt: InstanceMqtt {
                topics: topics.to_vec(),
            },
        },
        steps: vec![InstanceStep {
            script: script_path.display().to_string(),
            tick_every_seconds: tick.filter(|t| *t > 0),
        }],
    };
    Ok(toml::to_string_pretty(&instance)?)
}

fn list(args: ListArgs, cfg: &FlowConfig) -> Result<()> {
    let entries = match fs::read_dir(&cfg.deploy_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("No flow instances are currently deployed.");
            return Ok(());
        }
    };

    let mut rows = Vec::new();
    let mut files: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    files.sort_by_key(|e| e.file_name());
    for entry in files {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() || !file_name.ends_with(".toml") {
            continue;
        }
        let name = file_name.trim_end_matches(".toml").to_string();
        let display_path = format!("{}/{}", cfg.raw_deploy_dir, file_name);
        rows.push(instance_row(&entry.path(), name, display_path));
    }

    if rows.is_empty() {
        eprintln!("No flow instances are currently deployed.");
        return Ok(());
    }

    if output_format(args.output.as_deref()) == "json" {
        for row in &rows {
            let obj = json!({
                "name": row.name,
                "path": row.path,
                "topics": row.topics,
                "image": row.image,
                "imageVersion": row.image_version,
            });
            println!("{}", obj);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "PATH", "TOPICS", "IMAGE", "VERSION"]);
    for row in &rows {
        table.add_row(vec![
            &row.name,
            &row.path,
            &row.topics,
            &row.image,
            &row.image_version,
        ]);
    }
    println!("{table}");
    Ok(())
}

struct InstanceRow {
    name: String,
    path: String,
    topics: String,
    image: String,
    image_version: String,
}

/// Build one listing row from a deployed instance file, resolving the
/// owning image folder and its manifest version where possible.
fn instance_row(path: &PathBuf, name: String, display_path: String) -> InstanceRow {
    let mut topics = String::new();
    let mut image = "<invalid>".to_string();
    let mut image_version = "<unknown>".to_string();

    let parsed = fs::read_to_string(path)
        .ok()
        .and_then(|content| toml::from_str::<InstanceFile>(&content).ok());
    if let Some(data) = parsed {
        topics = data.input.mqtt.topics.join(", ");
        if let Some(step) = data.steps.first() {
            // script sits at <image_dir>/<image folder>/dist/main.mjs
            let script = Path::new(&step.script);
            if let Some(image_dir) = script.parent().and_then(|p| p.parent()) {
                if let Some(folder) = image_dir.file_name() {
                    image = trim_version(&folder.to_string_lossy()).to_string();
                }
                if let Ok(manifest) = fs::read(image_dir.join("manifest.json")) {
                    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&manifest) {
                        if let Some(version) = value["annotations"][VERSION_ANNOTATION].as_str() {
                            image_version = version.to_string();
                        }
                    }
                }
            }
        }
    }

    InstanceRow {
        name,
        path: display_path,
        topics,
        image,
        image_version,
    }
}

fn remove(args: RemoveArgs, cfg: &FlowConfig) -> Result<()> {
    let path = cfg.deploy_dir.join(format!("{}.toml", args.name));
    if !path.exists() {
        bail!(
            "instance '{}' not found in {}",
            args.name,
            cfg.deploy_dir.display()
        );
    }
    fs::remove_file(&path).context("failed to remove instance file")?;
    eprintln!("Instance {} removed ({})", args.name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_flow_definition() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("flow.toml");
        fs::write(
            &definition,
            r#"
name = "counter"

[input.mqtt]
topics = ["old/topic"]

[[steps]]
script = "old.mjs"
"#,
        )
        .unwrap();

        let script = dir.path().join("dist").join("main.mjs");
        let topics = vec!["te/device/main///m/+".to_string()];
        let rendered = rewrite_definition(&definition, &script, &topics, Some(5)).unwrap();

        let table: Table = toml::from_str(&rendered).unwrap();
        assert_eq!(table["name"], Value::String("counter".into()));
        assert_eq!(
            table["input"]["mqtt"]["topics"],
            Value::Array(vec![Value::String("te/device/main///m/+".into())])
        );
        let steps = table["steps"].as_array().unwrap();
        assert_eq!(
            steps[0]["script"],
            Value::String(script.display().to_string())
        );
        assert_eq!(steps[0]["tick_every_seconds"], Value::Integer(5));
    }

    #[test]
    fn zero_tick_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("flow.toml");
        fs::write(&definition, "[[steps]]\nscript = \"old.mjs\"\n").unwrap();

        let script = dir.path().join("dist").join("main.mjs");
        let rendered =
            rewrite_definition(&definition, &script, &["t".to_string()], Some(0)).unwrap();
        let table: Table = toml::from_str(&rendered).unwrap();
        let steps = table["steps"].as_array().unwrap();
        assert!(steps[0].get("tick_every_seconds").is_none());
    }

    #[test]
    fn minimal_instance_has_topics_and_script() {
        let script = Path::new("/images/flow:1.0/dist/main.mjs");
        let rendered =
            minimal_instance(script, &["a/b".to_string(), "c/d".to_string()], None).unwrap();
        let parsed: InstanceFile = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.input.mqtt.topics, vec!["a/b", "c/d"]);
        assert_eq!(parsed.steps[0].script, script.display().to_string());
        assert_eq!(parsed.steps[0].tick_every_seconds, None);
    }
}
