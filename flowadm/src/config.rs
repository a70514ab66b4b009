use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use flowclient::Credential;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawConfig {
    image_dir: String,
    #[serde(default)]
    deploy_dir: String,
    #[serde(default)]
    registries: Vec<Credential>,
}

/// Loaded flowadm configuration.
///
/// Directory fields keep their unexpanded form for display next to the
/// expanded paths used for filesystem access.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub image_dir: PathBuf,
    pub deploy_dir: PathBuf,
    pub raw_image_dir: String,
    pub raw_deploy_dir: String,
    pub registries: Vec<Credential>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowadm")
        .join("config.toml")
}

fn default_image_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowadm")
        .join("images")
        .to_string_lossy()
        .into_owned()
}

impl FlowConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        debug!("loading configuration from {}", path.display());

        let cfg = Config::builder()
            .set_default("image_dir", default_image_dir())?
            .set_default("deploy_dir", "")?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("FLOWADM"))
            .build()
            .context("failed to load config")?;
        let raw: RawConfig = cfg.try_deserialize().context("invalid config")?;

        let image_dir = PathBuf::from(expand_path(&raw.image_dir));
        let deploy_dir = if !raw.deploy_dir.is_empty() {
            PathBuf::from(expand_path(&raw.deploy_dir))
        } else if let Some(dir) = env::var("DEPLOY_DIR").ok().filter(|d| !d.is_empty()) {
            PathBuf::from(dir)
        } else {
            image_dir
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("deployments")
        };
        let raw_deploy_dir = if raw.deploy_dir.is_empty() {
            "$DEPLOY_DIR".to_string()
        } else {
            raw.deploy_dir.clone()
        };

        Ok(FlowConfig {
            image_dir,
            deploy_dir,
            raw_image_dir: raw.image_dir,
            raw_deploy_dir,
            registries: raw.registries,
        })
    }
}

/// Expand a leading `~` and `$VAR`/`${VAR}` references in a path
/// value. Unset variables expand to the empty string.
pub fn expand_path(value: &str) -> String {
    let mut rest = value;
    let mut expanded = String::with_capacity(value.len());

    if let Some(home) = dirs::home_dir() {
        if rest == "~" {
            return home.to_string_lossy().into_owned();
        }
        if let Some(suffix) = rest.strip_prefix("~/") {
            expanded.push_str(&home.to_string_lossy());
            expanded.push('/');
            rest = suffix;
        }
    }

    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < rest.len() {
        if bytes[i] == b'$' {
            let (name, next) = if bytes.get(i + 1) == Some(&b'{') {
                match rest[i + 2..].find('}') {
                    Some(end) => (&rest[i + 2..i + 2 + end], i + 2 + end + 1),
                    None => ("", i),
                }
            } else {
                let start = i + 1;
                let mut end = start;
                while end < rest.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                (&rest[start..end], end)
            };
            if !name.is_empty() {
                expanded.push_str(&env::var(name).unwrap_or_default());
                i = next;
                continue;
            }
        }
        let ch = rest[i..].chars().next().unwrap();
        expanded.push(ch);
        i += ch.len_utf8();
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_plain_variables() {
        env::set_var("FLOWADM_TEST_BASE", "/srv/flows");
        assert_eq!(
            expand_path("$FLOWADM_TEST_BASE/images"),
            "/srv/flows/images"
        );
        env::remove_var("FLOWADM_TEST_BASE");
    }

    #[test]
    fn expands_braced_variables() {
        env::set_var("FLOWADM_TEST_BRACED", "/data");
        assert_eq!(expand_path("${FLOWADM_TEST_BRACED}/x"), "/data/x");
        env::remove_var("FLOWADM_TEST_BRACED");
    }

    #[test]
    fn unset_variable_expands_to_empty() {
        assert_eq!(expand_path("$FLOWADM_TEST_UNSET_VAR/images"), "/images");
    }

    #[test]
    fn tilde_prefix_expands_to_home() {
        let expanded = expand_path("~/images");
        if let Some(home) = dirs::home_dir() {
            assert!(expanded.starts_with(&home.to_string_lossy().into_owned()));
            assert!(expanded.ends_with("/images"));
        }
    }

    #[test]
    fn literal_paths_pass_through() {
        assert_eq!(expand_path("/var/lib/flows"), "/var/lib/flows");
        assert_eq!(expand_path("relative/dir"), "relative/dir");
    }
}
