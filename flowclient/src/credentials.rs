use std::collections::HashMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Registry credentials resolved from configuration or a local
/// Docker-style credential file.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub registry: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerAuthEntry {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Platform-conventional candidate paths for the Docker credential file.
pub fn docker_credential_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
        if !dir.is_empty() {
            paths.push(PathBuf::from(dir).join("config.json"));
        }
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".docker").join("config.json"));
    }
    paths
}

/// Resolve credentials for a registry host.
///
/// Lookup order: explicitly configured per-registry entries first, then
/// Docker credential files. Returns `None` when no source yields both a
/// username and a password (anonymous access).
pub fn find_credential(configured: &[Credential], registry: &str) -> Option<Credential> {
    find_credential_in(configured, registry, &docker_credential_paths())
}

/// Like [`find_credential`], with explicit credential-file candidates.
pub fn find_credential_in(
    configured: &[Credential],
    registry: &str,
    candidates: &[PathBuf],
) -> Option<Credential> {
    for cred in configured {
        if cred.registry == registry && !cred.username.is_empty() && !cred.password.is_empty() {
            return Some(cred.clone());
        }
    }

    for path in candidates {
        if let Some((username, password)) = credential_from_file(path, registry) {
            return Some(Credential {
                registry: registry.to_string(),
                username,
                password,
            });
        }
    }

    None
}

/// Look up a registry in one Docker credential file. Failure to open or
/// parse the file is not fatal; resolution continues elsewhere.
fn credential_from_file(path: &PathBuf, registry: &str) -> Option<(String, String)> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            debug!("skipping credential file {}: {}", path.display(), err);
            return None;
        }
    };
    let config: DockerConfigFile = match serde_json::from_slice(&data) {
        Ok(config) => config,
        Err(err) => {
            debug!("skipping credential file {}: {}", path.display(), err);
            return None;
        }
    };

    for (key, entry) in &config.auths {
        // Deliberately permissive: tolerate host vs host:port mismatches
        if !registry.contains(key.as_str()) && !key.contains(registry) {
            continue;
        }
        if !entry.username.is_empty() && !entry.password.is_empty() {
            return Some((entry.username.clone(), entry.password.clone()));
        }
        if let Some(pair) = decode_auth_token(&entry.auth) {
            return Some(pair);
        }
    }
    None
}

/// Decode a base64 `user:pass` token from an `auth` field.
fn decode_auth_token(token: &str) -> Option<(String, String)> {
    if token.is_empty() {
        return None;
    }
    let decoded = BASE64.decode(token).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    if user.is_empty() || pass.is_empty() {
        return None;
    }
    Some((user.to_string(), pass.to_string()))
}
