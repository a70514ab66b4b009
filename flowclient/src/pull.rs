use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::auth::{authenticate, ScopeAction};
use crate::credentials::Credential;
use crate::error::Result;
use crate::models::{Descriptor, VERSION_ANNOTATION};
use crate::reference::ImageReference;
use crate::remote::RemoteRepository;
use crate::store::{ContentStore, FileStore};
use crate::tarball;

/// Packaging options for a pull.
#[derive(Debug, Default)]
pub struct PullOptions {
    /// Also package the destination directory as a tarball at this path.
    pub tarball: Option<PathBuf>,
    /// Gzip the tarball.
    pub compress: bool,
    /// Trace outgoing registry requests.
    pub trace: bool,
}

/// Pull an artifact into `destination`: copy the remote manifest and
/// blobs, then rewrite `manifest.json` with a version annotation
/// derived from the resolved tag or digest.
pub async fn pull_image(
    configured: &[Credential],
    image: &str,
    destination: &Path,
    options: &PullOptions,
) -> Result<Descriptor> {
    let reference = ImageReference::parse(image)?;
    let auth = authenticate(
        configured,
        &reference.repository,
        ScopeAction::Pull,
        options.trace,
    )
    .await;
    let remote = RemoteRepository::new(&reference, auth);

    let mut store = FileStore::new(destination)?;
    let descriptor = remote.pull(&reference.reference, &mut store).await?;

    let manifest = store.fetch(&descriptor)?;
    let annotated = inject_version_annotation(&manifest, &reference.reference);
    fs::write(destination.join("manifest.json"), &annotated)?;

    if let Some(tarball_path) = &options.tarball {
        tarball::save(destination, tarball_path, options.compress)?;
    }

    Ok(descriptor)
}

/// Add the version annotation to manifest bytes when absent, returning
/// pretty-printed JSON. An existing value is never overwritten, and a
/// manifest that fails to parse is passed through unmodified.
pub fn inject_version_annotation(manifest: &[u8], version: &str) -> Vec<u8> {
    let mut object: serde_json::Map<String, Value> = match serde_json::from_slice(manifest) {
        Ok(Value::Object(map)) => map,
        _ => {
            warn!("manifest is not a JSON object; writing raw bytes");
            return manifest.to_vec();
        }
    };

    let annotations = object
        .entry("annotations")
        .or_insert_with(|| Value::Object(Default::default()));
    if let Some(annotations) = annotations.as_object_mut() {
        annotations
            .entry(VERSION_ANNOTATION)
            .or_insert_with(|| Value::String(version.to_string()));
    }

    match serde_json::to_vec_pretty(&Value::Object(object)) {
        Ok(pretty) => pretty,
        Err(_) => manifest.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_version_when_absent() {
        let manifest = br#"{"schemaVersion": 2, "layers": []}"#;
        let out = inject_version_annotation(manifest, "1.2.3");
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["annotations"][VERSION_ANNOTATION], "1.2.3");
    }

    #[test]
    fn keeps_existing_version() {
        let manifest = format!(
            r#"{{"schemaVersion": 2, "annotations": {{"{}": "9.9.9"}}}}"#,
            VERSION_ANNOTATION
        );
        let out = inject_version_annotation(manifest.as_bytes(), "1.2.3");
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["annotations"][VERSION_ANNOTATION], "9.9.9");
    }

    #[test]
    fn keeps_existing_empty_version() {
        // empty string is a present value, not an absent one
        let manifest = format!(
            r#"{{"schemaVersion": 2, "annotations": {{"{}": ""}}}}"#,
            VERSION_ANNOTATION
        );
        let out = inject_version_annotation(manifest.as_bytes(), "1.2.3");
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["annotations"][VERSION_ANNOTATION], "");
    }

    #[test]
    fn unparseable_manifest_passes_through() {
        let manifest = b"not json";
        let out = inject_version_annotation(manifest, "1.2.3");
        assert_eq!(out, manifest);
    }

    #[test]
    fn non_object_annotations_are_left_alone() {
        let manifest = br#"{"schemaVersion": 2, "annotations": "oops"}"#;
        let out = inject_version_annotation(manifest, "1.2.3");
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["annotations"], "oops");
    }
}
