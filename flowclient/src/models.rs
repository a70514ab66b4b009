use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::digest::OciDigest;

/// The mediatype for an OCI manifest.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
/// The mediatype for an image config blob.
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";
/// The mediatype for a gzip-compressed image layer.
pub const LAYER_GZIP_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
/// The mediatype used for plain file layers with no better classification.
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// Annotation key holding a layer's relative path inside the artifact.
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";
/// Annotation key holding the artifact version.
pub const VERSION_ANNOTATION: &str = "org.opencontainers.image.version";

/// Default artifact type for flow images.
pub const DEFAULT_ARTIFACT_TYPE: &str = "application/vnd.flow.artifact.v1";

/// Manifest schema flavor accepted by the target registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Image-manifest compatible packing; the artifact type field must
    /// stay empty or the registry rejects the manifest.
    LegacyArtifact,
    /// OCI artifact packing with a populated `artifactType`.
    ArtifactV1_1,
}

/// Represents a descriptor for a content blob in an OCI registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content
    pub media_type: String,
    /// Digest of the referenced content
    pub digest: OciDigest,
    /// Size of the referenced content in bytes
    pub size: u64,
    /// Optional annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl Descriptor {
    /// Build a descriptor for the exact bytes that will be stored.
    pub fn from_bytes(media_type: impl Into<String>, content: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            digest: OciDigest::from_bytes(content),
            size: content.len() as u64,
            annotations: None,
        }
    }

    /// Attach the title annotation naming the blob's relative path.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.annotations
            .get_or_insert_with(HashMap::new)
            .insert(TITLE_ANNOTATION.to_string(), title.into());
        self
    }

    /// The title annotation, when present.
    pub fn title(&self) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(TITLE_ANNOTATION))
            .map(String::as_str)
    }
}

/// Represents an OCI artifact manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Schema version of the manifest
    pub schema_version: i32,
    /// Media type of the manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Artifact type; absent under the legacy schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    /// Descriptor for the config blob
    pub config: Descriptor,
    /// Descriptors for the layer blobs
    pub layers: Vec<Descriptor>,
    /// Optional annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

/// The minimal config blob registered with every pushed artifact.
/// Registries require a config blob even when the artifact has no
/// runtime semantics.
pub fn config_blob() -> Vec<u8> {
    br#"{"architecture":"amd64","os":"linux","created_by":"flowadm"}"#.to_vec()
}

/// Classify a layer media type from the file extension.
pub fn media_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("mjs") | Some("js") => "application/javascript",
        _ => OCTET_STREAM_MEDIA_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn descriptor_tracks_exact_bytes() {
        let content = b"{\"flow\": true}";
        let desc = Descriptor::from_bytes("application/json", content);
        assert_eq!(desc.size, content.len() as u64);
        assert_eq!(desc.digest, OciDigest::from_bytes(content));
    }

    #[test]
    fn title_annotation_round_trips() {
        let desc = Descriptor::from_bytes(OCTET_STREAM_MEDIA_TYPE, b"x").with_title("dist/main.mjs");
        assert_eq!(desc.title(), Some("dist/main.mjs"));
    }

    #[test]
    fn media_type_by_extension() {
        assert_eq!(media_type_for(Path::new("flow.json")), "application/json");
        assert_eq!(media_type_for(Path::new("flow.toml")), "application/toml");
        assert_eq!(media_type_for(Path::new("dist/main.mjs")), "application/javascript");
        assert_eq!(media_type_for(Path::new("main.js")), "application/javascript");
        assert_eq!(media_type_for(Path::new("README.md")), OCTET_STREAM_MEDIA_TYPE);
    }

    #[test]
    fn manifest_serializes_camel_case() {
        let manifest = ImageManifest {
            schema_version: 2,
            media_type: Some(MANIFEST_MEDIA_TYPE.to_string()),
            artifact_type: None,
            config: Descriptor::from_bytes(CONFIG_MEDIA_TYPE, &config_blob()),
            layers: vec![],
            annotations: None,
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"schemaVersion\":2"));
        assert!(json.contains("\"mediaType\""));
        // absent artifact type must not serialize at all
        assert!(!json.contains("artifactType"));
    }
}
