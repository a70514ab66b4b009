use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::auth::RegistryProfile;
use crate::error::{Error, Result};
use crate::models::{
    self, Descriptor, ImageManifest, SchemaVariant, CONFIG_MEDIA_TYPE, LAYER_GZIP_MEDIA_TYPE,
    MANIFEST_MEDIA_TYPE,
};
use crate::store::ContentStore;

/// Compute a file's path relative to the artifact root.
///
/// Fails with `InvalidPath` when the file does not live under the root
/// (empty relative path, `.`, or any `..` escape).
fn relative_path(file: &Path, root: &Path) -> Result<PathBuf> {
    let invalid = || Error::InvalidPath {
        file: file.to_path_buf(),
        root: root.to_path_buf(),
    };
    let file_abs = std::path::absolute(file).map_err(|_| invalid())?;
    let root_abs = std::path::absolute(root).map_err(|_| invalid())?;
    let relative = file_abs.strip_prefix(&root_abs).map_err(|_| invalid())?;
    if relative.as_os_str().is_empty() || relative == Path::new(".") {
        return Err(invalid());
    }
    // `absolute` is purely lexical, so `..` may survive the prefix check
    if !relative
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)))
    {
        return Err(invalid());
    }
    Ok(relative.to_path_buf())
}

/// Pack a set of local files into `store` as an OCI artifact and tag
/// the resulting manifest under `tag` and under its own digest.
///
/// Each file becomes a layer whose title annotation is its path
/// relative to `root_dir`. The registry profile decides the manifest
/// schema flavor; the legacy variant additionally gzips every layer
/// and drops the artifact type, which the vendor rejects under that
/// schema.
pub fn pack_files(
    store: &mut dyn ContentStore,
    files: &[PathBuf],
    root_dir: &Path,
    artifact_type: &str,
    profile: RegistryProfile,
    tag: &str,
) -> Result<Descriptor> {
    let mut layers = Vec::with_capacity(files.len());
    for file in files {
        let relative = relative_path(file, root_dir)?;
        let title = relative.to_string_lossy().replace('\\', "/");
        let mut data = fs::read(file)?;

        let media_type = if profile.forces_gzip_layers() {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            data = encoder.finish()?;
            LAYER_GZIP_MEDIA_TYPE
        } else {
            models::media_type_for(file)
        };

        let descriptor = Descriptor::from_bytes(media_type, &data).with_title(title);
        store.push(&descriptor, &data)?;
        layers.push(descriptor);
    }

    let config = models::config_blob();
    let config_descriptor = Descriptor::from_bytes(CONFIG_MEDIA_TYPE, &config);
    store.push(&config_descriptor, &config)?;

    let artifact_type = match profile.schema_variant() {
        SchemaVariant::LegacyArtifact => None,
        SchemaVariant::ArtifactV1_1 => Some(artifact_type.to_string()),
    };
    let manifest = ImageManifest {
        schema_version: 2,
        media_type: Some(MANIFEST_MEDIA_TYPE.to_string()),
        artifact_type,
        config: config_descriptor,
        layers,
        annotations: None,
    };

    let bytes = serde_json::to_vec(&manifest)?;
    let descriptor = Descriptor::from_bytes(MANIFEST_MEDIA_TYPE, &bytes);
    store.push(&descriptor, &bytes)?;
    store.tag(&descriptor, tag)?;
    let digest = descriptor.digest.to_string();
    store.tag(&descriptor, &digest)?;
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::io::Read;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn packed_manifest(store: &MemoryStore, descriptor: &Descriptor) -> ImageManifest {
        let bytes = store.fetch(descriptor).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn packs_files_with_relative_titles() {
        let dir = tempfile::tempdir().unwrap();
        let flow = write_file(dir.path(), "flow.json", b"{}");
        let script = write_file(dir.path(), "dist/main.mjs", b"export {}");

        let mut store = MemoryStore::new();
        let descriptor = pack_files(
            &mut store,
            &[flow, script],
            dir.path(),
            "application/vnd.flow.artifact.v1",
            RegistryProfile::Generic,
            "1.0",
        )
        .unwrap();

        let manifest = packed_manifest(&store, &descriptor);
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(
            manifest.artifact_type.as_deref(),
            Some("application/vnd.flow.artifact.v1")
        );
        assert_eq!(manifest.layers.len(), 2);
        assert_eq!(manifest.layers[0].title(), Some("flow.json"));
        assert_eq!(manifest.layers[0].media_type, "application/json");
        assert_eq!(manifest.layers[1].title(), Some("dist/main.mjs"));
        assert_eq!(manifest.layers[1].media_type, "application/javascript");
    }

    #[test]
    fn legacy_profile_drops_artifact_type_and_gzips() {
        let dir = tempfile::tempdir().unwrap();
        let flow = write_file(dir.path(), "flow.json", b"{\"topics\": []}");

        let mut store = MemoryStore::new();
        let descriptor = pack_files(
            &mut store,
            &[flow],
            dir.path(),
            "application/vnd.flow.artifact.v1",
            RegistryProfile::TokenAuthVendor,
            "1.0",
        )
        .unwrap();

        let manifest = packed_manifest(&store, &descriptor);
        assert_eq!(manifest.artifact_type, None);
        assert_eq!(manifest.layers[0].media_type, LAYER_GZIP_MEDIA_TYPE);

        // the stored layer really is gzipped; hash covers compressed bytes
        let blob = store.fetch(&manifest.layers[0]).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(blob.as_ref());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, b"{\"topics\": []}");
    }

    #[test]
    fn file_outside_root_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = write_file(other.path(), "c.json", b"{}");

        let mut store = MemoryStore::new();
        let result = pack_files(
            &mut store,
            &[outside],
            root.path(),
            "application/vnd.flow.artifact.v1",
            RegistryProfile::Generic,
            "1.0",
        );
        assert!(matches!(result, Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn root_itself_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let result = pack_files(
            &mut store,
            &[root.path().to_path_buf()],
            root.path(),
            "application/vnd.flow.artifact.v1",
            RegistryProfile::Generic,
            "1.0",
        );
        assert!(matches!(result, Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn manifest_is_tagged_under_tag_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let flow = write_file(dir.path(), "flow.toml", b"topics = []");

        let mut store = MemoryStore::new();
        let descriptor = pack_files(
            &mut store,
            &[flow],
            dir.path(),
            "application/vnd.flow.artifact.v1",
            RegistryProfile::Generic,
            "2.1.0",
        )
        .unwrap();

        assert_eq!(store.resolve("2.1.0").unwrap().digest, descriptor.digest);
        assert_eq!(
            store
                .resolve(&descriptor.digest.to_string())
                .unwrap()
                .digest,
            descriptor.digest
        );
    }
}
