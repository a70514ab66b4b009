use std::path::{Path, PathBuf};

use crate::auth::{authenticate, RegistryProfile, ScopeAction};
use crate::credentials::Credential;
use crate::error::Result;
use crate::models::Descriptor;
use crate::pack::pack_files;
use crate::reference::ImageReference;
use crate::remote::RemoteRepository;
use crate::store::MemoryStore;

/// Pack local files as an OCI artifact and publish it.
///
/// The blobs are staged in an in-memory store, packed under the schema
/// flavor the target registry accepts, and copied to the remote
/// repository with a push-scoped token where applicable. A failure at
/// any step aborts the whole push.
pub async fn publish_image(
    configured: &[Credential],
    image: &str,
    artifact_type: &str,
    files: &[PathBuf],
    root_dir: &Path,
    trace: bool,
) -> Result<Descriptor> {
    let reference = ImageReference::parse(image)?;
    let profile = RegistryProfile::for_host(reference.registry());

    let mut store = MemoryStore::new();
    let descriptor = pack_files(
        &mut store,
        files,
        root_dir,
        artifact_type,
        profile,
        &reference.reference,
    )?;

    let auth = authenticate(configured, &reference.repository, ScopeAction::Push, trace).await;
    let remote = RemoteRepository::new(&reference, auth);
    remote.push(&store, &descriptor, &reference.reference).await?;

    Ok(descriptor)
}
