use bytes::Bytes;
use reqwest::{header, Method, StatusCode};

use crate::auth::AuthClient;
use crate::digest::OciDigest;
use crate::error::{Error, Result};
use crate::models::{Descriptor, ImageManifest, MANIFEST_MEDIA_TYPE};
use crate::reference::ImageReference;
use crate::store::ContentStore;

/// A client for one repository of a remote OCI registry.
pub struct RemoteRepository {
    registry_url: String,
    repository: String,
    auth: AuthClient,
}

impl RemoteRepository {
    pub fn new(reference: &ImageReference, auth: AuthClient) -> Self {
        let host = reference.registry().to_string();
        let repository = reference
            .repository
            .strip_prefix(&format!("{}/", host))
            .unwrap_or(&reference.repository)
            .to_string();
        Self {
            registry_url: format!("https://{}", host),
            repository,
            auth,
        }
    }

    /// Fetch manifest bytes for a tag or digest, with a descriptor
    /// derived from the exact bytes received.
    pub async fn fetch_manifest(&self, reference: &str) -> Result<(Bytes, Descriptor)> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.registry_url, self.repository, reference
        );
        let request = self
            .auth
            .request(Method::GET, &url)
            .header(header::ACCEPT, MANIFEST_MEDIA_TYPE);
        let response = self.auth.execute(request).await?;

        if response.status() != StatusCode::OK {
            return Err(Error::RemoteCopy(format!(
                "failed to fetch manifest {}: {}",
                reference,
                response.status()
            )));
        }

        let media_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(MANIFEST_MEDIA_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        let descriptor = Descriptor::from_bytes(media_type, &bytes);
        Ok((bytes, descriptor))
    }

    /// Check whether the registry already has a blob.
    pub async fn blob_exists(&self, digest: &OciDigest) -> Result<bool> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            self.registry_url, self.repository, digest
        );
        let request = self.auth.request(Method::HEAD, &url);
        let response = self.auth.execute(request).await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Fetch a blob by digest.
    pub async fn fetch_blob(&self, digest: &OciDigest) -> Result<Bytes> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            self.registry_url, self.repository, digest
        );
        let request = self.auth.request(Method::GET, &url);
        let response = self.auth.execute(request).await?;

        if response.status() != StatusCode::OK {
            return Err(Error::RemoteCopy(format!(
                "failed to fetch blob {}: {}",
                digest,
                response.status()
            )));
        }
        Ok(response.bytes().await?)
    }

    /// Upload a blob: start an upload session, then complete it with
    /// the digest of the content.
    pub async fn push_blob(&self, digest: &OciDigest, content: &[u8]) -> Result<()> {
        let start_url = format!(
            "{}/v2/{}/blobs/uploads/",
            self.registry_url, self.repository
        );
        let response = self
            .auth
            .execute(self.auth.request(Method::POST, &start_url))
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(Error::RemoteCopy(format!(
                "failed to start blob upload: {}",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::RemoteCopy("no location header in upload response".to_string()))?;
        let upload_url = if location.starts_with("http") {
            location.to_string()
        } else {
            format!("{}{}", self.registry_url, location)
        };

        let sep = if upload_url.contains('?') { '&' } else { '?' };
        let complete_url = format!("{}{}digest={}", upload_url, sep, digest);
        let request = self
            .auth
            .request(Method::PUT, &complete_url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec());
        let response = self.auth.execute(request).await?;

        if response.status() != StatusCode::CREATED {
            return Err(Error::RemoteCopy(format!(
                "failed to complete blob upload {}: {}",
                digest,
                response.status()
            )));
        }
        Ok(())
    }

    /// Register manifest bytes under a tag or digest reference.
    pub async fn put_manifest(
        &self,
        reference: &str,
        media_type: &str,
        content: &[u8],
    ) -> Result<()> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.registry_url, self.repository, reference
        );
        let request = self
            .auth
            .request(Method::PUT, &url)
            .header(header::CONTENT_TYPE, media_type)
            .body(content.to_vec());
        let response = self.auth.execute(request).await?;

        if response.status() != StatusCode::CREATED && response.status() != StatusCode::OK {
            return Err(Error::RemoteCopy(format!(
                "failed to register manifest {}: {}",
                reference,
                response.status()
            )));
        }
        Ok(())
    }

    /// Copy a remote artifact (manifest plus referenced blobs) into a
    /// local store, tagging the manifest under `reference`.
    pub async fn pull(
        &self,
        reference: &str,
        store: &mut dyn ContentStore,
    ) -> Result<Descriptor> {
        let (bytes, descriptor) = self.fetch_manifest(reference).await?;
        let manifest: ImageManifest = serde_json::from_slice(&bytes)
            .map_err(|e| Error::RemoteCopy(format!("invalid manifest {}: {}", reference, e)))?;

        let config = self.fetch_blob(&manifest.config.digest).await?;
        store.push(&manifest.config, &config)?;

        for layer in &manifest.layers {
            let blob = self.fetch_blob(&layer.digest).await?;
            store.push(layer, &blob)?;
        }

        store.push(&descriptor, &bytes)?;
        store.tag(&descriptor, reference)?;
        Ok(descriptor)
    }

    /// Copy a packed artifact from a local store to the registry: all
    /// referenced blobs first, the manifest last so the tag never
    /// points at missing content.
    pub async fn push(
        &self,
        store: &dyn ContentStore,
        manifest: &Descriptor,
        reference: &str,
    ) -> Result<()> {
        let bytes = store.fetch(manifest)?;
        let parsed: ImageManifest = serde_json::from_slice(&bytes)
            .map_err(|e| Error::RemoteCopy(format!("invalid packed manifest: {}", e)))?;

        let mut blobs = vec![parsed.config.clone()];
        blobs.extend(parsed.layers.iter().cloned());
        for descriptor in &blobs {
            if self.blob_exists(&descriptor.digest).await.unwrap_or(false) {
                continue;
            }
            let content = store.fetch(descriptor)?;
            self.push_blob(&descriptor.digest, &content).await?;
        }

        self.put_manifest(reference, &manifest.media_type, &bytes)
            .await
    }
}
