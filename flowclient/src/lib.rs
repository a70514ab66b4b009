pub mod auth;
pub mod credentials;
pub mod digest;
pub mod error;
pub mod models;
pub mod pack;
pub mod pull;
pub mod push;
pub mod reference;
pub mod remote;
pub mod store;
pub mod tarball;

// Re-export main client types for convenience
pub use auth::{authenticate, AuthClient, RegistryProfile, ScopeAction};
pub use credentials::{find_credential, Credential};
pub use digest::OciDigest;
pub use error::{Error, Result};
pub use models::{Descriptor, ImageManifest, SchemaVariant};
pub use pull::{pull_image, PullOptions};
pub use push::publish_image;
pub use reference::{local_name, trim_version, ImageReference};
pub use store::{ContentStore, FileStore, MemoryStore};
