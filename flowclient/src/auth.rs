use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Method};
use serde::Deserialize;
use tracing::debug;

use crate::credentials::{find_credential, Credential};
use crate::error::Result;

/// The one registry vendor that issues scoped bearer tokens from a
/// well-known endpoint and insists on legacy manifest packing.
const TOKEN_AUTH_HOST: &str = "ghcr.io";

/// Per-registry behavior, keyed by host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryProfile {
    Generic,
    TokenAuthVendor,
}

impl RegistryProfile {
    pub fn for_host(host: &str) -> Self {
        if host == TOKEN_AUTH_HOST {
            RegistryProfile::TokenAuthVendor
        } else {
            RegistryProfile::Generic
        }
    }

    /// Which manifest schema flavor the registry accepts.
    pub fn schema_variant(&self) -> crate::models::SchemaVariant {
        match self {
            RegistryProfile::TokenAuthVendor => crate::models::SchemaVariant::LegacyArtifact,
            RegistryProfile::Generic => crate::models::SchemaVariant::ArtifactV1_1,
        }
    }

    /// The vendor expects image layers to carry the gzip layer media
    /// type with actually-gzipped content.
    pub fn forces_gzip_layers(&self) -> bool {
        matches!(self, RegistryProfile::TokenAuthVendor)
    }

    fn token_endpoint(&self, host: &str) -> Option<String> {
        match self {
            RegistryProfile::TokenAuthVendor => Some(format!("https://{}/token", host)),
            RegistryProfile::Generic => None,
        }
    }
}

/// Action list for a token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAction {
    Pull,
    Push,
}

impl ScopeAction {
    fn actions(&self) -> &'static str {
        match self {
            ScopeAction::Pull => "pull",
            ScopeAction::Push => "push,pull",
        }
    }
}

#[derive(Debug, Clone)]
enum AuthScheme {
    Anonymous,
    Basic(String),
    Bearer(String),
}

/// HTTP transport that injects the resolved credentials into every
/// outgoing request and optionally traces requests before dispatch.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    scheme: AuthScheme,
    trace: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

impl AuthClient {
    fn new(scheme: AuthScheme, trace: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            scheme,
            trace,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(AuthScheme::Anonymous, false)
    }

    /// True when requests go out without credentials.
    pub fn is_anonymous(&self) -> bool {
        matches!(self.scheme, AuthScheme::Anonymous)
    }

    /// Start a request against the registry.
    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Inject credentials, trace if enabled, and dispatch.
    pub async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let builder = match &self.scheme {
            AuthScheme::Anonymous => builder,
            AuthScheme::Basic(encoded) => {
                builder.header(header::AUTHORIZATION, format!("Basic {}", encoded))
            }
            AuthScheme::Bearer(token) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
        };
        let request = builder.build()?;
        if self.trace {
            debug!("--- HTTP Request ---");
            debug!("{} {}", request.method(), request.url());
            for (name, value) in request.headers() {
                debug!("{}: {:?}", name, value);
            }
        }
        Ok(self.http.execute(request).await?)
    }
}

/// Resolve credentials for `repository` and build the transport,
/// exchanging basic credentials for a scoped bearer token where the
/// registry supports it.
pub async fn authenticate(
    configured: &[Credential],
    repository: &str,
    action: ScopeAction,
    trace: bool,
) -> AuthClient {
    let host = repository
        .split_once('/')
        .map(|(host, _)| host)
        .unwrap_or(repository);
    let profile = RegistryProfile::for_host(host);

    let Some(cred) = find_credential(configured, host) else {
        return AuthClient::new(AuthScheme::Anonymous, trace);
    };

    if let Some(endpoint) = profile.token_endpoint(host) {
        let owner_repo = repository
            .strip_prefix(&format!("{}/", host))
            .unwrap_or(repository);
        let scope = format!("repository:{}:{}", owner_repo, action.actions());
        match fetch_token(&endpoint, host, &scope, &cred).await {
            Some(token) => return AuthClient::new(AuthScheme::Bearer(token), trace),
            // Exchange failures are non-fatal; fall back to basic auth
            None => debug!("token exchange with {} failed, using basic auth", host),
        }
    }

    let encoded = BASE64.encode(format!("{}:{}", cred.username, cred.password));
    AuthClient::new(AuthScheme::Basic(encoded), trace)
}

/// Exchange basic credentials for a short-lived bearer token.
async fn fetch_token(endpoint: &str, service: &str, scope: &str, cred: &Credential) -> Option<String> {
    let client = reqwest::Client::new();
    let response = client
        .get(endpoint)
        .query(&[("service", service), ("scope", scope)])
        .basic_auth(&cred.username, Some(&cred.password))
        .send()
        .await
        .ok()?;
    if response.status() != reqwest::StatusCode::OK {
        return None;
    }
    let body: TokenResponse = response.json().await.ok()?;
    if body.token.is_empty() {
        None
    } else {
        Some(body.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchemaVariant;

    #[test]
    fn profile_is_keyed_by_host() {
        assert_eq!(
            RegistryProfile::for_host("ghcr.io"),
            RegistryProfile::TokenAuthVendor
        );
        assert_eq!(
            RegistryProfile::for_host("registry.example.com"),
            RegistryProfile::Generic
        );
    }

    #[test]
    fn vendor_profile_selects_legacy_packing() {
        let profile = RegistryProfile::for_host("ghcr.io");
        assert_eq!(profile.schema_variant(), SchemaVariant::LegacyArtifact);
        assert!(profile.forces_gzip_layers());

        let generic = RegistryProfile::for_host("example.com");
        assert_eq!(generic.schema_variant(), SchemaVariant::ArtifactV1_1);
        assert!(!generic.forces_gzip_layers());
    }

    #[test]
    fn scope_actions() {
        assert_eq!(ScopeAction::Pull.actions(), "pull");
        assert_eq!(ScopeAction::Push.actions(), "push,pull");
    }

    #[tokio::test]
    async fn no_credentials_means_anonymous() {
        let client = authenticate(&[], "registry.invalid/org/repo", ScopeAction::Pull, false).await;
        assert!(client.is_anonymous());
    }
}
