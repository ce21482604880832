use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

/// One virtual host served by this process. Looked up by the host router
/// from the incoming request's `Host` header.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub service_did: String,
    /// Path to a PEM-encoded EC private key used to sign commits and mint
    /// service JWTs for this host.
    pub jwt_signing_key: String,
    /// Suffixes under which any `<handle>.<suffix>` resolves to this host,
    /// e.g. `["bsky.social"]`.
    #[serde(default)]
    pub user_domains: Vec<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub privacy_policy: Option<String>,
    #[serde(default)]
    pub terms_of_service: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppviewConfig {
    /// Ordered list of backend base URLs; the first healthy one is used.
    #[serde(default)]
    pub backends: Vec<String>,
}

/// HS256 verification secret for bearer access tokens. The PDS never issues
/// tokens itself (see Non-goals); it only needs the shared secret to verify
/// ones minted elsewhere in the account-management flow.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    pub hosts: HashMap<String, HostConfig>,
    pub store: StoreConfig,
    #[serde(default)]
    pub appview: AppviewConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HAVEN_PDS_").split("__"))
            .extract()
    }

    /// Resolves a `Host` header value (already stripped of any `:port`) to
    /// its configured host entry, trying an exact hostname match before
    /// falling back to a user-domain suffix match.
    pub fn resolve_host(&self, host: &str) -> Option<(&str, &HostConfig)> {
        if let Some((name, cfg)) = self.hosts.get_key_value(host) {
            return Some((name.as_str(), cfg));
        }
        self.hosts.iter().find_map(|(name, cfg)| {
            cfg.user_domains
                .iter()
                .any(|suffix| host.ends_with(suffix.as_str()))
                .then_some((name.as_str(), cfg))
        })
    }
}
