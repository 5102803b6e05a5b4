//! Credential resolution with zeroized in-memory storage.
//!
//! Credentials are addressed by logical name (`endpoint/api-credentials`,
//! `identity/api-credentials`, `email/api-credentials`) and resolved through
//! a [`SecretsProvider`]. Values live in [`SecureString`] so the memory is
//! cleared when a bundle is dropped.
//!
//! Resolution failure does not abort adapter construction: callers
//! substitute the placeholder test bundle from [`test_credentials`] so the
//! process can run against mock backends without a secrets backend present.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors that can occur resolving credentials.
#[derive(Error, Debug, Clone)]
pub enum SecretsError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),
}

/// Result type for secrets operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// A string whose backing memory is zeroized on drop.
///
/// Wraps sensitive values so they do not linger in memory after use, and
/// redacts itself in `Debug` and `Display` output so credentials cannot
/// leak through logging.
#[derive(Clone)]
pub struct SecureString(Zeroizing<String>);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(Zeroizing::new(s))
    }

    /// Exposes the secret value. Avoid copying the returned slice; copies
    /// are not zeroized.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl Default for SecureString {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to prevent timing attacks
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SecureString {}

impl Serialize for SecureString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecureString::new(s))
    }
}

/// A named key-value bundle of credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    values: HashMap<String, SecureString>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<SecureString>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&SecureString> {
        self.values.get(key)
    }

    /// Looks up `key`, failing with [`SecretsError::NotFound`] if absent.
    pub fn require(&self, key: &str) -> SecretsResult<&SecureString> {
        self.values
            .get(key)
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolves credential bundles by logical name.
pub trait SecretsProvider: Send + Sync {
    fn get_credentials(&self, logical_name: &str) -> SecretsResult<CredentialBundle>;
}

/// Resolves credentials from process environment variables.
///
/// The logical name maps to an uppercased, underscored variable prefix:
/// `endpoint/api-credentials` with key `client_id` reads
/// `SF_ENDPOINT_API_CREDENTIALS_CLIENT_ID`.
pub struct EnvSecretsProvider {
    prefix: String,
}

impl EnvSecretsProvider {
    pub fn new() -> Self {
        Self {
            prefix: "SF".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_prefix(&self, logical_name: &str) -> String {
        let mangled: String = logical_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_", self.prefix, mangled)
    }
}

impl Default for EnvSecretsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretsProvider for EnvSecretsProvider {
    fn get_credentials(&self, logical_name: &str) -> SecretsResult<CredentialBundle> {
        let prefix = self.var_prefix(logical_name);
        let mut bundle = CredentialBundle::new();
        for (name, value) in std::env::vars() {
            if let Some(key) = name.strip_prefix(&prefix) {
                bundle = bundle.with_value(key.to_ascii_lowercase(), value);
            }
        }
        if bundle.is_empty() {
            return Err(SecretsError::NotFound(logical_name.to_string()));
        }
        Ok(bundle)
    }
}

/// In-memory provider for tests.
#[derive(Default)]
pub struct StaticSecretsProvider {
    bundles: HashMap<String, CredentialBundle>,
}

impl StaticSecretsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(mut self, logical_name: impl Into<String>, bundle: CredentialBundle) -> Self {
        self.bundles.insert(logical_name.into(), bundle);
        self
    }
}

impl SecretsProvider for StaticSecretsProvider {
    fn get_credentials(&self, logical_name: &str) -> SecretsResult<CredentialBundle> {
        self.bundles
            .get(logical_name)
            .cloned()
            .ok_or_else(|| SecretsError::NotFound(logical_name.to_string()))
    }
}

/// Placeholder bundle for a logical name, used when resolution fails so
/// adapters can still be constructed against mock backends.
pub fn test_credentials(logical_name: &str) -> CredentialBundle {
    match logical_name {
        "endpoint/api-credentials" => CredentialBundle::new()
            .with_value("client_id", "test-client-id")
            .with_value("client_secret", "test-client-secret"),
        "identity/api-credentials" => CredentialBundle::new()
            .with_value("tenant_id", "test-tenant-id")
            .with_value("client_id", "test-client-id")
            .with_value("client_secret", "test-client-secret"),
        "email/api-credentials" => CredentialBundle::new()
            .with_value("service_principal", "test-principal")
            .with_value("secret", "test-secret"),
        _ => CredentialBundle::new(),
    }
}

/// Resolves `logical_name` through `provider`, falling back to the
/// placeholder test bundle on failure.
pub fn resolve_or_test(provider: &dyn SecretsProvider, logical_name: &str) -> CredentialBundle {
    match provider.get_credentials(logical_name) {
        Ok(bundle) => bundle,
        Err(err) => {
            tracing::warn!(
                logical_name,
                error = %err,
                "credential resolution failed, using test credentials"
            );
            test_credentials(logical_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_redacts_debug_and_display() {
        let secret = SecureString::new("hunter2".to_string());
        assert_eq!(format!("{:?}", secret), "SecureString([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_secure_string_constant_time_eq() {
        let a = SecureString::from("same");
        let b = SecureString::from("same");
        let c = SecureString::from("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bundle_require() {
        let bundle = CredentialBundle::new().with_value("client_id", "abc");
        assert_eq!(bundle.require("client_id").unwrap().expose_secret(), "abc");
        assert!(matches!(
            bundle.require("missing"),
            Err(SecretsError::NotFound(_))
        ));
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticSecretsProvider::new().with_bundle(
            "endpoint/api-credentials",
            CredentialBundle::new().with_value("client_id", "real-id"),
        );
        let bundle = provider.get_credentials("endpoint/api-credentials").unwrap();
        assert_eq!(bundle.require("client_id").unwrap().expose_secret(), "real-id");
        assert!(provider.get_credentials("unknown/name").is_err());
    }

    #[test]
    fn test_resolve_or_test_falls_back() {
        let provider = StaticSecretsProvider::new();
        let bundle = resolve_or_test(&provider, "identity/api-credentials");
        assert_eq!(
            bundle.require("tenant_id").unwrap().expose_secret(),
            "test-tenant-id"
        );
    }

    #[test]
    fn test_env_provider_prefix_mangling() {
        let provider = EnvSecretsProvider::new();
        assert_eq!(
            provider.var_prefix("endpoint/api-credentials"),
            "SF_ENDPOINT_API_CREDENTIALS_"
        );
    }
}
