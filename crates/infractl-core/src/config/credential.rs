//! Credential storage with optional keyring support
//!
//! Profile values such as the bearer token may be stored as plaintext, as a
//! `keyring:<name>` reference into the OS keyring (with the
//! `secure-storage` feature), or overridden from the environment.

use super::error::{ConfigError, Result};
use std::env;

/// Prefix that marks a value as a keyring reference
const KEYRING_PREFIX: &str = "keyring:";

/// Service name for keyring entries
#[cfg(feature = "secure-storage")]
const SERVICE_NAME: &str = "infractl";

/// Storage backend for credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStorage {
    /// OS keyring
    #[cfg(feature = "secure-storage")]
    Keyring,
    /// Plaintext in the config file
    Plaintext,
}

/// Resolves and stores credential values
#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: CredentialStorage,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Create a store, preferring the keyring when it is usable
    pub fn new() -> Self {
        #[cfg(feature = "secure-storage")]
        {
            let storage = if Self::is_keyring_available() {
                CredentialStorage::Keyring
            } else {
                CredentialStorage::Plaintext
            };
            Self { storage }
        }
        #[cfg(not(feature = "secure-storage"))]
        {
            Self {
                storage: CredentialStorage::Plaintext,
            }
        }
    }

    /// Store that never touches the keyring
    pub fn plaintext() -> Self {
        Self {
            storage: CredentialStorage::Plaintext,
        }
    }

    #[cfg(feature = "secure-storage")]
    fn is_keyring_available() -> bool {
        match keyring::Entry::new(SERVICE_NAME, "__probe__") {
            Ok(entry) => {
                let _ = entry.get_password();
                true
            }
            Err(_) => false,
        }
    }

    /// Store a credential and return the value to write into the config file.
    ///
    /// With keyring storage this is a `keyring:<key>` reference; otherwise the
    /// value itself.
    pub fn store_credential(&self, key: &str, value: &str) -> Result<String> {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => {
                let entry = keyring::Entry::new(SERVICE_NAME, key)
                    .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
                entry.set_password(value).map_err(|e| {
                    ConfigError::KeyringError(format!("Failed to store '{}' in keyring: {}", key, e))
                })?;
                Ok(format!("{}{}", KEYRING_PREFIX, key))
            }
            CredentialStorage::Plaintext => {
                let _ = key;
                Ok(value.to_string())
            }
        }
    }

    /// Resolve a credential value
    ///
    /// Resolution order:
    /// 1. Environment variable (if `env_var` is given and set)
    /// 2. Keyring lookup for `keyring:` references
    /// 3. The value as-is
    pub fn get_credential(&self, value: &str, env_var: Option<&str>) -> Result<String> {
        if let Some(var) = env_var
            && let Ok(env_value) = env::var(var)
        {
            return Ok(env_value);
        }

        let Some(key) = value.strip_prefix(KEYRING_PREFIX) else {
            return Ok(value.to_string());
        };

        #[cfg(feature = "secure-storage")]
        {
            let entry = keyring::Entry::new(SERVICE_NAME, key)
                .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
            entry.get_password().map_err(|e| {
                ConfigError::KeyringError(format!(
                    "Failed to retrieve credential '{}' from keyring: {}",
                    key, e
                ))
            })
        }
        #[cfg(not(feature = "secure-storage"))]
        {
            Err(ConfigError::CredentialError(format!(
                "'{}' references the keyring but the secure-storage feature is not enabled",
                key
            )))
        }
    }

    /// Remove a stored credential; missing entries are not an error
    pub fn delete_credential(&self, key: &str) -> Result<()> {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => {
                let entry = keyring::Entry::new(SERVICE_NAME, key)
                    .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
                match entry.delete_credential() {
                    Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                    Err(e) => Err(ConfigError::KeyringError(format!(
                        "Failed to delete '{}' from keyring: {}",
                        key, e
                    ))),
                }
            }
            CredentialStorage::Plaintext => {
                let _ = key;
                Ok(())
            }
        }
    }

    /// Check if a value is a keyring reference
    pub fn is_keyring_reference(value: &str) -> bool {
        value.starts_with(KEYRING_PREFIX)
    }

    /// Keyring key named by a reference, if it is one
    pub fn keyring_key(value: &str) -> Option<&str> {
        value.strip_prefix(KEYRING_PREFIX)
    }

    /// Name of the active backend
    pub fn storage_backend(&self) -> &'static str {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => "keyring",
            CredentialStorage::Plaintext => "plaintext",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_value_returned_as_is() {
        let store = CredentialStore::plaintext();
        let result = store.get_credential("tok-123", None).unwrap();
        assert_eq!(result, "tok-123");
        assert_eq!(store.storage_backend(), "plaintext");
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_override() {
        unsafe {
            env::set_var("INFRACTL_TEST_CREDENTIAL", "env-value");
        }

        let store = CredentialStore::plaintext();
        let result = store
            .get_credential("config-value", Some("INFRACTL_TEST_CREDENTIAL"))
            .unwrap();
        assert_eq!(result, "env-value");

        unsafe {
            env::remove_var("INFRACTL_TEST_CREDENTIAL");
        }
    }

    #[test]
    fn test_plaintext_store_returns_value() {
        let store = CredentialStore::plaintext();
        assert_eq!(store.store_credential("prod-token", "secret").unwrap(), "secret");
        assert!(store.delete_credential("prod-token").is_ok());
    }

    #[test]
    fn test_keyring_reference_detection() {
        assert!(CredentialStore::is_keyring_reference("keyring:prod-token"));
        assert!(!CredentialStore::is_keyring_reference("prod-token"));
        assert_eq!(CredentialStore::keyring_key("keyring:prod-token"), Some("prod-token"));
        assert_eq!(CredentialStore::keyring_key("plain"), None);
    }

    #[cfg(not(feature = "secure-storage"))]
    #[test]
    fn test_keyring_reference_without_feature_fails() {
        let store = CredentialStore::plaintext();
        let err = store.get_credential("keyring:prod-token", None).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialError(_)));
    }
}
