//! Configuration management for infractl
//!
//! Handles loading profiles from a TOML file with environment variable
//! expansion, and resolving the effective credential set for a call.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::credential::CredentialStore;
use super::error::{ConfigError, Result};
use super::wait::WaitSettings;
use crate::progress::WaitConfig;

/// Environment variable overriding the profile token
pub const TOKEN_ENV: &str = "INFRACTL_TOKEN";
/// Environment variable overriding the profile endpoint
pub const ENDPOINT_ENV: &str = "INFRACTL_ENDPOINT";
/// Environment variable overriding the profile region
pub const REGION_ENV: &str = "INFRACTL_REGION";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// One control plane account
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    /// Base endpoint, e.g. `https://api.example.com/v1`
    pub endpoint: String,
    /// Bearer token; supports `keyring:` references
    pub token: String,
    /// Region or tenant qualifier sent on read/delete calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Query parameter name carrying the region (defaults to `region`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_param: Option<String>,
    /// Convergence overrides for this profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitSettings>,
}

/// A profile with every credential resolved to its concrete value
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub endpoint: String,
    pub token: String,
    pub region: Option<String>,
    pub region_param: Option<String>,
    pub wait: WaitConfig,
}

impl Profile {
    /// Profile with an endpoint and token and no region
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            region: None,
            region_param: None,
            wait: None,
        }
    }

    /// Set the region qualifier
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Wait settings for this profile, falling back to library defaults
    pub fn wait_config(&self) -> WaitConfig {
        self.wait.as_ref().map(WaitConfig::from).unwrap_or_default()
    }

    /// Resolve credentials (keyring and environment overrides applied)
    pub fn resolve(&self) -> Result<ResolvedProfile> {
        self.resolve_with(&CredentialStore::new(), true)
    }

    /// Resolve credentials with an explicit store.
    ///
    /// `use_env` controls whether `INFRACTL_*` variables override file values.
    pub fn resolve_with(&self, store: &CredentialStore, use_env: bool) -> Result<ResolvedProfile> {
        let env = |var: &'static str| use_env.then_some(var);

        let endpoint = store
            .get_credential(&self.endpoint, env(ENDPOINT_ENV))
            .map_err(|e| {
                ConfigError::CredentialError(format!("Failed to resolve endpoint: {}", e))
            })?;
        let token = store
            .get_credential(&self.token, env(TOKEN_ENV))
            .map_err(|e| ConfigError::CredentialError(format!("Failed to resolve token: {}", e)))?;
        let region = match (&self.region, use_env.then(|| std::env::var(REGION_ENV).ok())) {
            (_, Some(Some(region))) => Some(region),
            (Some(region), _) => Some(store.get_credential(region, None)?),
            (None, _) => None,
        };

        if endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidSetting(
                "profile endpoint is empty".to_string(),
            ));
        }
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidSetting("profile token is empty".to_string()));
        }

        Ok(ResolvedProfile {
            endpoint,
            token,
            region,
            region_param: self.region_param.clone(),
            wait: self.wait_config(),
        })
    }
}

impl Config {
    /// Resolve which profile to use
    ///
    /// Resolution order: explicit name, configured default, then the first
    /// profile in alphabetical order.
    pub fn resolve_profile_name(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            if !self.profiles.contains_key(name) {
                return Err(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        let mut names: Vec<_> = self.profiles.keys().collect();
        names.sort();
        names
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| ConfigError::NoProfiles {
                suggestion: "Use 'infractl profile set' to create a profile.".to_string(),
            })
    }

    /// Resolve a profile by name (or default) and return it
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<(String, &Profile)> {
        let name = self.resolve_profile_name(explicit_profile)?;
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;
        Ok((name, profile))
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        let expanded_content = Self::expand_env_vars(&content);
        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile by name, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On macOS `~/.config/infractl/config.toml` is preferred when it (or its
    /// directory) exists; otherwise the platform standard location is used.
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("infractl")
                    .join("config.toml");

                if linux_style_path.exists()
                    || linux_style_path.parent().is_some_and(|p| p.exists())
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("io", "infractl", "infractl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand `${VAR}` and `${VAR:-default}` references
    ///
    /// Unset variables without a default are left as-is so that profiles
    /// referring to variables for other environments still parse.
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok()).to_string()
    }
}
