//! Connection management: profile resolution and transport construction

use std::path::PathBuf;

use anyhow::Context;
use infractl_core::config::{
    Config, CredentialStore, ENDPOINT_ENV, Profile, REGION_ENV, ResolvedProfile, TOKEN_ENV,
};
use infractl_core::Transport;
use tracing::{debug, info, trace};

use crate::error::Result as CliResult;

/// User agent string for infractl HTTP requests
const INFRACTL_USER_AGENT: &str = concat!("infractl-cli/", env!("CARGO_PKG_VERSION"));

/// Connection manager for creating authenticated transports
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    /// Create a new connection manager with a custom config path
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save the configuration to the appropriate location
    pub fn save_config(&self) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            self.config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            self.config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Resolve the profile to call with, returning its display name.
    ///
    /// When --config-file is given explicitly, environment variables are
    /// ignored so that an isolated config behaves the same everywhere.
    /// Otherwise `INFRACTL_ENDPOINT` and `INFRACTL_TOKEN` together form a
    /// complete profile when no profile is named.
    pub fn resolve_profile(&self, profile_name: Option<&str>) -> CliResult<(String, ResolvedProfile)> {
        let use_env_vars = self.config_path.is_none();
        debug!(
            "Config path: {:?}, use_env_vars: {}",
            self.config_path, use_env_vars
        );
        if !use_env_vars {
            info!("--config-file specified explicitly, ignoring environment variables");
        }

        let store = CredentialStore::new();

        if use_env_vars && profile_name.is_none() {
            let env_endpoint = std::env::var(ENDPOINT_ENV).ok();
            let env_token = std::env::var(TOKEN_ENV).ok();
            if let (Some(endpoint), Some(token)) = (env_endpoint, env_token) {
                info!("Using credentials from environment variables");
                let mut profile = Profile::new(endpoint, token);
                profile.region = std::env::var(REGION_ENV).ok();
                let resolved = profile.resolve_with(&store, false)?;
                return Ok(("environment".to_string(), resolved));
            }
        }

        let (name, profile) = self.config.resolve_profile(profile_name)?;
        info!("Using profile: {}", name);
        let resolved = profile.resolve_with(&store, use_env_vars)?;
        trace!(endpoint = %resolved.endpoint, region = ?resolved.region, "resolved profile");
        Ok((name, resolved))
    }

    /// Build a transport for the resolved profile
    pub fn create_transport(&self, profile_name: Option<&str>) -> CliResult<(Transport, ResolvedProfile)> {
        let (_, resolved) = self.resolve_profile(profile_name)?;

        let transport = Transport::builder()
            .profile(&resolved)
            .user_agent(INFRACTL_USER_AGENT)
            .build()?;
        debug!(?transport, "transport ready");
        Ok((transport, resolved))
    }
}
