//! Profile management command implementations

use std::time::Duration;

use infractl_core::config::{Config, CredentialStore, Profile, WaitSettings};
use infractl_core::WaitConfig;
use serde_json::json;
use tracing::{debug, info};

use crate::cli::{OutputFormat, ProfileCommands};
use crate::connection::ConnectionManager;
use crate::error::{CliError, Result as CliResult};
use crate::output::print_output;

/// Handle profile management commands
pub async fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    conn_mgr: &mut ConnectionManager,
    explicit_profile: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()> {
    use ProfileCommands::*;

    match profile_cmd {
        List => handle_list(conn_mgr, output_format),
        Path => handle_path(conn_mgr, output_format),
        Show { name } => handle_show(
            conn_mgr,
            name.as_deref().or(explicit_profile),
            output_format,
        ),
        Set {
            name,
            endpoint,
            token,
            region,
            region_param,
            wait_timeout,
            #[cfg(feature = "secure-storage")]
            use_keyring,
        } => {
            #[cfg(not(feature = "secure-storage"))]
            let use_keyring = &false;

            let mut profile = Profile::new(endpoint, store_token(name, token, *use_keyring)?);
            profile.region = region.clone();
            profile.region_param = region_param.clone();
            profile.wait = wait_timeout.map(|secs| {
                WaitSettings::from(WaitConfig {
                    timeout: Duration::from_secs(secs),
                    ..WaitConfig::default()
                })
            });
            handle_set(conn_mgr, name, profile)
        }
        Remove { name } => handle_remove(conn_mgr, name),
        Default { name } => handle_default(conn_mgr, name),
    }
}

fn handle_list(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    debug!("Listing all configured profiles");
    let profiles = conn_mgr.config.list_profiles();
    let default = conn_mgr.config.resolve_profile_name(None).ok();

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let profile_list: Vec<_> = profiles
                .iter()
                .map(|(name, profile)| {
                    json!({
                        "name": name,
                        "endpoint": profile.endpoint,
                        "region": profile.region,
                        "default": default.as_deref() == Some(name.as_str()),
                    })
                })
                .collect();
            print_output(json!({ "profiles": profile_list }), output_format)?;
        }
        OutputFormat::Auto => {
            if profiles.is_empty() {
                println!("No profiles configured.");
                println!("Use 'infractl profile set' to create a profile.");
                return Ok(());
            }
            for (name, profile) in profiles {
                let marker = if default.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<16} {} {}",
                    marker,
                    name,
                    profile.endpoint,
                    profile.region.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

fn handle_path(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let path = match &conn_mgr.config_path {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    match output_format {
        OutputFormat::Auto => println!("{}", path.display()),
        format => print_output(json!({ "path": path.display().to_string() }), format)?,
    }
    Ok(())
}

fn handle_show(
    conn_mgr: &ConnectionManager,
    name: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()> {
    let (name, profile) = conn_mgr.config.resolve_profile(name)?;
    debug!("Showing profile: {}", name);
    let wait = profile.wait_config();

    let details = json!({
        "name": name,
        "endpoint": profile.endpoint,
        "token": mask_token(&profile.token),
        "region": profile.region,
        "region_param": profile.region_param,
        "wait": {
            "timeout_secs": wait.timeout.as_secs(),
            "delay_secs": wait.delay.as_secs(),
            "min_interval_secs": wait.min_interval.as_secs(),
            "not_found_budget": wait.not_found_budget,
        },
    });

    match output_format {
        OutputFormat::Auto => {
            println!("Profile: {}", name);
            println!("Endpoint: {}", profile.endpoint);
            println!("Token: {}", mask_token(&profile.token));
            if let Some(region) = &profile.region {
                println!("Region: {}", region);
            }
            if let Some(param) = &profile.region_param {
                println!("Region parameter: {}", param);
            }
            println!("Wait timeout: {}s", wait.timeout.as_secs());
        }
        format => print_output(details, format)?,
    }
    Ok(())
}

fn handle_set(conn_mgr: &mut ConnectionManager, name: &str, profile: Profile) -> CliResult<()> {
    debug!("Setting profile: {}", name);
    if profile.endpoint.trim().is_empty() {
        return Err(CliError::InvalidInput {
            message: "--endpoint must not be empty".to_string(),
        });
    }

    let is_first = conn_mgr.config.profiles.is_empty();
    conn_mgr.config.set_profile(name.to_string(), profile);
    if is_first {
        conn_mgr.config.default_profile = Some(name.to_string());
    }
    conn_mgr.save_config()?;

    info!("Profile '{}' saved", name);
    println!("Profile '{}' saved.", name);
    if is_first {
        println!("Set as the default profile.");
    }
    Ok(())
}

fn handle_remove(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Removing profile: {}", name);
    let Some(profile) = conn_mgr.config.remove_profile(name) else {
        return Err(CliError::ProfileNotFound { name: name.into() });
    };

    if let Some(key) = CredentialStore::keyring_key(&profile.token) {
        CredentialStore::new().delete_credential(key)?;
    }
    conn_mgr.save_config()?;

    println!("Profile '{}' removed.", name);
    Ok(())
}

fn handle_default(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Setting default profile: {}", name);
    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(CliError::ProfileNotFound { name: name.into() });
    }

    conn_mgr.config.default_profile = Some(name.to_string());
    conn_mgr.save_config()?;

    println!("Default profile set to '{}'.", name);
    Ok(())
}

/// Value to write into the config for a token, storing it in the keyring when asked
fn store_token(name: &str, token: &str, use_keyring: bool) -> CliResult<String> {
    if !use_keyring {
        return Ok(token.to_string());
    }
    let store = CredentialStore::new();
    let stored = store.store_credential(&format!("{}-token", name), token)?;
    info!("Token for '{}' stored in {}", name, store.storage_backend());
    Ok(stored)
}

/// Mask all but the last four characters of a token
fn mask_token(token: &str) -> String {
    if CredentialStore::is_keyring_reference(token) || token.starts_with("${") {
        return token.to_string();
    }
    let count = token.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let visible: String = token.chars().skip(count - 4).collect();
    format!("****{}", visible)
}
