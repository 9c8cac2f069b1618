//! Configuration and profile management for infractl
//!
//! A profile names one control plane: its base endpoint, bearer credential,
//! and region/tenant qualifier, plus optional per-profile wait settings that
//! override the convergence defaults.
//!
//! # Features
//!
//! - Multiple named profiles with a default
//! - Secure credential storage using OS keyring (optional)
//! - Environment variable expansion in config files
//! - Platform-specific config file locations

#![allow(clippy::module_inception)]

pub mod config;
pub mod credential;
pub mod error;
pub mod wait;

// Re-export main types for convenience
pub use config::{Config, ENDPOINT_ENV, Profile, REGION_ENV, ResolvedProfile, TOKEN_ENV};
pub use credential::{CredentialStorage, CredentialStore};
pub use error::{ConfigError, Result};
pub use wait::WaitSettings;
