//! Error types for infractl
//!
//! Structured CLI errors with suggestions, printed as cargo-style diagnostics.

use colored::Colorize;
use infractl_core::{ConfigError, CoreError};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// ```text
/// error: Profile 'staging' not found
///
///   tip: List available profiles: infractl profile list
/// ```
pub struct CliDiagnostic {
    message: String,
    tips: Vec<String>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            tips: Vec::new(),
        }
    }

    pub fn tip(mut self, description: &str) -> Self {
        self.tips.push(description.to_string());
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        for tip in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", tip);
        }
    }
}

/// Main error type for the infractl application
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No profile configured. Use 'infractl profile set' to configure a profile.")]
    NoProfileConfigured,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("API error: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File error for '{path}': {message}")]
    FileError { path: String, message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

/// Result type for infractl operations
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            CliError::ProfileNotFound { name } => vec![
                "List available profiles: infractl profile list".to_string(),
                format!(
                    "Create profile '{}': infractl profile set {} --endpoint <url> --token <token>",
                    name, name
                ),
            ],
            CliError::NoProfileConfigured => vec![
                "Create a profile: infractl profile set <name> --endpoint <url> --token <token>"
                    .to_string(),
                "Or set INFRACTL_ENDPOINT and INFRACTL_TOKEN".to_string(),
            ],
            CliError::AuthenticationFailed { .. } => vec![
                "Check your token: infractl profile show <profile>".to_string(),
                "Ensure the API endpoint URL is correct".to_string(),
            ],
            CliError::ApiError { status: 404, .. } => vec![
                "Verify the object id and path are correct".to_string(),
                "Check that you're using the correct profile and region".to_string(),
            ],
            CliError::RequestFailed { .. } => vec![
                "Check network connectivity".to_string(),
                "Verify the endpoint is correct: infractl profile show <profile>".to_string(),
            ],
            CliError::Timeout { .. } => vec![
                "The change may still be applying; re-run `infractl wait` to keep waiting"
                    .to_string(),
                "Raise the deadline with --timeout <seconds>".to_string(),
            ],
            CliError::InvalidInput { .. } => vec![
                "Check the command syntax: infractl <command> --help".to_string(),
            ],
            CliError::FileError { path, .. } => vec![
                format!("Check that file exists: {}", path),
                "Verify file permissions are correct".to_string(),
            ],
            _ => vec![],
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cancelled { .. } => 130,
            _ => 1,
        }
    }

    /// Print a cargo-style diagnostic to stderr.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&self.to_string());
        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion);
        }
        diag.print();
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound { name },
            ConfigError::NoProfiles { .. } => CliError::NoProfileConfigured,
            other => CliError::Config(other.to_string()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if let CoreError::Config(config) = err {
            return config.into();
        }

        let message = err.to_string();
        if err.is_unauthorized() {
            CliError::AuthenticationFailed { message }
        } else if err.is_cancelled() {
            CliError::Cancelled { message }
        } else if err.is_timeout() {
            CliError::Timeout { message }
        } else if let Some(status) = err.http_status() {
            CliError::ApiError { status, message }
        } else {
            CliError::RequestFailed { message }
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Config(format!("{:#}", err))
    }
}
