//! CLI structure and command definitions
//!
//! Three layers of access to the control plane:
//! 1. Raw API calls (`api`)
//! 2. Waiting for an object to converge (`wait`)
//! 3. Local profile management (`profile`)

use clap::{Args, Parser, Subcommand};

/// Infrastructure control plane CLI
#[derive(Parser, Debug)]
#[command(name = "infractl")]
#[command(
    version,
    about = "Infrastructure control plane CLI - submit changes and wait for them to converge"
)]
#[command(long_about = "
Infrastructure control plane CLI - submit changes and wait for them to converge

Mutations are accepted by the control plane immediately and applied in the
background. Use `api` to submit them and `wait` to block until the object
reaches a terminal state.

EXAMPLES:
    # Set up a profile
    infractl profile set prod --endpoint https://api.example.com/v1 --token TOKEN --region eu-1

    # Create a floating IP
    infractl api post /floating-ips --data '{\"name\":\"edge\",\"region\":\"eu-1\"}'

    # Wait for it to become active
    infractl wait /floating-ips/fip-1 --target ACTIVE --pending PENDING,CREATING --failure ERROR

    # Wait for a deleted object to disappear
    infractl wait /floating-ips/fip-1 --target DELETED --absent-ok

For more help on a specific command, run:
    infractl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "INFRACTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "INFRACTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable where available, JSON otherwise
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Raw API access - direct REST endpoint calls
    #[command(after_help = "EXAMPLES:
    # GET an object
    infractl api get /networks/net-1

    # POST with inline JSON
    infractl api post /networks --data '{\"name\":\"edge\"}'

    # POST from a file
    infractl api post /networks --data @network.json

    # DELETE an object
    infractl api delete /networks/net-1
")]
    Api {
        /// HTTP method
        #[arg(value_enum)]
        method: HttpMethod,

        /// API path relative to the profile endpoint (e.g. /networks)
        path: String,

        /// JSON request body, or @file to read it from a file
        #[arg(long)]
        data: Option<String>,
    },

    /// Wait for an object to reach a target state
    #[command(after_help = "EXAMPLES:
    # Wait for a create to finish
    infractl wait /networks/net-1 --target ACTIVE --pending PENDING,CREATING

    # Fail fast on an error state, with a custom deadline
    infractl wait /networks/net-1 --target ACTIVE --failure ERROR --timeout 1800

    # Status nested in the response body
    infractl wait /clusters/c-1 --target RUNNING --status-field state.phase
")]
    Wait(WaitArgs),

    /// Profile management
    #[command(subcommand, visible_alias = "prof")]
    Profile(ProfileCommands),

    /// Show version information
    #[command(visible_alias = "ver")]
    Version,
}

/// HTTP methods accepted by `api`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_method(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Arguments for `wait`
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Object path relative to the profile endpoint
    pub path: String,

    /// States that end the wait successfully (comma separated)
    #[arg(long, value_delimiter = ',', required = true)]
    pub target: Vec<String>,

    /// States that mean the object is still converging (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub pending: Vec<String>,

    /// States that end the wait as a failure (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub failure: Vec<String>,

    /// Treat a missing object (404) as success, e.g. after a delete
    #[arg(long)]
    pub absent_ok: bool,

    /// Maximum time to wait in seconds (profile or built-in default otherwise)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between refreshes
    #[arg(long)]
    pub interval: Option<u64>,

    /// Consecutive 404s tolerated before giving up
    #[arg(long)]
    pub not_found_budget: Option<u32>,

    /// Dotted path of the status field in the response body
    #[arg(long, default_value = "status")]
    pub status_field: String,
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all configured profiles
    #[command(visible_alias = "ls")]
    List,

    /// Show the configuration file path
    Path,

    /// Show details of a profile
    Show {
        /// Profile name (the resolved default when omitted)
        name: Option<String>,
    },

    /// Create or update a profile
    #[command(after_help = "EXAMPLES:
    # Plain profile
    infractl profile set prod --endpoint https://api.example.com/v1 --token TOKEN --region eu-1

    # Tenant passed as ?project_id=... instead of ?region=...
    infractl profile set lab --endpoint https://lab.example.com --token TOKEN --region t-7 --region-param project_id

    # Token from the environment at load time
    infractl profile set ci --endpoint https://api.example.com/v1 --token '${CI_TOKEN}'
")]
    Set {
        /// Profile name
        name: String,

        /// Base API endpoint
        #[arg(long)]
        endpoint: String,

        /// Bearer token
        #[arg(long)]
        token: String,

        /// Region or tenant qualifier
        #[arg(long)]
        region: Option<String>,

        /// Query parameter carrying the region (default: region)
        #[arg(long)]
        region_param: Option<String>,

        /// Default wait timeout in seconds for this profile
        #[arg(long)]
        wait_timeout: Option<u64>,

        /// Store the token in the OS keyring
        #[cfg(feature = "secure-storage")]
        #[arg(long)]
        use_keyring: bool,
    },

    /// Remove a profile
    #[command(visible_alias = "rm")]
    Remove {
        /// Profile name to remove
        name: String,
    },

    /// Set the default profile
    Default {
        /// Profile name to use when --profile is not given
        name: String,
    },
}
