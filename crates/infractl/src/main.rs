use anyhow::Result;
use clap::Parser;
use infractl_core::Config;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands};
use connection::ConnectionManager;
use error::CliError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    // Load configuration from specified path or default location
    let (config, config_path) = if let Some(config_file) = &cli.config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        let config = Config::load_from_path(&path)?;
        (config, Some(path))
    } else {
        debug!("Loading config from default location");
        (Config::load()?, None)
    };
    let mut conn_mgr = ConnectionManager::with_config_path(config, config_path);

    if let Err(e) = execute_command(&cli, &mut conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(e.exit_code());
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "infractl=warn,infractl_core=warn",
            1 => "infractl=info,infractl_core=info",
            2 => "infractl=debug,infractl_core=debug",
            _ => "infractl=trace,infractl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, conn_mgr: &mut ConnectionManager) -> Result<(), CliError> {
    info!("Command: {}", format_command(&cli.command));

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Version => {
            debug!("Showing version information");
            match cli.output {
                cli::OutputFormat::Json | cli::OutputFormat::Yaml => {
                    let output_data = serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "name": env!("CARGO_PKG_NAME"),
                    });
                    output::print_output(&output_data, cli.output)?;
                }
                cli::OutputFormat::Auto => {
                    println!("infractl {}", env!("CARGO_PKG_VERSION"));
                }
            }
            Ok(())
        }

        Commands::Profile(profile_cmd) => {
            commands::profile::handle_profile_command(
                profile_cmd,
                conn_mgr,
                cli.profile.as_deref(),
                cli.output,
            )
            .await
        }

        Commands::Api { method, path, data } => {
            info!(
                "API call: {:?} {} {}",
                method,
                path,
                if data.is_some() { "with data" } else { "no data" }
            );
            commands::api::handle_api_command(
                conn_mgr,
                cli.profile.as_deref(),
                *method,
                path,
                data.as_deref(),
                cli.output,
            )
            .await
        }

        Commands::Wait(args) => {
            commands::wait::handle_wait_command(conn_mgr, cli.profile.as_deref(), args, cli.output)
                .await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!("Command completed successfully in {:?}", duration),
        Err(e) => error!("Command failed after {:?}: {}", duration, e),
    }

    result
}

/// Short command description for logs, without request bodies or tokens
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Version => "version".to_string(),
        Commands::Api { method, path, .. } => format!("api {:?} {}", method, path),
        Commands::Wait(args) => format!("wait {} --target {}", args.path, args.target.join(",")),
        Commands::Profile(cmd) => match cmd {
            cli::ProfileCommands::List => "profile list".to_string(),
            cli::ProfileCommands::Path => "profile path".to_string(),
            cli::ProfileCommands::Show { .. } => "profile show".to_string(),
            cli::ProfileCommands::Set { name, .. } => format!("profile set {}", name),
            cli::ProfileCommands::Remove { name } => format!("profile remove {}", name),
            cli::ProfileCommands::Default { name } => format!("profile default {}", name),
        },
    }
}
