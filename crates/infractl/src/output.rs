use anyhow::Result;
use serde::Serialize;

use crate::cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl From<cli::OutputFormat> for OutputFormat {
    fn from(format: cli::OutputFormat) -> Self {
        match format {
            cli::OutputFormat::Auto | cli::OutputFormat::Json => OutputFormat::Json,
            cli::OutputFormat::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Render `data` to a string in the given format
pub fn render<T: Serialize>(data: T, format: OutputFormat) -> Result<String> {
    let value = serde_json::to_value(data)?;
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value)?,
        OutputFormat::Yaml => serde_yaml::to_string(&value)?,
    };
    Ok(rendered)
}

pub fn print_output<T: Serialize>(data: T, format: impl Into<OutputFormat>) -> Result<()> {
    println!("{}", render(data, format.into())?.trim_end());
    Ok(())
}
