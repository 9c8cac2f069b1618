//! Raw API access commands for direct REST endpoint calls

use anyhow::Context;
use infractl_core::Request;
use serde_json::Value;
use tracing::debug;

use crate::cli::{HttpMethod, OutputFormat};
use crate::connection::ConnectionManager;
use crate::error::{CliError, Result as CliResult};
use crate::output::print_output;

/// Handle `infractl api <method> <path>`
pub async fn handle_api_command(
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    method: HttpMethod,
    path: &str,
    data: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()> {
    let (transport, _) = conn_mgr.create_transport(profile_name)?;

    let mut request = Request::new(method.as_method(), normalize_path(path));
    if let Some(body) = parse_body(data)? {
        request = request.with_body(body);
    } else if matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch) {
        request = request.with_body(serde_json::json!({}));
    }

    let response = transport.execute(&request).await?;
    debug!(status = response.status, bytes = response.body.len(), "api call completed");

    if response.is_empty() {
        return Ok(());
    }

    // Non-JSON success bodies are printed verbatim
    match response.json::<Value>() {
        Ok(value) => print_output(value, output_format).map_err(|e| CliError::OutputError {
            message: e.to_string(),
        }),
        Err(_) => {
            println!("{}", response.text());
            Ok(())
        }
    }
}

/// Ensure the path starts with /
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Parse `--data`: inline JSON, or `@file` to read it from a file
fn parse_body(data: Option<&str>) -> CliResult<Option<Value>> {
    let Some(data) = data else {
        return Ok(None);
    };

    let body: anyhow::Result<Value> = if let Some(file_path) = data.strip_prefix('@') {
        let content = std::fs::read_to_string(file_path).map_err(|e| CliError::FileError {
            path: file_path.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from file: {}", file_path))
    } else {
        serde_json::from_str(data).context("Failed to parse JSON from data parameter")
    };

    body.map(Some).map_err(|e| CliError::InvalidInput {
        message: format!("{:#}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("networks"), "/networks");
        assert_eq!(normalize_path("/networks/net-1"), "/networks/net-1");
    }

    #[test]
    fn test_parse_inline_and_file_body() {
        assert_eq!(parse_body(None).unwrap(), None);
        assert_eq!(
            parse_body(Some(r#"{"name":"edge"}"#)).unwrap(),
            Some(serde_json::json!({"name": "edge"}))
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cidr":"10.0.0.0/24"}}"#).unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(
            parse_body(Some(&arg)).unwrap(),
            Some(serde_json::json!({"cidr": "10.0.0.0/24"}))
        );
    }

    #[test]
    fn test_parse_body_errors() {
        assert!(matches!(
            parse_body(Some("{not json")),
            Err(CliError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse_body(Some("@/nonexistent/body.json")),
            Err(CliError::FileError { .. })
        ));
    }
}
