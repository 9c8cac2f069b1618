//! Authenticated HTTP transport for the control plane
//!
//! The transport builds a request from a [`Request`] descriptor, attaches the
//! bearer credential and JSON negotiation headers, executes it, and hands the
//! raw response back to the caller. Responses with a status of 300 or above
//! become [`CoreError::Http`] carrying the unparsed body; the transport never
//! interprets error bodies.
//!
//! The transport keeps no per-call state, so a single instance can be shared
//! (behind an `Arc`) by any number of concurrently converging objects. The raw
//! body of every call is returned to that call only.

use std::borrow::Cow;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::config::{ConfigError, ResolvedProfile};
use crate::error::{CoreError, Result, classify};

/// User agent string for infractl HTTP requests
const DEFAULT_USER_AGENT: &str = concat!("infractl/", env!("CARGO_PKG_VERSION"));

/// Query parameter carrying the region qualifier unless overridden
pub const DEFAULT_REGION_PARAM: &str = "region";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One remote call: method, path relative to the endpoint, optional JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    body: Option<Value>,
    query: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Read and delete verbs carry the region in the query string; write
    /// verbs carry it in their body or path.
    fn carries_region_query(&self) -> bool {
        self.method == Method::GET || self.method == Method::DELETE
    }
}

/// Raw outcome of a completed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Deserialize the body; decoding failures classify as `Unknown`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            classify(CoreError::context(
                format!("failed to decode response body ({} bytes)", self.body.len()),
                e,
            ))
        })
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Builder for [`Transport`]
#[derive(Debug, Default, Clone)]
pub struct TransportBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    region: Option<String>,
    region_param: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl TransportBuilder {
    /// Base endpoint, e.g. `https://api.example.com/v1`
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Bearer credential
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Region/tenant qualifier
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Query parameter name for the region (default `region`)
    pub fn region_param(mut self, name: impl Into<String>) -> Self {
        self.region_param = Some(name.into());
        self
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Endpoint, credential and region settings of a resolved profile
    pub fn profile(mut self, profile: &ResolvedProfile) -> Self {
        self.endpoint = Some(profile.endpoint.clone());
        self.token = Some(profile.token.clone());
        if let Some(region) = &profile.region {
            self.region = Some(region.clone());
        }
        if let Some(param) = &profile.region_param {
            self.region_param = Some(param.clone());
        }
        self
    }

    pub fn build(self) -> Result<Transport> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ConfigError::InvalidSetting("endpoint is required".to_string()))?;
        let token = self
            .token
            .ok_or_else(|| ConfigError::InvalidSetting("token is required".to_string()))?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint).map_err(|e| {
            ConfigError::InvalidSetting(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| classify(CoreError::context("failed to build HTTP client", e)))?;

        Ok(Transport {
            http,
            endpoint,
            token,
            region: self.region,
            region_param: self
                .region_param
                .unwrap_or_else(|| DEFAULT_REGION_PARAM.to_string()),
        })
    }
}

/// HTTP transport bound to one endpoint and credential
#[derive(Clone)]
pub struct Transport {
    http: Client,
    endpoint: String,
    token: String,
    region: Option<String>,
    region_param: String,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("region_param", &self.region_param)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Transport for a resolved profile
    pub fn from_profile(profile: &ResolvedProfile) -> Result<Self> {
        Self::builder().profile(profile).build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Absolute URL for a request, with the region qualifier where it belongs
    pub fn url_for(&self, request: &Request) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.endpoint,
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| {
            classify(CoreError::context(format!("invalid request path '{}'", request.path), e))
        })?;

        let region = self.region.as_ref().filter(|_| request.carries_region_query());
        if region.is_some() || !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
            if let Some(region) = region {
                pairs.append_pair(&self.region_param, region);
            }
        }

        Ok(url)
    }

    /// Execute a request.
    ///
    /// Transport failures are classified (`Timeout` for network timeouts,
    /// `Unknown` otherwise); a status of 300 or above becomes
    /// [`CoreError::Http`] with the raw body.
    pub async fn execute(&self, request: &Request) -> Result<RawResponse> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, %url, "sending request");
        if let Some(body) = &request.body {
            trace!(%body, "request body");
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .bearer_auth(&self.token)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify)?.to_vec();
        let raw = RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        };

        debug!(
            method = %request.method,
            path = %request.path,
            status = raw.status,
            "received response"
        );
        trace!(body = %raw.text(), "response body");

        if raw.status >= 300 {
            return Err(CoreError::Http {
                code: raw.status,
                status: raw.status_text,
                body: String::from_utf8_lossy(&raw.body).into_owned(),
            });
        }

        Ok(raw)
    }

    /// Execute and decode the body, returning the raw response alongside
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &Request,
    ) -> Result<(T, RawResponse)> {
        let raw = self.execute(request).await?;
        let value = raw.json()?;
        Ok((value, raw))
    }
}
