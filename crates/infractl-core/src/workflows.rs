//! Lifecycle workflows - submit a mutation, then wait for convergence
//!
//! Every create, update and delete follows the same pattern:
//! 1. Submit the mutation through the [`Transport`]
//! 2. Re-read the object by id on a fixed cadence ([`poll`])
//! 3. Return the converged snapshot, or a failure naming the operation and id
//!
//! Object-specific code only supplies a [`Resource`] type (how to read the
//! id and status out of the JSON) and an [`Endpoint`] (where the collection
//! lives).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{CoreError, ErrorKind, Operation, Result, classify};
use crate::progress::{
    Absence, Observation, PollSpec, ProgressCallback, StateSet, WaitConfig, poll,
};
use crate::transport::{Request, Transport};

/// An object managed through the control plane
pub trait Resource: DeserializeOwned + Send {
    /// Human-readable kind used in error messages, e.g. `"floating ip"`
    const KIND: &'static str;

    /// Identifier assigned by the control plane
    fn id(&self) -> &str;

    /// Current status label
    fn status(&self) -> &str;
}

/// Location of one object collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    collection: String,
}

impl Endpoint {
    /// Collection path relative to the transport endpoint, e.g. `/floating-ips`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Path of one object in the collection
    pub fn item(&self, id: &str) -> String {
        format!("{}/{}", self.collection.trim_end_matches('/'), id)
    }
}

/// Per-call overrides for a workflow
#[derive(Default)]
pub struct WaitOptions {
    /// Cadence and limits; the orchestrator default when unset
    pub config: Option<WaitConfig>,
    /// State vocabulary; the operation default when unset
    pub states: Option<StateSet>,
    /// Token that aborts the wait
    pub cancel: Option<CancellationToken>,
    /// Optional callback for progress updates
    pub on_progress: Option<ProgressCallback>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: WaitConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn states(mut self, states: StateSet) -> Self {
        self.states = Some(states);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Collection responses are either a bare array or wrapped in `items`
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Listing<R> {
    Bare(Vec<R>),
    Wrapped { items: Vec<R> },
}

impl<R> Listing<R> {
    fn into_items(self) -> Vec<R> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

/// Drives object lifecycles against one control plane
#[derive(Debug, Clone)]
pub struct Orchestrator {
    transport: Arc<Transport>,
    defaults: WaitConfig,
}

impl Orchestrator {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            defaults: WaitConfig::default(),
        }
    }

    /// Replace the default wait settings used when a call sets none
    pub fn with_defaults(mut self, defaults: WaitConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Read one object by id
    pub async fn read<R: Resource>(&self, endpoint: &Endpoint, id: &str) -> Result<R> {
        self.fetch(&endpoint.item(id))
            .await
            .map_err(|e| CoreError::operation(Operation::Read, R::KIND, Some(id), e))
    }

    /// Create an object and wait until it reaches a target state
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let fip: FloatingIp = orchestrator
    ///     .create(&Endpoint::new("/floating-ips"), &json!({"name": "fip-1"}), WaitOptions::new())
    ///     .await?;
    /// assert_eq!(fip.status, "ACTIVE");
    /// ```
    pub async fn create<R, B>(&self, endpoint: &Endpoint, body: &B, opts: WaitOptions) -> Result<R>
    where
        R: Resource,
        B: Serialize + ?Sized,
    {
        let submit = |e| CoreError::operation(Operation::Create, R::KIND, None, e);

        let body = to_body(body).map_err(submit)?;
        let (submitted, _) = self
            .transport
            .execute_json::<R>(&Request::post(endpoint.collection(), body))
            .await
            .map_err(submit)?;

        let id = submitted.id().to_string();
        info!(kind = R::KIND, %id, status = submitted.status(), "create submitted");

        let states = opts.states.clone().unwrap_or_else(StateSet::create);
        self.converge(Operation::Create, endpoint, &id, states, Absence::Pending, opts)
            .await?
            .ok_or_else(|| missing_snapshot::<R>(Operation::Create, &id))
    }

    /// Update an object and wait until it reaches a target state
    pub async fn update<R, B>(
        &self,
        endpoint: &Endpoint,
        id: &str,
        body: &B,
        opts: WaitOptions,
    ) -> Result<R>
    where
        R: Resource,
        B: Serialize + ?Sized,
    {
        let submit = |e| CoreError::operation(Operation::Update, R::KIND, Some(id), e);

        let body = to_body(body).map_err(submit)?;
        self.transport
            .execute(&Request::put(endpoint.item(id), body))
            .await
            .map_err(submit)?;
        info!(kind = R::KIND, %id, "update submitted");

        let states = opts.states.clone().unwrap_or_else(StateSet::update);
        self.converge(Operation::Update, endpoint, id, states, Absence::Pending, opts)
            .await?
            .ok_or_else(|| missing_snapshot::<R>(Operation::Update, id))
    }

    /// Delete an object and wait until it is gone
    ///
    /// An object that is already absent when the delete is submitted counts
    /// as deleted.
    pub async fn delete<R: Resource>(
        &self,
        endpoint: &Endpoint,
        id: &str,
        opts: WaitOptions,
    ) -> Result<()> {
        match self.transport.execute(&Request::delete(endpoint.item(id))).await {
            Ok(_) => info!(kind = R::KIND, %id, "delete submitted"),
            Err(e) if e.is_not_found() => {
                info!(kind = R::KIND, %id, "already deleted");
                return Ok(());
            }
            Err(e) => return Err(CoreError::operation(Operation::Delete, R::KIND, Some(id), e)),
        }

        let states = opts.states.clone().unwrap_or_else(StateSet::delete);
        self.converge::<R>(Operation::Delete, endpoint, id, states, Absence::Target, opts)
            .await?;
        Ok(())
    }

    /// Find exactly one object in a collection matching `predicate`.
    ///
    /// Used before an id is known, e.g. resolving an object by name. No match
    /// is a `ZeroMatches` failure and more than one is `MultipleMatches`.
    pub async fn find_one<R, P>(&self, endpoint: &Endpoint, predicate: P) -> Result<R>
    where
        R: Resource,
        P: Fn(&R) -> bool,
    {
        let lookup = |e| CoreError::operation(Operation::Lookup, R::KIND, None, e);

        let (listing, _) = self
            .transport
            .execute_json::<Listing<R>>(&Request::get(endpoint.collection()))
            .await
            .map_err(lookup)?;

        let mut matches: Vec<R> = listing
            .into_items()
            .into_iter()
            .filter(|item| predicate(item))
            .collect();
        debug!(kind = R::KIND, matches = matches.len(), "lookup");

        match matches.len() {
            0 => Err(lookup(CoreError::fatal(
                ErrorKind::ZeroMatches,
                format!("no {} matched the filter", R::KIND),
            ))),
            1 => Ok(matches.remove(0)),
            n => {
                let ids: Vec<&str> = matches.iter().map(|r| r.id()).collect();
                Err(lookup(CoreError::fatal(
                    ErrorKind::MultipleMatches,
                    format!("{} {} objects matched the filter: {}", n, R::KIND, ids.join(", ")),
                )))
            }
        }
    }

    async fn fetch<R: Resource>(&self, path: &str) -> Result<R> {
        let (resource, _) = self.transport.execute_json(&Request::get(path)).await?;
        Ok(resource)
    }

    /// One refresh: a 404 means "not found", any other failure is fatal
    async fn observe<R: Resource>(&self, path: &str) -> Result<Observation<R>> {
        match self.fetch::<R>(path).await {
            Ok(resource) => {
                let state = resource.status().to_string();
                Ok(Observation::found(resource, state))
            }
            Err(e) if e.is_not_found() => Ok(Observation::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn converge<R: Resource>(
        &self,
        operation: Operation,
        endpoint: &Endpoint,
        id: &str,
        states: StateSet,
        absence: Absence,
        opts: WaitOptions,
    ) -> Result<Option<R>> {
        let path = endpoint.item(id);
        let config = opts.config.unwrap_or_else(|| self.defaults.clone());

        let mut spec = PollSpec::new(format!("{} {}", R::KIND, id), || self.observe::<R>(&path))
            .wait_config(config)
            .states(states)
            .absence(absence);
        if let Some(token) = opts.cancel {
            spec = spec.cancel_token(token);
        }
        if let Some(callback) = opts.on_progress {
            spec = spec.on_progress(callback);
        }

        poll(spec).await.map_err(|failure| {
            if let Some(last) = &failure.last_snapshot {
                debug!(kind = R::KIND, %id, last_state = last.status(), "last observed state");
            }
            CoreError::operation(operation, R::KIND, Some(id), failure.into_error())
        })
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| classify(CoreError::context("failed to encode request body", e)))
}

fn missing_snapshot<R: Resource>(operation: Operation, id: &str) -> CoreError {
    CoreError::operation(
        operation,
        R::KIND,
        Some(id),
        CoreError::fatal(ErrorKind::Unknown, "converged without a snapshot"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_item_path() {
        let endpoint = Endpoint::new("/floating-ips/");
        assert_eq!(endpoint.item("fip-1"), "/floating-ips/fip-1");
        assert_eq!(endpoint.collection(), "/floating-ips/");
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let bare: Listing<Value> = serde_json::from_str(r#"[{"id": "a"}]"#).unwrap();
        assert_eq!(bare.into_items().len(), 1);

        let wrapped: Listing<Value> =
            serde_json::from_str(r#"{"items": [{"id": "a"}, {"id": "b"}]}"#).unwrap();
        assert_eq!(wrapped.into_items().len(), 2);
    }
}
