//! # infractl-core
//!
//! Client-side machinery for driving an eventually consistent infrastructure
//! control plane. Mutations are accepted immediately and applied
//! asynchronously, so every lifecycle call submits the change and then
//! re-reads the object until its status converges.
//!
//! ## Layers
//!
//! - [`transport`]: authenticated HTTP calls returning the raw status and body
//! - [`progress`]: the generic convergence poller
//! - [`workflows`]: create/read/update/delete/lookup on top of both
//! - [`error`]: the sentinel failure taxonomy every layer reports through
//! - [`config`]: named profiles (endpoint, credential, region, wait settings)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infractl_core::{Config, Endpoint, Orchestrator, Transport, WaitOptions};
//!
//! let config = Config::load()?;
//! let (_, profile) = config.resolve_profile(None)?;
//! let resolved = profile.resolve()?;
//!
//! let transport = Arc::new(Transport::from_profile(&resolved)?);
//! let orchestrator = Orchestrator::new(transport).with_defaults(resolved.wait);
//!
//! let fip: FloatingIp = orchestrator
//!     .create(&Endpoint::new("/floating-ips"), &body, WaitOptions::new())
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod transport;
pub mod workflows;

pub use config::{Config, ConfigError, Profile, ResolvedProfile};
pub use error::{BoxError, CoreError, ErrorKind, Operation, Result, classify};
pub use progress::{
    Absence, Observation, PollFailure, PollSpec, ProgressCallback, ProgressEvent, StateSet,
    WaitConfig, poll,
};
pub use transport::{RawResponse, Request, Transport, TransportBuilder};
pub use workflows::{Endpoint, Orchestrator, Resource, WaitOptions};
