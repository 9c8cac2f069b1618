//! Unified error handling for infractl-core
//!
//! Every failure the core surfaces is a [`CoreError`]. Transport and JSON
//! failures are folded into a small closed set of sentinel kinds
//! ([`ErrorKind`]) by [`classify`], and a sentinel keeps its identity no matter
//! how many times it is wrapped afterwards.
//!
//! # Example
//!
//! ```rust
//! use infractl_core::{CoreError, ErrorKind};
//!
//! let inner = CoreError::fatal(ErrorKind::Timeout, "gateway did not answer");
//! let outer = CoreError::wrap(ErrorKind::Unknown, inner);
//!
//! assert!(outer.is_kind(ErrorKind::Unknown));
//! assert!(outer.is_kind(ErrorKind::Timeout));
//! assert_eq!(outer.to_string(), "unknown error: timeout: gateway did not answer");
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error used as the cause of wrapped failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Closed set of sentinel failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network-level timeout, potentially transient
    Timeout,
    /// Unclassified transport or decoding failure
    Unknown,
    /// A lookup by filter matched nothing
    ZeroMatches,
    /// A lookup by filter matched more than one object
    MultipleMatches,
}

impl ErrorKind {
    /// The message prefix rendered for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown error",
            ErrorKind::ZeroMatches => "zero matches",
            ErrorKind::MultipleMatches => "multiple matches",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle verb an orchestrated call was performing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Lookup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Lookup => write!(f, "look up"),
        }
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// The call completed but the control plane rejected it
    #[error("HTTP {code} {status}: {body}")]
    Http {
        code: u16,
        status: String,
        body: String,
    },

    /// A classified failure, optionally wrapping its cause
    #[error("{kind}: {source}")]
    Sentinel {
        kind: ErrorKind,
        #[source]
        source: BoxError,
    },

    /// A descriptive message in front of an inner cause
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Plain message, used as the innermost cause of fatal sentinels
    #[error("{0}")]
    Message(String),

    /// The poller deadline elapsed before a target state was observed
    #[error(
        "timed out after {timeout:?} waiting for a target state (last state: {})",
        .last_state.as_deref().unwrap_or("none")
    )]
    PollTimeout {
        timeout: Duration,
        last_state: Option<String>,
    },

    /// The caller cancelled polling
    #[error("polling was cancelled")]
    PollCancelled,

    /// The object stayed absent for the whole not-found budget
    #[error("object not found after {attempts} consecutive checks")]
    NotFoundExceeded { attempts: u32 },

    /// The object settled in a state the caller declared as failed
    #[error("object reached failure state '{state}'")]
    ResourceFailed { state: String },

    /// Orchestrator context naming the operation and object
    #[error(
        "failed to {operation} {resource}{}: {source}",
        .id.as_deref().map(|id| format!(" {id}")).unwrap_or_default()
    )]
    Operation {
        operation: Operation,
        resource: &'static str,
        id: Option<String>,
        #[source]
        source: Box<CoreError>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Wrap `inner` as a sentinel of `kind`.
    ///
    /// The result displays as `"<kind>: <inner>"` and kind-matches `kind`
    /// as well as any kind already present in `inner`'s chain.
    pub fn wrap<E>(kind: ErrorKind, inner: E) -> Self
    where
        E: Into<BoxError>,
    {
        CoreError::Sentinel {
            kind,
            source: inner.into(),
        }
    }

    /// Sentinel of `kind` built from an immediate message
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::wrap(kind, CoreError::Message(message.into()))
    }

    /// Prefix `inner` with a descriptive message without changing its kind
    pub fn context<E>(context: impl Into<String>, inner: E) -> Self
    where
        E: Into<BoxError>,
    {
        CoreError::Context {
            context: context.into(),
            source: inner.into(),
        }
    }

    /// Attach operation and object identity to a failure
    pub fn operation(
        operation: Operation,
        resource: &'static str,
        id: Option<&str>,
        source: CoreError,
    ) -> Self {
        CoreError::Operation {
            operation,
            resource,
            id: id.map(str::to_string),
            source: Box::new(source),
        }
    }

    /// The next `CoreError` in the causal chain, if the cause is one
    fn inner(&self) -> Option<&CoreError> {
        match self {
            CoreError::Sentinel { source, .. } | CoreError::Context { source, .. } => {
                source.downcast_ref::<CoreError>()
            }
            CoreError::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// This error followed by every `CoreError` it wraps
    pub fn chain(&self) -> impl Iterator<Item = &CoreError> {
        std::iter::successors(Some(self), |e| e.inner())
    }

    /// Returns true if any sentinel in the chain is of `kind`
    #[must_use]
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.chain()
            .any(|e| matches!(e, CoreError::Sentinel { kind: k, .. } if *k == kind))
    }

    /// The single sentinel kind this failure maps to.
    ///
    /// The outermost sentinel wins; unwrapped HTTP rejections and poller
    /// failures map to `Unknown`, except a poll deadline which is `Timeout`.
    pub fn kind(&self) -> ErrorKind {
        for e in self.chain() {
            match e {
                CoreError::Sentinel { kind, .. } => return *kind,
                CoreError::PollTimeout { .. } => return ErrorKind::Timeout,
                _ => {}
            }
        }
        ErrorKind::Unknown
    }

    /// HTTP status code of the rejection in the chain, if any
    pub fn http_status(&self) -> Option<u16> {
        self.chain().find_map(|e| match e {
            CoreError::Http { code, .. } => Some(*code),
            _ => None,
        })
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.http_status(), Some(401 | 403))
    }

    /// Returns true if this is a conflict/precondition error (409/412)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.http_status(), Some(409 | 412))
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.http_status(), Some(500..=599))
    }

    /// Returns true for network timeouts and poll deadlines
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.is_kind(ErrorKind::Timeout)
            || self
                .chain()
                .any(|e| matches!(e, CoreError::PollTimeout { .. }))
    }

    /// Returns true if polling was cancelled by the caller
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.chain().any(|e| matches!(e, CoreError::PollCancelled))
    }
}

/// Classify an arbitrary failure into a sentinel.
///
/// A network timeout anywhere in the chain becomes `Timeout`; anything else
/// becomes `Unknown` wrapping the original error verbatim. Values that are
/// already sentinels are returned unchanged.
pub fn classify<E>(err: E) -> CoreError
where
    E: Into<BoxError>,
{
    let err: BoxError = match err.into().downcast::<CoreError>() {
        Ok(core) => match *core {
            sentinel @ CoreError::Sentinel { .. } => return sentinel,
            other => Box::new(other),
        },
        Err(err) => err,
    };

    if is_network_timeout(&*err) {
        CoreError::wrap(
            ErrorKind::Timeout,
            CoreError::context("request to control plane timed out", err),
        )
    } else {
        CoreError::wrap(ErrorKind::Unknown, err)
    }
}

fn is_network_timeout(err: &(dyn StdError + 'static)) -> bool {
    std::iter::successors(Some(err), |e| (*e).source()).any(|e| {
        if let Some(req) = e.downcast_ref::<reqwest::Error>() {
            return req.is_timeout();
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return io.kind() == std::io::ErrorKind::TimedOut;
        }
        false
    })
}
