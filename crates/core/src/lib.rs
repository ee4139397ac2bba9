//! Fan-out core: the shared data model for the resource-change fan-out engine.
//!
//! Nothing in this crate talks to Kubernetes, a registry lock, or a socket —
//! it is the pure vocabulary (`Domain`, scope grammar, `Update`, limits, error
//! taxonomy) the rest of the workspace builds on.

#![forbid(unsafe_code)]

mod domain;
mod error;
mod limits;
mod scope;
mod update;

pub use domain::{Domain, UnknownDomain};
pub use error::{FanoutError, FanoutResult};
pub use limits::{Limits, HEARTBEAT_SECS, MAX_SUBS_PER_SCOPE, OUT_BUFFER, RESUME_BUFFER, SUB_BUFFER, WRITE_TIMEOUT_SECS};
pub use scope::{namespace_scope, node_scope, normalize as normalize_scope, workload_scope, ScopeError, NAMESPACE_ALL};
pub use update::{DropReason, UnknownUpdateType, Update, UpdateType};

pub mod prelude {
    pub use crate::{Domain, DropReason, FanoutError, FanoutResult, Limits, Update, UpdateType};
}
