//! Affinity routing
//!
//! Decides which cluster member should serve a request for a bean or group:
//! - AffinityDescriptor: single owner, ranked list, or cookie
//! - AffinityResolver: topology-driven descriptor computation
//! - RouteRegistry: member route tokens, reconciled on view changes
//! - AffinityRouter: in-order failover with backoff

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cookie;
pub mod descriptor;
pub mod error;
pub mod resolver;
pub mod route;
pub mod router;

pub use cookie::{encode_routes, find_cookie, parse_routes, set_cookie_header};
pub use descriptor::AffinityDescriptor;
pub use error::{AffinityError, Result};
pub use resolver::{AffinityResolver, TopologyAffinityResolver, DEFAULT_MEMO_CAPACITY};
pub use route::RouteRegistry;
pub use router::AffinityRouter;
