//! Topology-driven affinity resolution
//!
//! Descriptors are a pure function of the current view, the configured policy
//! and the route registry. They are memoized per key and the memo is dropped
//! whenever a new view arrives. The memo holds at most
//! [`DEFAULT_MEMO_CAPACITY`] keys (see
//! [`TopologyAffinityResolver::with_memo_capacity`]); reaching the bound
//! clears it.
//!
//! Cookies supplied by a front-end override where a request is *routed*, never
//! where data *lives*: [`AffinityResolver::owners`] always answers from the
//! topology.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use beanstore_cache::{GridListener, Topology};
use beanstore_core::{AffinityConfig, AffinityPolicy, MemberId};

use crate::cookie::{encode_routes, parse_routes};
use crate::descriptor::AffinityDescriptor;
use crate::route::RouteRegistry;

/// Keys memoized per view unless configured otherwise
pub const DEFAULT_MEMO_CAPACITY: usize = 4096;

/// Computes routing descriptors for keys.
pub trait AffinityResolver: Send + Sync {
    /// Descriptor for `key` under the current view
    fn resolve(&self, key: &[u8]) -> AffinityDescriptor;

    /// Data owners for `key` (primary first), independent of any cookie
    fn owners(&self, key: &[u8]) -> Vec<MemberId>;

    /// Install a new view; descriptors computed before are discarded
    fn on_topology_change(&self, topology: &Topology);

    /// View the current descriptors were computed from
    fn view_id(&self) -> u64;
}

/// [`AffinityResolver`] over a [`Topology`] view.
#[derive(Debug)]
pub struct TopologyAffinityResolver {
    topology: RwLock<Topology>,
    config: AffinityConfig,
    routes: Arc<RouteRegistry>,
    resolved: DashMap<Vec<u8>, AffinityDescriptor>,
    memo_capacity: usize,
}

impl TopologyAffinityResolver {
    /// Create a resolver starting from `topology`
    pub fn new(topology: Topology, config: AffinityConfig, routes: Arc<RouteRegistry>) -> Self {
        routes.on_view_change(&topology);
        TopologyAffinityResolver {
            topology: RwLock::new(topology),
            config,
            routes,
            resolved: DashMap::new(),
            memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }

    /// Bound the number of memoized descriptors; 0 disables the memo
    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    /// Descriptors currently memoized
    pub fn memoized(&self) -> usize {
        self.resolved.len()
    }

    /// Active policy
    pub fn policy(&self) -> AffinityPolicy {
        self.config.policy
    }

    /// Route registry used for cookie values
    pub fn routes(&self) -> &Arc<RouteRegistry> {
        &self.routes
    }

    /// Routing descriptor honoring a front-end supplied cookie.
    ///
    /// A well-formed cookie naming at least one known member is returned as
    /// is; otherwise the topology-derived descriptor is used.
    pub fn resolve_with_cookie(&self, key: &[u8], cookie: Option<&str>) -> AffinityDescriptor {
        if let Some(value) = cookie {
            match parse_routes(value) {
                Ok(routes) if routes.iter().any(|r| self.routes.member_for_route(r).is_some()) => {
                    return AffinityDescriptor::Cookie {
                        name: self.config.cookie_name.clone(),
                        value: value.trim().trim_matches('"').to_string(),
                    };
                }
                Ok(_) => {
                    debug!(target: "beanstore::affinity", cookie = value, "Cookie names no known member");
                }
                Err(e) => {
                    warn!(target: "beanstore::affinity", error = %e, "Ignoring malformed affinity cookie");
                }
            }
        }
        self.resolve(key)
    }

    fn compute(&self, topology: &Topology, key: &[u8]) -> AffinityDescriptor {
        let mut ranking = topology.ranking(key);
        if ranking.is_empty() {
            // Empty view: the local member is the only one we can reach.
            ranking.push(self.routes.local_member().clone());
        }
        match self.config.policy {
            AffinityPolicy::Single => AffinityDescriptor::SingleOwner(ranking.swap_remove(0)),
            AffinityPolicy::Ranked => {
                ranking.truncate(self.config.max_members.max(1));
                AffinityDescriptor::ranked(ranking)
            }
            AffinityPolicy::Cookie => {
                ranking.truncate(self.config.max_members.max(1));
                let routes: Vec<String> = ranking.iter().map(|m| self.routes.route(m)).collect();
                match encode_routes(&routes) {
                    Ok(value) => AffinityDescriptor::Cookie {
                        name: self.config.cookie_name.clone(),
                        value,
                    },
                    Err(e) => {
                        // Member names that are not valid tokens cannot go
                        // into a cookie; route by rank instead.
                        warn!(target: "beanstore::affinity", error = %e, "Falling back to ranked affinity");
                        AffinityDescriptor::ranked(ranking)
                    }
                }
            }
        }
    }
}

impl AffinityResolver for TopologyAffinityResolver {
    fn resolve(&self, key: &[u8]) -> AffinityDescriptor {
        // Held until the memo is written so a concurrent view change cannot
        // be overtaken by an answer computed from the old view.
        let topology = self.topology.read();
        if let Some(hit) = self.resolved.get(key) {
            return hit.value().clone();
        }
        let descriptor = self.compute(&topology, key);
        trace!(target: "beanstore::affinity", descriptor = %descriptor, "Resolved affinity");
        if self.memo_capacity == 0 {
            return descriptor;
        }
        if self.resolved.len() >= self.memo_capacity {
            debug!(target: "beanstore::affinity", capacity = self.memo_capacity, "Affinity memo full, clearing");
            self.resolved.clear();
        }
        self.resolved.insert(key.to_vec(), descriptor.clone());
        descriptor
    }

    fn owners(&self, key: &[u8]) -> Vec<MemberId> {
        self.topology.read().owners(key)
    }

    fn on_topology_change(&self, topology: &Topology) {
        let mut current = self.topology.write();
        if topology.view_id() < current.view_id() {
            debug!(
                target: "beanstore::affinity",
                stale = topology.view_id(),
                current = current.view_id(),
                "Ignoring stale view"
            );
            return;
        }
        *current = topology.clone();
        self.routes.on_view_change(topology);
        // Cleared under the write lock so no reader caches an old-view answer.
        self.resolved.clear();
    }

    fn view_id(&self) -> u64 {
        self.topology.read().view_id()
    }
}

impl GridListener for TopologyAffinityResolver {
    fn on_topology_changed(&self, topology: &Topology) {
        self.on_topology_change(topology);
    }
}
