//! Member route tokens
//!
//! A route token is the opaque value a member contributes to an affinity
//! cookie. Each member registers its own token; members that never did are
//! routed by their member name.
//!
//! On a view change the registry drops tokens of departed members and puts the
//! local member's token back, since a member that was split away and rejoins
//! may have been dropped by its peers in the meantime.

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use beanstore_cache::{GridListener, Topology};
use beanstore_core::MemberId;

use crate::cookie::is_valid_route;
use crate::error::{AffinityError, Result};

/// Registry of member route tokens.
#[derive(Debug)]
pub struct RouteRegistry {
    local: MemberId,
    local_route: String,
    routes: DashMap<MemberId, String>,
    members: RwLock<Vec<MemberId>>,
}

impl RouteRegistry {
    /// Create a registry holding the local member's token.
    ///
    /// # Errors
    ///
    /// `InvalidRoute` if `local_route` cannot appear in a cookie.
    pub fn new(local: impl Into<MemberId>, local_route: impl Into<String>) -> Result<Self> {
        let local = local.into();
        let local_route = local_route.into();
        if !is_valid_route(&local_route) {
            return Err(AffinityError::InvalidRoute(local_route));
        }
        let routes = DashMap::new();
        routes.insert(local.clone(), local_route.clone());
        Ok(RouteRegistry {
            members: RwLock::new(vec![local.clone()]),
            local,
            local_route,
            routes,
        })
    }

    /// Registry whose local token is the member name
    pub fn for_member(local: impl Into<MemberId>) -> Result<Self> {
        let local = local.into();
        let route = local.as_str().to_string();
        Self::new(local, route)
    }

    /// Local member
    pub fn local_member(&self) -> &MemberId {
        &self.local
    }

    /// Record `member`'s token
    pub fn register(&self, member: MemberId, route: impl Into<String>) -> Result<()> {
        let route = route.into();
        if !is_valid_route(&route) {
            return Err(AffinityError::InvalidRoute(route));
        }
        debug!(target: "beanstore::affinity", member = %member, route = %route, "Registered route");
        self.routes.insert(member, route);
        Ok(())
    }

    /// Token for `member`, falling back to the member name
    pub fn route(&self, member: &MemberId) -> String {
        self.routes
            .get(member)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| member.as_str().to_string())
    }

    /// Member behind a token, if it is registered or names a known member
    pub fn member_for_route(&self, route: &str) -> Option<MemberId> {
        if let Some(entry) = self.routes.iter().find(|e| e.value() == route) {
            return Some(entry.key().clone());
        }
        self.members
            .read()
            .iter()
            .find(|m| m.as_str() == route)
            .cloned()
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no token is registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Reconcile with a new view.
    ///
    /// Removes tokens of members no longer present and restores the local
    /// token when the local member is part of the view.
    pub fn on_view_change(&self, topology: &Topology) {
        let before = self.routes.len();
        self.routes.retain(|member, _| topology.contains(member));
        let removed = before - self.routes.len();
        if topology.contains(&self.local) {
            self.routes
                .entry(self.local.clone())
                .or_insert_with(|| self.local_route.clone());
        }
        *self.members.write() = topology.members().to_vec();
        info!(
            target: "beanstore::affinity",
            view_id = topology.view_id(),
            removed,
            "Route registry updated for new view"
        );
    }
}

impl GridListener for RouteRegistry {
    fn on_topology_changed(&self, topology: &Topology) {
        self.on_view_change(topology);
    }
}
