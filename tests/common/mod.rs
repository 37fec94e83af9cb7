//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};

pub use beanstore::{
    AffinityPolicy, Bean, BeanConfiguration, BeanManager, BeanstoreConfig, DeploymentId,
    DistributedBeanManager, Error, InMemoryGrid, MemberId, MemberScopedIdentifierFactory,
    RemoteCacheContainer, RemoteGrid, Time, Timestamp, Topology,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a fmt subscriber honoring `RUST_LOG` (once per test binary).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Fixtures
// ============================================================================

/// Bean state used across suites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: String,
    pub items: Vec<String>,
}

impl Cart {
    pub fn new(owner: &str) -> Self {
        Cart {
            owner: owner.to_string(),
            items: Vec::new(),
        }
    }
}

pub type CartManager = DistributedBeanManager<String, Cart>;

/// Member names `node-0 .. node-{n-1}`
pub fn members(n: usize) -> Vec<MemberId> {
    (0..n).map(|i| MemberId::from(format!("node-{}", i))).collect()
}

/// A grid whose view contains `n` members, with `node-0` as the local client
pub fn cluster(n: usize, num_owners: usize) -> Arc<InMemoryGrid> {
    Arc::new(InMemoryGrid::with_topology(
        "node-0",
        Topology::new(1, members(n), num_owners),
    ))
}

/// Bean context for the `cart` bean of the `shop` deployment
pub fn context(timeout: Option<Time>) -> beanstore::BeanContext {
    let configuration = BeanConfiguration::new("cart", DeploymentId::new("shop", "web"));
    match timeout {
        Some(timeout) => configuration.with_idle_timeout(timeout),
        None => configuration,
    }
    .into_context()
}

/// Started manager on `grid` with the given config
pub fn manager_with(
    grid: &Arc<InMemoryGrid>,
    timeout: Option<Time>,
    config: BeanstoreConfig,
) -> CartManager {
    init_tracing();
    let member = grid.local_member();
    let container = Arc::new(RemoteCacheContainer::new(
        Arc::clone(grid) as Arc<dyn RemoteGrid>
    ));
    let manager = DistributedBeanManager::builder(
        context(timeout),
        container,
        Arc::new(MemberScopedIdentifierFactory::new(member)),
    )
    .config(config)
    .build()
    .expect("manager builds");
    manager.start().expect("manager starts");
    manager
}

/// Started manager with default config and no idle timeout
pub fn manager(grid: &Arc<InMemoryGrid>) -> CartManager {
    manager_with(grid, None, BeanstoreConfig::default())
}

/// Create a bean with a fresh identifier in its own group
pub fn new_cart(manager: &CartManager, owner: &str) -> Arc<Bean<String, Cart>> {
    let id = manager.identifier_factory().create_identifier();
    manager
        .create_bean(id.clone(), id, Cart::new(owner))
        .expect("bean created")
}
