//! Deployment-scoped bean descriptor
//!
//! A [`BeanConfiguration`] is built once when a deployment is installed and
//! shared (never owned) by the bean manager and every bean it creates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::time::Time;

/// Identity of the deployment that owns a bean type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId {
    /// Application (top-level archive) name; empty for standalone modules
    pub application: String,
    /// Module name within the application
    pub module: String,
}

impl DeploymentId {
    /// Create a deployment id
    pub fn new(application: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            module: module.into(),
        }
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.application.is_empty() {
            f.write_str(&self.module)
        } else {
            write!(f, "{}/{}", self.application, self.module)
        }
    }
}

/// Immutable descriptor of one bean type inside a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanConfiguration {
    bean_name: String,
    deployment: DeploymentId,
    module_boundary: String,
    idle_timeout: Option<Time>,
}

/// Shared handle to a bean configuration
pub type BeanContext = Arc<BeanConfiguration>;

impl BeanConfiguration {
    /// Create a configuration whose beans never expire
    ///
    /// The module boundary defaults to the deployment's module name.
    pub fn new(bean_name: impl Into<String>, deployment: DeploymentId) -> Self {
        let module_boundary = deployment.module.clone();
        Self {
            bean_name: bean_name.into(),
            deployment,
            module_boundary,
            idle_timeout: None,
        }
    }

    /// Set the idle timeout after which an unused bean expires
    pub fn with_idle_timeout(mut self, timeout: Time) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the class-loading boundary used when unmarshalling bean state
    pub fn with_module_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.module_boundary = boundary.into();
        self
    }

    /// Freeze into a shareable context
    pub fn into_context(self) -> BeanContext {
        Arc::new(self)
    }

    /// Bean name
    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// Owning deployment
    pub fn deployment(&self) -> &DeploymentId {
        &self.deployment
    }

    /// Class-loading boundary name
    pub fn module_boundary(&self) -> &str {
        &self.module_boundary
    }

    /// Idle timeout; `None` means beans never expire
    pub fn idle_timeout(&self) -> Option<Time> {
        self.idle_timeout
    }
}
