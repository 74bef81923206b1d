//! Host environment receiving lifecycle notifications

use crate::component::{Component, ComponentManager};

/// The host collaborator told about component lifecycle events.
///
/// Notifications are fire-and-forget: nothing they return is consumed, and
/// they cannot fail a render.
pub trait Environment {
    /// A component finished its open protocol.
    fn did_create(&self, component: &Component, manager: &dyn ComponentManager) {
        let _ = (component, manager);
    }

    /// A component was updated during revalidation.
    fn did_update(&self, component: &Component, manager: &dyn ComponentManager) {
        let _ = (component, manager);
    }
}

/// An environment that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnvironment;

impl Environment for NoopEnvironment {}
