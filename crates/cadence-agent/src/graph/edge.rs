use std::sync::Arc;

use super::router::Router;

/// Outgoing edge of a node.
#[derive(Clone)]
pub enum Edge {
    /// Always go to the named node.
    Static(String),
    /// Ask the router.
    Conditional(Arc<dyn Router>),
}

impl Edge {
    /// Every node this edge can lead to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::Static(to) => vec![to.as_str()],
            Self::Conditional(router) => {
                let mut targets = router.targets();
                targets.push(router.fallback());
                targets
            }
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(to) => f.debug_tuple("Static").field(to).finish(),
            Self::Conditional(router) => f
                .debug_struct("Conditional")
                .field("targets", &router.targets())
                .field("fallback", &router.fallback())
                .finish(),
        }
    }
}
