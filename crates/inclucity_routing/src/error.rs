use std::sync::Arc;

use thiserror::Error;

use inclucity_ors::client::OrsError;

/// Errors surfaced by the route coordinator. Clonable so a single failed
/// upstream call can be handed to every deduplicated waiter.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("invalid coordinates: latitude and longitude must be finite numbers")]
    InvalidCoordinates,

    #[error("start and end points coincide after road snapping, pick two distinct points")]
    CoincidentPoints,

    #[error("routing service returned no routes")]
    NoRoutes,

    #[error("route returned without geometry")]
    MissingGeometry,

    #[error("{0}")]
    Service(Arc<OrsError>),
}

impl From<OrsError> for RoutingError {
    fn from(error: OrsError) -> Self {
        RoutingError::Service(Arc::new(error))
    }
}

impl RoutingError {
    /// The upstream "no path between these points" class, the only one
    /// the wheelchair -> walking fallback applies to.
    pub fn is_route_not_found(&self) -> bool {
        matches!(self, RoutingError::Service(error) if error.is_route_not_found())
    }
}
