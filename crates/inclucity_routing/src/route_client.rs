use std::time::Duration;

use geo_types::LineString;
use tracing::{debug, warn};

use inclucity_ors::client::OrsClient;
use inclucity_ors::profile::TravelProfile;
use inclucity_ors::types::{RouteResponse, RouteStep, SnapResponse};

use crate::coordinator::{RequestCoordinator, RequestKey};
use crate::error::RoutingError;
use crate::geometry::{self, POLYLINE_PRECISION};
use crate::point::RoutePoint;

/// How far around a point the service searches for a routable road, in
/// meters.
const SNAP_RADIUS_METERS: f64 = 50.0;

/// Snaps that move a point less than this are treated as no-ops; a
/// marker a few centimeters away is visual noise, not a correction.
const SNAP_NOOP_THRESHOLD_METERS: f64 = 0.1;

/// Completed responses are reused for this long.
const CACHE_TTL: Duration = Duration::from_secs(10);

/// Snapping runs on every map interaction, so it gets a longer quiet
/// period to coalesce bursts. Once the user has committed to two points
/// the route request fires almost immediately.
const SNAP_DEBOUNCE: Duration = Duration::from_millis(100);
const ROUTE_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct RouteOptions {
    pub profile: TravelProfile,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            profile: TravelProfile::Wheelchair,
        }
    }
}

/// A computed route plus the profile that actually produced it. The
/// effective profile differs from the requested one when the wheelchair
/// to walking fallback kicked in, and the UI must warn that the shown
/// route may not be fully accessible.
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub response: RouteResponse,
    pub effective_profile: TravelProfile,
    pub geometry: LineString,
}

impl RouteResult {
    fn new(response: RouteResponse, effective_profile: TravelProfile) -> Self {
        let geometry = response
            .routes
            .first()
            .map(|route| geometry::decode_polyline(&route.geometry, POLYLINE_PRECISION))
            .unwrap_or_else(|| LineString::new(Vec::new()));

        Self {
            response,
            effective_profile,
            geometry,
        }
    }

    /// Turn-by-turn instructions of the primary route, in travel order.
    pub fn steps(&self) -> impl Iterator<Item = &RouteStep> {
        self.response
            .routes
            .first()
            .into_iter()
            .flat_map(|route| route.segments.iter())
            .flat_map(|segment| segment.steps.iter())
    }
}

/// Front door for the map UI: snaps picked points onto the road network
/// and computes accessibility-aware routes, deduplicating the underlying
/// service calls.
pub struct RouteClient {
    ors: OrsClient,
    snaps: RequestCoordinator<SnapResponse>,
    routes: RequestCoordinator<RouteResponse>,
}

impl RouteClient {
    pub fn new(ors: OrsClient) -> Self {
        Self {
            ors,
            snaps: RequestCoordinator::new(CACHE_TTL),
            routes: RequestCoordinator::new(CACHE_TTL),
        }
    }

    /// Moves a user-picked point onto the nearest road the profile can
    /// use. Best effort: on any failure the original point is kept, so
    /// callers never have to handle snap errors.
    pub async fn nearest_road(&self, point: &RoutePoint, profile: TravelProfile) -> RoutePoint {
        let key = RequestKey::snap(point, profile);
        let ors = self.ors.clone();
        let location = point.lng_lat();

        let result = self
            .snaps
            .execute(key, SNAP_DEBOUNCE, move || async move {
                ors.snap(profile, vec![location], SNAP_RADIUS_METERS)
                    .await
                    .map_err(RoutingError::from)
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!("snapping to road failed, keeping original point: {}", error);
                return point.clone();
            }
        };

        let Some(snapped) = response.locations.into_iter().flatten().next() else {
            debug!("no routable road within {SNAP_RADIUS_METERS}m, keeping original point");
            return point.clone();
        };

        let [lng, lat] = snapped.location;
        let candidate = RoutePoint {
            lat,
            lng,
            name: point.name.clone(),
        };

        if geometry::approx_distance_meters(point, &candidate) < SNAP_NOOP_THRESHOLD_METERS {
            return point.clone();
        }

        candidate
    }

    /// Computes a route between two points with the requested profile,
    /// falling back from wheelchair to walking when the service knows no
    /// accessible path. Any other failure propagates as is.
    pub async fn route(
        &self,
        start: &RoutePoint,
        end: &RoutePoint,
        options: RouteOptions,
    ) -> Result<RouteResult, RoutingError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(RoutingError::InvalidCoordinates);
        }

        let profile = options.profile;

        let (snapped_start, snapped_end) = tokio::join!(
            self.nearest_road(start, profile),
            self.nearest_road(end, profile),
        );

        // A zero-length route is meaningless, reject before asking the
        // service.
        if snapped_start.coords_eq(&snapped_end) {
            return Err(RoutingError::CoincidentPoints);
        }

        match self.fetch_route(&snapped_start, &snapped_end, profile).await {
            Ok(response) => Ok(RouteResult::new(response, profile)),
            Err(error) if profile == TravelProfile::Wheelchair && error.is_route_not_found() => {
                warn!("no wheelchair route, retrying with the walking profile");

                match self
                    .fetch_route(&snapped_start, &snapped_end, TravelProfile::Walking)
                    .await
                {
                    Ok(response) => Ok(RouteResult::new(response, TravelProfile::Walking)),
                    Err(fallback_error) => {
                        debug!("walking fallback failed as well: {}", fallback_error);
                        Err(error)
                    }
                }
            }
            Err(error) => Err(error),
        }
    }

    async fn fetch_route(
        &self,
        start: &RoutePoint,
        end: &RoutePoint,
        profile: TravelProfile,
    ) -> Result<RouteResponse, RoutingError> {
        let key = RequestKey::route(start, end, profile);
        let ors = self.ors.clone();
        let coordinates = vec![start.lng_lat(), end.lng_lat()];

        self.routes
            .execute(key, ROUTE_DEBOUNCE, move || async move {
                let response = ors.directions(profile, coordinates).await?;

                // Validated inside the producer so an unusable response
                // is never cached.
                let route = response.routes.first().ok_or(RoutingError::NoRoutes)?;
                if route.geometry.is_empty() {
                    return Err(RoutingError::MissingGeometry);
                }

                Ok(response)
            })
            .await
    }
}
