use serde::{Deserialize, Serialize};

/// Coordinate pair in the order the service expects: [lng, lat].
pub type OrsPoint = [f64; 2];

#[derive(Debug, Clone, Serialize)]
pub struct SnapRequestBody {
    /// Points to match onto the road network
    pub locations: Vec<OrsPoint>,

    /// Search radius around each point, in meters
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionsRequestBody {
    /// Start and destination of the requested route
    pub coordinates: Vec<OrsPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapResponse {
    /// One entry per requested location, null when nothing routable was
    /// found within the radius
    #[serde(default)]
    pub locations: Vec<Option<SnappedLocation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnappedLocation {
    /// Matched point on the road network
    pub location: OrsPoint,

    /// Street name at the matched point
    pub name: Option<String>,

    /// How far the match moved from the query point, in meters
    pub snapped_distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteResponse {
    pub routes: Vec<Route>,
    pub metadata: Option<RouteMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    /// Polyline-encoded path geometry
    pub geometry: String,

    #[serde(default)]
    pub summary: RouteSummary,

    #[serde(default)]
    pub segments: Vec<RouteSegment>,

    #[serde(default)]
    pub bbox: Vec<f64>,

    /// Indices into the decoded geometry where segments start and end
    #[serde(default)]
    pub way_points: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RouteSummary {
    /// Meters
    #[serde(default)]
    pub distance: f64,

    /// Seconds
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteSegment {
    #[serde(default)]
    pub distance: f64,

    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

/// One turn-by-turn instruction, rendered to the user in sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteStep {
    pub distance: f64,

    pub duration: f64,

    /// Maneuver type identifier
    #[serde(rename = "type")]
    pub kind: i32,

    pub instruction: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub way_points: Vec<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteMetadata {
    pub query: Option<RouteMetadataQuery>,
    pub service: Option<String>,
}

/// Echo of the request as the service understood it. On a fallback the
/// profile reported here is what the service ran, which is why the
/// effective profile is tracked outside the response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteMetadataQuery {
    pub profile: Option<String>,
}
