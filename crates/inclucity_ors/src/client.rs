use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::profile::TravelProfile;
use crate::types::{
    DirectionsRequestBody, OrsPoint, RouteResponse, SnapRequestBody, SnapResponse,
};

pub const ORS_API_BASE_URL: &str = "https://api.openrouteservice.org/v2";

const API_KEY_ENV_VAR: &str = "ORS_API_KEY";
const BASE_URL_ENV_VAR: &str = "ORS_BASE_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upstream error codes for "no route between the points" and "no
/// routable point near the query".
const CODE_ROUTE_NOT_FOUND: u64 = 2009;
const CODE_POINT_NOT_FOUND: u64 = 2010;

#[derive(Debug, Error)]
pub enum OrsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<u64>,
        message: String,
    },

    #[error("unexpected API response: {status} - {body}")]
    RawApi { status: u16, body: String },

    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl OrsError {
    /// True when the upstream reports that no route or routable point
    /// exists for the request. The structured code is authoritative; the
    /// substring match against the human-readable message is legacy
    /// behavior kept for responses that omit the code, and should not be
    /// extended.
    pub fn is_route_not_found(&self) -> bool {
        match self {
            OrsError::Api {
                code: Some(code), ..
            } => *code == CODE_ROUTE_NOT_FOUND || *code == CODE_POINT_NOT_FOUND,
            OrsError::Api { message, .. } => message.contains("could not be found"),
            _ => false,
        }
    }
}

// Error body shape returned by the service. The code is numeric in
// practice but a few endpoints quote it, so both are accepted.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OrsErrorCode {
    Number(u64),
    Text(String),
}

impl OrsErrorCode {
    fn as_u64(&self) -> Option<u64> {
        match self {
            OrsErrorCode::Number(code) => Some(*code),
            OrsErrorCode::Text(code) => code.parse().ok(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct OrsErrorDetail {
    #[serde(default)]
    code: Option<OrsErrorCode>,
    message: String,
}

#[derive(Deserialize, Debug)]
struct OrsErrorPayload {
    error: OrsErrorDetail,
}

#[derive(Debug, Clone)]
pub struct OrsClientParams {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct OrsClient {
    params: OrsClientParams,
    client: reqwest::Client,
}

impl OrsClient {
    pub fn new(params: OrsClientParams) -> Result<Self, OrsError> {
        let client = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()?;

        Ok(Self { params, client })
    }

    /// Reads the API key from `ORS_API_KEY`, and an optional base URL
    /// override from `ORS_BASE_URL`.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let api_key = std::env::var(API_KEY_ENV_VAR)
            .map_err(|_| anyhow::anyhow!(format!("{} is not set", API_KEY_ENV_VAR)))?;
        let base_url =
            std::env::var(BASE_URL_ENV_VAR).unwrap_or_else(|_| ORS_API_BASE_URL.to_string());

        Ok(Self::new(OrsClientParams {
            api_key,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        })?)
    }

    /// Asks the service for the nearest routable point within `radius`
    /// meters of each location.
    pub async fn snap(
        &self,
        profile: TravelProfile,
        locations: Vec<OrsPoint>,
        radius: f64,
    ) -> Result<SnapResponse, OrsError> {
        let url = format!("{}/snap/{}", self.params.base_url, profile);
        let body = SnapRequestBody { locations, radius };

        debug!(
            "OrsApi: snapping {} location(s) with the {} profile",
            body.locations.len(),
            profile
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", &self.params.api_key)
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Requests a route through the given coordinates.
    pub async fn directions(
        &self,
        profile: TravelProfile,
        coordinates: Vec<OrsPoint>,
    ) -> Result<RouteResponse, OrsError> {
        let url = format!("{}/directions/{}", self.params.base_url, profile);
        let body = DirectionsRequestBody { coordinates };

        debug!("OrsApi: requesting directions with the {} profile", profile);

        let response = self
            .client
            .post(url)
            .header("Authorization", &self.params.api_key)
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, OrsError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;

            serde_json::from_str::<T>(&body).map_err(|parse_error| {
                error!(
                    "OrsApi: failed to parse response: {}. Body: {}",
                    parse_error, body
                );
                OrsError::from(parse_error)
            })
        } else {
            let status = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            match serde_json::from_str::<OrsErrorPayload>(&body) {
                Ok(payload) => Err(OrsError::Api {
                    status,
                    code: payload.error.code.as_ref().and_then(OrsErrorCode::as_u64),
                    message: payload.error.message,
                }),
                Err(_) => Err(OrsError::RawApi { status, body }),
            }
        }
    }
}
