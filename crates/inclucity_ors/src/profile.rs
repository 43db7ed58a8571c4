use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Routing profile offered to users. The profile picks which paths the
/// service considers traversable, not just a speed model.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    Wheelchair,
    Walking,
}

impl Display for TravelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TravelProfile::Wheelchair => "wheelchair",
                TravelProfile::Walking => "walking",
            }
        )
    }
}

impl std::str::FromStr for TravelProfile {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "wheelchair" => Ok(TravelProfile::Wheelchair),
            "walking" => Ok(TravelProfile::Walking),
            other => Err(format!("unknown travel profile: {other}")),
        }
    }
}
