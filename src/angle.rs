use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Horizontal angle in degrees, always normalized to [0, 360).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Azimuth(f64);

impl Azimuth {
    pub fn new(degrees: f64) -> Self {
        Self(normalize_deg(degrees))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    /// Signed shortest-arc difference `self - other`, in (-180, 180].
    pub fn diff(self, other: Azimuth) -> f64 {
        angle_diff(self.0, other.0)
    }

    /// Rotate by `degrees`, wrapping back into [0, 360).
    pub fn offset(self, degrees: f64) -> Self {
        Self::new(self.0 + degrees)
    }
}

impl fmt::Display for Azimuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}°", self.0)
    }
}

pub fn normalize_deg(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Return `a - b` wrapped into (-180, 180] degrees.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let d = normalize_deg(a - b);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}
