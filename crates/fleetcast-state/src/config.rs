//! fleet.toml configuration parser.
//!
//! Operator-facing configuration document for one fleet. The engine
//! itself takes the flat `ScalingPolicy` record; this module keeps the
//! file-format coupling at the edge.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PolicyError;
use crate::types::ScalingPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub fleet: FleetSection,
    #[serde(default)]
    pub policy: ScalingPolicy,
    pub forecast: Option<ForecastSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSection {
    pub id: String,
    pub description: Option<String>,
}

/// Forecast tuning. Horizons are minutes; the deadline is a duration
/// string like "2s" or "500ms".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSection {
    pub confidence_floor: Option<f64>,
    pub horizons: Option<Vec<u32>>,
    pub deadline: Option<String>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the embedded policy and forecast tuning.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.policy.validate()?;
        if let Some(ref forecast) = self.forecast
            && let Some(floor) = forecast.confidence_floor
            && !(0.0..=1.0).contains(&floor)
        {
            return Err(PolicyError::ThresholdRange {
                name: "confidence_floor",
                value: floor,
            });
        }
        Ok(())
    }

    /// Forecast deadline, if configured.
    pub fn forecast_deadline(&self) -> Option<Duration> {
        self.forecast
            .as_ref()
            .and_then(|f| f.deadline.as_deref())
            .and_then(parse_duration)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
