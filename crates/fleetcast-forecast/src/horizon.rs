//! Horizon selection strategies.
//!
//! A forecast carries several horizons but only one drives scaling. Which
//! one is an explicit, injectable strategy so the policy can be tested and
//! swapped rather than hard-coded in the engine.

use crate::contract::{ForecastResult, HorizonForecast};

/// Default confidence floor below which a horizon is not trusted to
/// drive scaling.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.6;

/// Default horizons requested from a forecaster, in minutes.
pub const DEFAULT_HORIZONS: [u32; 3] = [1, 5, 15];

/// Picks the horizon that drives a scaling decision.
pub trait HorizonStrategy: Send + Sync {
    /// Horizons to request from the forecaster, in minutes.
    fn requested(&self) -> &[u32];

    /// Select the driving horizon, or `None` if the forecast is unusable
    /// (the engine then degrades to current utilization).
    fn select<'a>(&self, forecast: &'a ForecastResult) -> Option<(u32, &'a HorizonForecast)>;
}

/// Prefer the shortest requested horizon whose confidence meets the
/// floor, scanning upward. A forecast with no qualifying horizon is
/// treated as unusable rather than scaled on at low confidence.
#[derive(Debug, Clone)]
pub struct ShortestConfident {
    horizons: Vec<u32>,
    confidence_floor: f64,
}

impl ShortestConfident {
    pub fn new(mut horizons: Vec<u32>, confidence_floor: f64) -> Self {
        horizons.sort_unstable();
        horizons.dedup();
        Self {
            horizons,
            confidence_floor,
        }
    }
}

impl Default for ShortestConfident {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZONS.to_vec(), DEFAULT_CONFIDENCE_FLOOR)
    }
}

impl HorizonStrategy for ShortestConfident {
    fn requested(&self) -> &[u32] {
        &self.horizons
    }

    fn select<'a>(&self, forecast: &'a ForecastResult) -> Option<(u32, &'a HorizonForecast)> {
        self.horizons.iter().find_map(|&minutes| {
            forecast
                .get(minutes)
                .filter(|h| h.confidence >= self.confidence_floor)
                .map(|h| (minutes, h))
        })
    }
}

/// Always use one horizon, regardless of confidence. Matches deployments
/// that scale on a fixed five-minute forecast.
#[derive(Debug, Clone)]
pub struct FixedHorizon {
    requested: [u32; 1],
}

impl FixedHorizon {
    pub fn new(minutes: u32) -> Self {
        Self {
            requested: [minutes],
        }
    }
}

impl HorizonStrategy for FixedHorizon {
    fn requested(&self) -> &[u32] {
        &self.requested
    }

    fn select<'a>(&self, forecast: &'a ForecastResult) -> Option<(u32, &'a HorizonForecast)> {
        forecast
            .get(self.requested[0])
            .map(|h| (self.requested[0], h))
    }
}
