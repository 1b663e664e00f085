//! The forecast capability contract.
//!
//! The decision engine depends on a capability, not an implementation:
//! anything that can map `(now, horizons)` to per-horizon predictions may
//! drive scaling. Implementations are swappable adapters; the engine never
//! blocks indefinitely on one because every call goes through
//! [`forecast_with_deadline`].

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Boxed future returned by [`Forecaster::forecast`].
pub type BoxForecast = Pin<Box<dyn Future<Output = Result<ForecastResult, ForecastError>> + Send>>;

/// A pluggable traffic forecaster.
///
/// `horizons` are forecast offsets in minutes. An implementation may omit
/// horizons it cannot serve; selection falls back per the configured
/// [`HorizonStrategy`](crate::horizon::HorizonStrategy).
pub trait Forecaster: Send + Sync {
    fn forecast(&self, now: u64, horizons: &[u32]) -> BoxForecast;
}

/// Prediction for a single horizon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HorizonForecast {
    /// Predicted request volume, requests per minute.
    pub predicted_requests: f64,
    /// Forecaster confidence in [0, 1].
    pub confidence: f64,
}

/// A forecast across one or more horizons. Pure input value; the core
/// never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    /// Unix timestamp the forecast was generated for.
    pub generated_at: u64,
    /// Horizon (minutes) → prediction, ordered by horizon.
    pub horizons: BTreeMap<u32, HorizonForecast>,
}

impl ForecastResult {
    pub fn new(generated_at: u64) -> Self {
        Self {
            generated_at,
            horizons: BTreeMap::new(),
        }
    }

    pub fn with_horizon(mut self, minutes: u32, predicted_requests: f64, confidence: f64) -> Self {
        self.horizons.insert(
            minutes,
            HorizonForecast {
                predicted_requests,
                confidence,
            },
        );
        self
    }

    pub fn get(&self, minutes: u32) -> Option<&HorizonForecast> {
        self.horizons.get(&minutes)
    }
}

/// Errors from a forecast call.
///
/// These never fail an engine tick; the engine absorbs them into a
/// degraded decision based on current utilization only.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("forecaster returned none of the requested horizons")]
    MissingHorizon,

    #[error("insufficient history: {0} observations")]
    InsufficientHistory(usize),

    #[error("forecast backend failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Call a forecaster with a bounded deadline.
///
/// Deadline expiry is reported as [`ForecastError::DeadlineExceeded`];
/// there is no retry, keeping tick latency bounded.
pub async fn forecast_with_deadline(
    forecaster: &dyn Forecaster,
    now: u64,
    horizons: &[u32],
    deadline: Duration,
) -> Result<ForecastResult, ForecastError> {
    match tokio::time::timeout(deadline, forecaster.forecast(now, horizons)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(?deadline, now, "forecast call timed out");
            Err(ForecastError::DeadlineExceeded(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Forecaster that answers immediately with a fixed value.
    struct Immediate(f64);

    impl Forecaster for Immediate {
        fn forecast(&self, now: u64, horizons: &[u32]) -> BoxForecast {
            let mut result = ForecastResult::new(now);
            for &h in horizons {
                result = result.with_horizon(h, self.0, 0.9);
            }
            Box::pin(std::future::ready(Ok(result)))
        }
    }

    /// Forecaster that never resolves.
    struct Stuck;

    impl Forecaster for Stuck {
        fn forecast(&self, _now: u64, _horizons: &[u32]) -> BoxForecast {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn deadline_passes_through_fast_forecasts() {
        let forecaster = Immediate(120.0);
        let result =
            forecast_with_deadline(&forecaster, 1_000, &[1, 5], Duration::from_secs(1))
                .await
                .unwrap();
        assert_eq!(result.get(5).unwrap().predicted_requests, 120.0);
        assert_eq!(result.horizons.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_maps_to_error() {
        let forecaster = Stuck;
        let err =
            forecast_with_deadline(&forecaster, 1_000, &[5], Duration::from_millis(100)).await;
        assert!(matches!(err, Err(ForecastError::DeadlineExceeded(_))));
    }

    #[test]
    fn horizons_iterate_in_ascending_order() {
        let result = ForecastResult::new(0)
            .with_horizon(15, 100.0, 0.8)
            .with_horizon(1, 110.0, 0.95)
            .with_horizon(5, 105.0, 0.9);
        let minutes: Vec<u32> = result.horizons.keys().copied().collect();
        assert_eq!(minutes, vec![1, 5, 15]);
    }
}
