//! Statistical trend estimator.
//!
//! A model-free forecaster: recent mean plus a per-minute trend slope,
//! with confidence decaying over the horizon. Useful as a fallback when
//! no trained model is deployed, and as the deterministic forecaster in
//! tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use crate::contract::{BoxForecast, ForecastError, ForecastResult, Forecaster};

/// Samples required before the estimator will forecast.
const MIN_SAMPLES: usize = 3;

/// How many of the newest samples feed the level estimate.
const LEVEL_WINDOW: usize = 3;

/// Moving-average + trend forecaster over recent traffic observations.
///
/// Interior mutability keeps the estimator usable behind a shared
/// `&dyn Forecaster` while telemetry keeps feeding it.
pub struct TrendEstimator {
    inner: Mutex<EstimatorInner>,
    window: usize,
}

struct EstimatorInner {
    /// (timestamp, requests-per-minute) observations, oldest first.
    samples: VecDeque<(u64, f64)>,
}

impl TrendEstimator {
    /// Create an estimator retaining the last `window` observations.
    pub fn new(window: usize) -> Self {
        Self {
            inner: Mutex::new(EstimatorInner {
                samples: VecDeque::with_capacity(window),
            }),
            window: window.max(MIN_SAMPLES),
        }
    }

    /// Record one traffic observation.
    pub fn observe(&self, timestamp: u64, requests: f64) {
        let mut inner = self.inner.lock().expect("estimator lock poisoned");
        inner.samples.push_back((timestamp, requests));
        while inner.samples.len() > self.window {
            inner.samples.pop_front();
        }
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("estimator lock poisoned").samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn predict(&self, now: u64, horizons: &[u32]) -> Result<ForecastResult, ForecastError> {
        let inner = self.inner.lock().expect("estimator lock poisoned");
        let samples = &inner.samples;
        if samples.len() < MIN_SAMPLES {
            return Err(ForecastError::InsufficientHistory(samples.len()));
        }

        let level = samples
            .iter()
            .rev()
            .take(LEVEL_WINDOW)
            .map(|&(_, v)| v)
            .sum::<f64>()
            / LEVEL_WINDOW as f64;

        // Per-minute slope across the retained window.
        let (first_ts, first_val) = samples[0];
        let (last_ts, last_val) = samples[samples.len() - 1];
        let span_minutes = last_ts.saturating_sub(first_ts) as f64 / 60.0;
        let slope = if span_minutes > 0.0 {
            (last_val - first_val) / span_minutes
        } else {
            0.0
        };

        let mut result = ForecastResult::new(now);
        for &minutes in horizons {
            let predicted = (level + slope * minutes as f64).max(0.0);
            result = result.with_horizon(minutes, predicted, confidence_for(minutes));
        }
        debug!(
            samples = samples.len(),
            level, slope, "trend estimator forecast"
        );
        Ok(result)
    }
}

impl Forecaster for TrendEstimator {
    fn forecast(&self, now: u64, horizons: &[u32]) -> BoxForecast {
        let result = self.predict(now, horizons);
        Box::pin(std::future::ready(result))
    }
}

/// Confidence decays with the horizon and floors at 0.6.
fn confidence_for(minutes: u32) -> f64 {
    let penalty = (minutes as f64 * 0.01).min(0.3);
    (0.95 - penalty).max(0.6)
}
