//! fleetcast-forecast — the forecast contract for fleetcast.
//!
//! The decision engine consumes predictions through a capability trait;
//! statistical and model-backed forecasters are swappable adapters behind
//! it. Every call is deadline-bounded, and horizon selection is an
//! injectable strategy rather than a hard-coded choice.
//!
//! # Architecture
//!
//! ```text
//! Forecaster (trait)
//!   ├── TrendEstimator — moving average + trend, confidence decay
//!   └── <model-backed adapters, external>
//!
//! forecast_with_deadline() → Result<ForecastResult, ForecastError>
//!   └── expiry ⇒ the engine degrades to current utilization
//!
//! HorizonStrategy (trait)
//!   ├── ShortestConfident — shortest horizon above a confidence floor
//!   └── FixedHorizon — one horizon unconditionally
//! ```

pub mod contract;
pub mod estimator;
pub mod horizon;

pub use contract::{
    BoxForecast, ForecastError, ForecastResult, Forecaster, HorizonForecast,
    forecast_with_deadline,
};
pub use estimator::TrendEstimator;
pub use horizon::{
    DEFAULT_CONFIDENCE_FLOOR, DEFAULT_HORIZONS, FixedHorizon, HorizonStrategy, ShortestConfident,
};
