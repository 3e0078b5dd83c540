pub mod ensemble;
pub mod model;
pub mod reaction;

pub use ensemble::{ensemble_mean, run_ensemble};
pub use model::{Forecast, Forecaster};
pub use reaction::{DiffusionReaction, PointwiseReaction};
