pub mod advection;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod error;
pub mod field;
pub mod forecast;
pub mod geometry;
pub mod grid;
pub mod layers;
pub mod synthetic;
pub mod velocity;

pub use advection::{Advected, NeuralSemiLagrangian};
pub use checkpoint::ModelWeights;
pub use config::ForecastConfig;
pub use error::{AdvectionError, Result};
pub use forecast::{Forecast, Forecaster};
pub use grid::LatLonGrid;
