pub mod driver;
pub mod stats;

pub use driver::{StepReport, run};
pub use stats::FieldStats;
