// Field padding and resampling

pub mod padding;
pub mod resample;
pub mod sampler;

pub use padding::{GeoCyclicPadding, HaloPadding};
pub use resample::PaddedResampler;
pub use sampler::BicubicSampler;
