// Pure spherical geometry (no tensor ownership)

pub mod mapping;
pub mod rotation;

pub use mapping::{GridExtent, SamplePoint, SamplingGrid, geocyclic_wrap};
pub use rotation::{LatLon, frame_rotation, normalize_longitude, to_rotated, to_standard};
