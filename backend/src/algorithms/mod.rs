//! Pure geometric computations over polygon rings.

pub mod geometry;

pub use geometry::{area_hectares, find_spikes, is_simple, SPIKE_ANGLE_THRESHOLD_DEGREES};
