pub mod combine;
pub mod math;
pub mod quantity;
pub mod signal;
pub mod xy_curve;
