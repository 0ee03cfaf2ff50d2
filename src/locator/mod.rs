pub mod params;
pub mod truth;
