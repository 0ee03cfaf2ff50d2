pub mod expr;
pub mod geometry;
pub mod landsat;
