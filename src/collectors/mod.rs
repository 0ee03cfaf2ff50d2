pub mod cartodb;
pub mod earth_engine;
