pub mod api;
pub mod collectors;
pub mod core;
pub mod locator;
pub mod utils;
