pub mod config;
pub mod module;
pub mod segment;
