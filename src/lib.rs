pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod quartile;
pub mod query;
pub mod render;
pub mod sources;
pub mod utils;
