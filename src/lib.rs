pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod params;
pub mod simulator;
pub mod strategy;
