pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod exit;
pub mod learner;
pub mod logs;
pub mod metrics;
pub mod scoring;
pub mod ui;
