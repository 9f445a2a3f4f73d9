// Core modules
pub mod activity;
pub mod ai;
pub mod cli;
pub mod config;
pub mod github;
pub mod models;
pub mod quality;

// Run coordination
pub mod infrastructure;
pub mod orchestrator;
