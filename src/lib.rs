// ABOUTME: Root library module exposing the bot host's public modules
// ABOUTME: Provides config, message bus, gateways, dispatcher and registry wiring

pub mod app;
pub mod bus;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod paths;

// Re-export the dispatch engine for convenience
pub use parley_core::{Registry, Signals};
