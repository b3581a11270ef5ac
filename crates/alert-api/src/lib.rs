//! Administrative HTTP surface for the subscription graph.

pub mod config;
pub mod server;
