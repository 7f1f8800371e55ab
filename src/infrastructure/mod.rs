//! Infrastructure layer: configuration, logging, metrics, and the HTTP
//! implementations of the domain ports.

pub mod config;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod rpc;
