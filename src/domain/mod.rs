//! Domain layer: models, error taxonomy, and the ports the service
//! layer depends on.

pub mod errors;
pub mod models;
pub mod ports;
