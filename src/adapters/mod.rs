//! Adapters: HTTP surfaces binding the domain to the outside world.

pub mod agent;
