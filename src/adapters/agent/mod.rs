//! Agent skeleton: the shared harness every agent process runs on.
//!
//! Business logic implements [`AgentExecutor`]; the skeleton provides
//! the capability registry, the task store, the streaming adapter, and
//! the A2A HTTP surface.

pub mod executor;
pub mod registry;
pub mod server;
pub mod store;

pub use executor::{AgentExecutor, EchoExecutor, ExecutorStream, ExecutorUpdate};
pub use registry::AgentRegistration;
pub use server::AgentServer;
pub use store::TaskStore;
