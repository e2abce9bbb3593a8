//! taskdeck — file-backed task board with an agent dispatch loop.

pub mod api;
pub mod config;
pub mod error;
pub mod personas;
pub mod queue;
pub mod scheduler;
pub mod store;
