//! Rate-limited request queue and the worker-process bridge behind it.

pub mod bridge;
pub mod request_queue;

pub use bridge::WorkerBridge;
pub use request_queue::RequestQueue;
