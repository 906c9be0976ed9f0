//! Shared infrastructure used across wallet modules.

pub mod shutdown;

pub use shutdown::{ThreadGroup, ThreadGuard};
