//! Endpoint liveness probing and the availability cache.

pub mod cache;
pub mod prober;

pub use cache::{AvailabilityCache, AvailabilitySettings};
pub use prober::{ProbeError, Prober, TcpProber};
