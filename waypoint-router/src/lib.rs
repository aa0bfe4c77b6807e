//! Waypoint Routing Engine
//!
//! The async engine behind the lobby routing command: it keeps a
//! time-bounded cache of endpoint liveness, enforces per-client
//! cooldowns, and walks each invocation through the routing gates until
//! a connection request is dispatched or a rejection is reported.
//!
//! The engine is embedded into a proxy host, which supplies the
//! collaborators at the seams: a [`availability::Prober`], a
//! [`router::ConnectionTransport`], a [`router::PermissionProvider`], a
//! [`router::Messenger`], and a load snapshot.

pub mod availability;
pub mod config;
pub mod cooldown;
pub mod messages;
pub mod router;

pub use config::{Config, ConfigError};
pub use router::{CommandSource, RouteOutcome, Router};
