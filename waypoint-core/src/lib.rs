//! Waypoint Core functionality.
//!
//! This crate contains the domain models and selection primitives that
//! power the Waypoint lobby router: endpoint and client identity, the
//! candidate-group directory, and the policies for picking one endpoint
//! out of a live candidate set.

pub mod domain;
pub mod selection;
