//! Candidate groups and origin-to-group resolution.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::id::EndpointId;

/// A named, ordered set of endpoints eligible for selection.
///
/// Order is meaningful: the selection policy breaks least-load ties in
/// favor of earlier entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGroup {
    name: String,
    endpoints: Vec<EndpointId>,
}

impl CandidateGroup {
    /// Create a new group with the given member endpoints.
    pub fn new(name: impl Into<String>, endpoints: Vec<EndpointId>) -> Self {
        Self {
            name: name.into(),
            endpoints,
        }
    }

    /// The group's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member endpoints, in configuration order.
    pub fn endpoints(&self) -> &[EndpointId] {
        &self.endpoints
    }
}

/// Error raised when a directory is built from invalid topology.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The fallback group is not among the defined groups.
    #[error("default group `{0}` is not defined")]
    MissingDefaultGroup(String),
}

/// Maps a client's current origin to the candidate group that applies
/// to it.
///
/// Resolution is total: origins with no mapping, mappings that name a
/// nonexistent group, and clients with no origin at all land on the
/// default group. The topology is fixed at construction; a changed
/// deployment file takes effect on restart.
#[derive(Debug)]
pub struct GroupDirectory {
    groups: HashMap<String, Arc<CandidateGroup>>,
    mappings: HashMap<EndpointId, String>,
    fallback: Arc<CandidateGroup>,
}

impl GroupDirectory {
    /// Builds a directory, validating that `default_group` names one of
    /// the defined groups.
    pub fn new(
        groups: Vec<CandidateGroup>,
        mappings: HashMap<EndpointId, String>,
        default_group: &str,
    ) -> Result<Self, DirectoryError> {
        let groups: HashMap<String, Arc<CandidateGroup>> = groups
            .into_iter()
            .map(|group| (group.name().to_owned(), Arc::new(group)))
            .collect();

        let fallback = groups
            .get(default_group)
            .cloned()
            .ok_or_else(|| DirectoryError::MissingDefaultGroup(default_group.to_owned()))?;

        Ok(Self {
            groups,
            mappings,
            fallback,
        })
    }

    /// Resolves the candidate group for a client currently attached to
    /// `origin`.
    pub fn resolve(&self, origin: Option<&EndpointId>) -> &Arc<CandidateGroup> {
        origin
            .and_then(|origin| self.mappings.get(origin))
            .and_then(|name| self.groups.get(name))
            .unwrap_or(&self.fallback)
    }

    /// The group unmapped origins fall back to.
    pub fn default_group(&self) -> &Arc<CandidateGroup> {
        &self.fallback
    }

    /// Looks up a group by name.
    pub fn group(&self, name: &str) -> Option<&Arc<CandidateGroup>> {
        self.groups.get(name)
    }
}
