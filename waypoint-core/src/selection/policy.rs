//! Strategies for picking one endpoint out of a live candidate set.

use rand::Rng;

use crate::domain::id::EndpointId;

/// A point-in-time view of how many clients each endpoint is serving.
///
/// Supplied by the embedding proxy; the selection policy never mutates
/// load state.
pub trait LoadSnapshot: Send + Sync {
    /// Number of clients currently attached to `endpoint`.
    fn current_load(&self, endpoint: &EndpointId) -> usize;
}

/// Strategy used to pick one endpoint among the live candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Pick the candidate serving the fewest clients. Ties go to the
    /// earliest candidate in input order, so repeated calls with an
    /// unchanged snapshot pick the same endpoint.
    #[default]
    LeastLoad,
    /// Pick uniformly at random among the candidates.
    Random,
}

impl SelectionMode {
    /// Parses a configured mode name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "LEAST_LOAD" | "LEAST-LOAD" => Some(Self::LeastLoad),
            "RANDOM" => Some(Self::Random),
            _ => None,
        }
    }
}

/// Picks one endpoint from `candidates` according to `mode`.
///
/// Returns `None` only when `candidates` is empty; callers are expected
/// to have handled the empty case before asking for a selection.
pub fn select_endpoint(
    candidates: &[EndpointId],
    loads: &dyn LoadSnapshot,
    mode: SelectionMode,
) -> Option<EndpointId> {
    if candidates.is_empty() {
        return None;
    }

    match mode {
        SelectionMode::LeastLoad => candidates
            .iter()
            .min_by_key(|id| loads.current_load(id))
            .cloned(),
        SelectionMode::Random => {
            let index = rand::thread_rng().gen_range(0..candidates.len());
            Some(candidates[index].clone())
        }
    }
}
