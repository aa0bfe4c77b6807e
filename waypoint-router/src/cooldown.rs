//! Per-client rate limiting for routing actions.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use waypoint_core::domain::ClientId;

/// Result of a cooldown lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// The client may route now.
    Ready,
    /// The client must wait before routing again.
    Active {
        /// Whole seconds left, rounded up, never below 1.
        remaining_secs: u64,
    },
}

/// Gates how often each client may invoke the routing action.
///
/// A zero duration disables the guard entirely: `check` always answers
/// [`CooldownStatus::Ready`] and `arm` writes nothing.
///
/// `check` and `arm` are separate steps of one invocation, so two
/// overlapping invocations for the same client can both observe `Ready`
/// before either arms. The window spans a single routing decision and
/// matches the reference behavior; entries are independent per client,
/// so the race never leaks across clients.
#[derive(Debug)]
pub struct CooldownGuard {
    expiries: DashMap<ClientId, Instant>,
    duration: Duration,
}

impl CooldownGuard {
    /// Creates a guard enforcing `duration` between routing actions.
    pub fn new(duration: Duration) -> Self {
        Self {
            expiries: DashMap::new(),
            duration,
        }
    }

    /// Reads the client's cooldown state. Never arms anything.
    pub fn check(&self, client: &ClientId) -> CooldownStatus {
        if self.duration.is_zero() {
            return CooldownStatus::Ready;
        }

        let now = Instant::now();
        let expiry = self.expiries.get(client).map(|entry| *entry);
        match expiry {
            Some(expiry) if expiry > now => {
                let left = expiry - now;
                let mut secs = left.as_secs();
                if left.subsec_nanos() > 0 {
                    secs += 1;
                }
                CooldownStatus::Active {
                    remaining_secs: secs.max(1),
                }
            }
            Some(_) => {
                // Lapsed entry; sweep it so the map stays bounded.
                self.expiries.remove(client);
                CooldownStatus::Ready
            }
            None => CooldownStatus::Ready,
        }
    }

    /// Starts (or restarts) the client's cooldown window.
    pub fn arm(&self, client: &ClientId) {
        if self.duration.is_zero() {
            return;
        }
        self.expiries.insert(client.clone(), Instant::now() + self.duration);
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;

    fn client(id: &str) -> ClientId {
        ClientId::from(id)
    }

    #[tokio::test(start_paused = true)]
    async fn unarmed_client_is_ready() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        assert_eq!(guard.check(&client("alice")), CooldownStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn armed_client_must_wait() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        guard.arm(&client("alice"));
        assert_eq!(
            guard.check(&client("alice")),
            CooldownStatus::Active { remaining_secs: 3 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_seconds_round_up_and_never_drop_below_one() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        guard.arm(&client("alice"));

        time::advance(Duration::from_millis(2500)).await;
        assert_eq!(
            guard.check(&client("alice")),
            CooldownStatus::Active { remaining_secs: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_seconds_never_increase_across_checks() {
        let guard = CooldownGuard::new(Duration::from_secs(5));
        guard.arm(&client("alice"));

        let mut last = u64::MAX;
        for _ in 0..4 {
            match guard.check(&client("alice")) {
                CooldownStatus::Active { remaining_secs } => {
                    assert!(remaining_secs <= last);
                    last = remaining_secs;
                }
                CooldownStatus::Ready => panic!("cooldown lapsed too early"),
            }
            time::advance(Duration::from_millis(900)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_lapses_after_duration() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        guard.arm(&client("alice"));

        time::advance(Duration::from_secs(3)).await;
        assert_eq!(guard.check(&client("alice")), CooldownStatus::Ready);
        // The lapsed entry was swept.
        assert!(guard.expiries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_window() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        guard.arm(&client("alice"));
        time::advance(Duration::from_secs(2)).await;
        guard.arm(&client("alice"));

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            guard.check(&client("alice")),
            CooldownStatus::Active { remaining_secs: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clients_do_not_affect_each_other() {
        let guard = CooldownGuard::new(Duration::from_secs(3));
        guard.arm(&client("alice"));
        assert_eq!(guard.check(&client("bob")), CooldownStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_disables_the_guard() {
        let guard = CooldownGuard::new(Duration::ZERO);
        guard.arm(&client("alice"));
        assert_eq!(guard.check(&client("alice")), CooldownStatus::Ready);
        assert!(guard.expiries.is_empty());
    }
}
