//! Time-bounded cache of endpoint liveness.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};

use waypoint_core::domain::EndpointId;

use super::prober::Prober;

/// Tuning knobs for the availability cache.
#[derive(Debug, Clone)]
pub struct AvailabilitySettings {
    /// Whether candidates are probed at all. When disabled,
    /// [`AvailabilityCache::filter_live`] passes its input through
    /// untouched.
    pub enabled: bool,
    /// Upper bound on a single probe.
    pub probe_timeout: Duration,
    /// Period of the wholesale cache clear.
    pub clear_period: Duration,
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_timeout: Duration::from_millis(2500),
            clear_period: Duration::from_secs(60),
        }
    }
}

/// One recorded probe result.
#[derive(Debug, Clone, Copy)]
struct Liveness {
    alive: bool,
    probed_at: Instant,
}

/// Shared cache of per-endpoint liveness over an asynchronous prober.
///
/// Entries are reused regardless of age; staleness is bounded by the
/// periodic wholesale clear, not by per-entry expiry. The entry map is
/// held behind an [`ArcSwap`] so a clear is one atomic swap to a fresh
/// map and readers never observe a partially cleared state.
pub struct AvailabilityCache {
    entries: ArcSwap<DashMap<EndpointId, Liveness>>,
    prober: Arc<dyn Prober>,
    settings: AvailabilitySettings,
}

impl AvailabilityCache {
    /// Creates a cache over `prober` with the given tuning.
    pub fn new(prober: Arc<dyn Prober>, settings: AvailabilitySettings) -> Self {
        Self {
            entries: ArcSwap::from_pointee(DashMap::new()),
            prober,
            settings,
        }
    }

    /// Filters `candidates` down to the endpoints currently believed
    /// live, preserving input order.
    ///
    /// Cached entries are used as-is. The remaining candidates are
    /// probed concurrently, each bounded by the configured timeout, and
    /// the call returns only once the whole batch has settled. Probe
    /// failures are recorded as not-live and logged at debug level;
    /// they are never surfaced to the caller.
    pub async fn filter_live(&self, candidates: &[EndpointId]) -> Vec<EndpointId> {
        if !self.settings.enabled {
            return candidates.to_vec();
        }

        // Pin the current map for the whole call. Results that race a
        // wholesale clear land in the retired map and the endpoints are
        // simply re-probed on the next call.
        let entries = self.entries.load_full();

        let mut pending: Vec<EndpointId> = Vec::new();
        for id in candidates {
            match entries.get(id) {
                Some(entry) => {
                    tracing::trace!(
                        endpoint = %id,
                        alive = entry.alive,
                        age_ms = entry.probed_at.elapsed().as_millis() as u64,
                        "reusing cached liveness"
                    );
                }
                None => {
                    if !pending.contains(id) {
                        pending.push(id.clone());
                    }
                }
            }
        }

        let mut probes = JoinSet::new();
        for id in pending {
            let prober = Arc::clone(&self.prober);
            let timeout = self.settings.probe_timeout;
            probes.spawn(async move {
                let alive = match time::timeout(timeout, prober.probe(&id)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(err)) => {
                        tracing::debug!(endpoint = %id, error = %err, "probe failed");
                        false
                    }
                    Err(_) => {
                        tracing::debug!(
                            endpoint = %id,
                            timeout_ms = timeout.as_millis() as u64,
                            "probe timed out"
                        );
                        false
                    }
                };
                (id, alive)
            });
        }

        // Join on the full batch; every probe settles before filtering.
        while let Some(joined) = probes.join_next().await {
            if let Ok((id, alive)) = joined {
                entries.insert(
                    id,
                    Liveness {
                        alive,
                        probed_at: Instant::now(),
                    },
                );
            }
        }

        candidates
            .iter()
            .filter(|id| entries.get(*id).map(|entry| entry.alive).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Spawns the periodic wholesale clear.
    ///
    /// Each tick swaps in a fresh empty map, forcing every endpoint to
    /// be re-probed on its next use; an entry written one second before
    /// the tick vanishes together with one written at the start of the
    /// period. Abort the returned handle on shutdown. Probes already in
    /// flight are abandoned, not cancelled.
    pub fn spawn_clear_task(self: Arc<Self>) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            let mut ticks = time::interval(cache.settings.clear_period);
            // Skip the immediate first tick.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                cache.entries.store(Arc::new(DashMap::new()));
                tracing::debug!("liveness cache cleared");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::availability::prober::ProbeError;

    use super::*;

    /// Prober with a fixed set of live endpoints and an optional set of
    /// endpoints that hang well past any configured timeout.
    struct ScriptedProber {
        live: HashSet<EndpointId>,
        hanging: HashSet<EndpointId>,
        calls: AtomicUsize,
    }

    impl ScriptedProber {
        fn new(live: &[&str], hanging: &[&str]) -> Self {
            Self {
                live: live.iter().map(|id| EndpointId::from(*id)).collect(),
                hanging: hanging.iter().map(|id| EndpointId::from(*id)).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, endpoint: &EndpointId) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hanging.contains(endpoint) {
                time::sleep(Duration::from_secs(3600)).await;
            }
            if self.live.contains(endpoint) {
                Ok(())
            } else {
                Err(ProbeError::Unreachable(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )))
            }
        }
    }

    fn endpoints(ids: &[&str]) -> Vec<EndpointId> {
        ids.iter().map(|id| EndpointId::from(*id)).collect()
    }

    fn cache_over(prober: Arc<ScriptedProber>, settings: AvailabilitySettings) -> AvailabilityCache {
        AvailabilityCache::new(prober, settings)
    }

    #[tokio::test]
    async fn disabled_checks_pass_input_through_without_probing() {
        let prober = Arc::new(ScriptedProber::new(&[], &[]));
        let cache = cache_over(
            Arc::clone(&prober),
            AvailabilitySettings {
                enabled: false,
                ..AvailabilitySettings::default()
            },
        );

        let input = endpoints(&["a", "b", "c"]);
        let live = cache.filter_live(&input).await;

        assert_eq!(live, input);
        assert_eq!(prober.calls(), 0);
    }

    #[tokio::test]
    async fn dead_endpoints_are_dropped_and_order_is_preserved() {
        let prober = Arc::new(ScriptedProber::new(&["a", "c"], &[]));
        let cache = cache_over(Arc::clone(&prober), AvailabilitySettings::default());

        let live = cache.filter_live(&endpoints(&["a", "b", "c"])).await;

        assert_eq!(live, endpoints(&["a", "c"]));
        assert_eq!(prober.calls(), 3);
    }

    #[tokio::test]
    async fn cached_entries_are_reused_without_probing_again() {
        let prober = Arc::new(ScriptedProber::new(&["a"], &[]));
        let cache = cache_over(Arc::clone(&prober), AvailabilitySettings::default());

        cache.filter_live(&endpoints(&["a", "b"])).await;
        let live = cache.filter_live(&endpoints(&["a", "b"])).await;

        assert_eq!(live, endpoints(&["a"]));
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test]
    async fn duplicate_candidates_are_probed_once() {
        let prober = Arc::new(ScriptedProber::new(&["a"], &[]));
        let cache = cache_over(Arc::clone(&prober), AvailabilitySettings::default());

        let live = cache.filter_live(&endpoints(&["a", "a"])).await;

        assert_eq!(live, endpoints(&["a", "a"]));
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out_and_is_recorded_not_live() {
        let prober = Arc::new(ScriptedProber::new(&["a"], &["b"]));
        let cache = cache_over(Arc::clone(&prober), AvailabilitySettings::default());

        let live = cache.filter_live(&endpoints(&["a", "b"])).await;
        assert_eq!(live, endpoints(&["a"]));

        // The timeout result is cached: no second probe for `b`.
        let live = cache.filter_live(&endpoints(&["a", "b"])).await;
        assert_eq!(live, endpoints(&["a"]));
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_tick_forces_reprobe() {
        let prober = Arc::new(ScriptedProber::new(&["a", "b"], &[]));
        let cache = Arc::new(cache_over(
            Arc::clone(&prober),
            AvailabilitySettings {
                clear_period: Duration::from_secs(60),
                ..AvailabilitySettings::default()
            },
        ));
        let clear = Arc::clone(&cache).spawn_clear_task();
        // Let the clear task park on its first real tick.
        tokio::task::yield_now().await;

        cache.filter_live(&endpoints(&["a", "b"])).await;
        assert_eq!(prober.calls(), 2);

        // Before the period lapses, cached results are reused.
        time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        cache.filter_live(&endpoints(&["a", "b"])).await;
        assert_eq!(prober.calls(), 2);

        // After the period lapses, everything is probed again.
        time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        cache.filter_live(&endpoints(&["a", "b"])).await;
        assert_eq!(prober.calls(), 4);

        clear.abort();
    }

    #[tokio::test]
    async fn concurrent_filters_converge_to_one_entry_per_endpoint() {
        let prober = Arc::new(ScriptedProber::new(&["a"], &[]));
        let cache = Arc::new(cache_over(Arc::clone(&prober), AvailabilitySettings::default()));

        let (first, second) = tokio::join!(
            cache.filter_live(&endpoints(&["a"])),
            cache.filter_live(&endpoints(&["a"])),
        );
        assert_eq!(first, endpoints(&["a"]));
        assert_eq!(second, endpoints(&["a"]));

        // Racing calls may have probed twice, but the cache converged:
        // another call reuses the single stored entry.
        let racing_calls = prober.calls();
        assert!(racing_calls <= 2);
        cache.filter_live(&endpoints(&["a"])).await;
        assert_eq!(prober.calls(), racing_calls);
    }
}
