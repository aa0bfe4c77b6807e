//! Gate-by-gate orchestration of one routing decision.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use waypoint_core::domain::{ClientId, EndpointId, GroupDirectory};
use waypoint_core::selection::{select_endpoint, LoadSnapshot, SelectionMode};

use crate::availability::AvailabilityCache;
use crate::cooldown::{CooldownGuard, CooldownStatus};
use crate::messages::MessageCatalog;

/// Who issued the routing command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandSource {
    /// An interactive client.
    Client {
        /// The invoking client.
        id: ClientId,
        /// The endpoint the client is currently attached to, absent
        /// right after login.
        origin: Option<EndpointId>,
    },
    /// A non-interactive invoker such as the proxy console.
    Console,
}

/// Answers capability questions about a command source.
pub trait PermissionProvider: Send + Sync {
    /// Whether `source` holds the named capability.
    fn has_capability(&self, source: &CommandSource, node: &str) -> bool;
}

/// Delivers user-facing feedback to a command source.
pub trait Messenger: Send + Sync {
    /// Sends one line of feedback.
    fn send(&self, source: &CommandSource, text: &str);
}

/// Failure reported by the connection transport.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ConnectError {
    /// Host-provided description of why the connection failed.
    pub reason: String,
}

/// Issues connection requests to the embedding proxy.
#[async_trait]
pub trait ConnectionTransport: Send + Sync {
    /// Moves `client` to `endpoint`, resolving once the attempt has
    /// settled on the host side.
    async fn connect(&self, client: &ClientId, endpoint: &EndpointId) -> Result<(), ConnectError>;
}

/// Host-side collaborators the router drives.
pub struct HostServices {
    /// Capability checks for invoking principals.
    pub permissions: Arc<dyn PermissionProvider>,
    /// Per-endpoint load counts for least-load selection.
    pub loads: Arc<dyn LoadSnapshot>,
    /// Connection request issuer.
    pub transport: Arc<dyn ConnectionTransport>,
    /// Feedback channel back to clients.
    pub messenger: Arc<dyn Messenger>,
}

/// Behavioral switches for the routing gates.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Capability node required to invoke routing.
    pub permission_node: String,
    /// Strategy applied over the live candidates.
    pub selection_mode: SelectionMode,
    /// Whether selecting the current attachment re-issues the
    /// connection instead of rejecting.
    pub reconnect_on_command: bool,
    /// Whether the current attachment is dropped from consideration
    /// when other live candidates remain.
    pub cycle_lobbies: bool,
    /// Origins where the routing command is disabled.
    pub blacklist: HashSet<EndpointId>,
}

/// Terminal state of one routing invocation.
///
/// Every variant has already been reported to the invoker through the
/// [`Messenger`] by the time `route` returns; the outcome value exists
/// for callers and tests, not as a success object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The principal lacks the routing capability.
    Denied,
    /// The invoker is not an interactive client.
    NotInteractive,
    /// The client is still cooling down.
    CoolingDown {
        /// Whole seconds left on the window.
        remaining_secs: u64,
    },
    /// Routing is disabled on the client's current origin.
    OriginDisabled,
    /// No live candidate survived the availability filter.
    NoLobbyFound,
    /// The selected endpoint is the client's current attachment and
    /// reconnecting in place is disabled.
    AlreadyConnected,
    /// A connection request was issued.
    Dispatched {
        /// The selected endpoint.
        endpoint: EndpointId,
    },
}

/// Orchestrates one routing decision per client command.
///
/// Gates run strictly in order and each is an early exit: permission,
/// interactive actor, cooldown (read-only), blacklist, group
/// resolution, liveness filter (the only suspension point), optional
/// cycling, selection, reconnect, dispatch. Rejections leave no side
/// effects behind; in particular the cooldown is armed only when a
/// connection request is actually issued.
pub struct Router {
    settings: RouterSettings,
    messages: Arc<MessageCatalog>,
    directory: Arc<GroupDirectory>,
    availability: Arc<AvailabilityCache>,
    cooldown: Arc<CooldownGuard>,
    services: HostServices,
}

impl Router {
    /// Creates a router over the shared stores and host collaborators.
    pub fn new(
        settings: RouterSettings,
        messages: Arc<MessageCatalog>,
        directory: Arc<GroupDirectory>,
        availability: Arc<AvailabilityCache>,
        cooldown: Arc<CooldownGuard>,
        services: HostServices,
    ) -> Self {
        Self {
            settings,
            messages,
            directory,
            availability,
            cooldown,
            services,
        }
    }

    /// Runs one routing invocation for `source`.
    pub async fn route(&self, source: CommandSource) -> RouteOutcome {
        if !self
            .services
            .permissions
            .has_capability(&source, &self.settings.permission_node)
        {
            self.services.messenger.send(&source, &self.messages.no_permission);
            return RouteOutcome::Denied;
        }

        let CommandSource::Client { id: client, origin } = &source else {
            self.services.messenger.send(&source, &self.messages.player_only);
            return RouteOutcome::NotInteractive;
        };

        if let CooldownStatus::Active { remaining_secs } = self.cooldown.check(client) {
            self.services
                .messenger
                .send(&source, &self.messages.render_cooldown(remaining_secs));
            return RouteOutcome::CoolingDown { remaining_secs };
        }

        if let Some(origin) = origin {
            if self.settings.blacklist.contains(origin) {
                self.services
                    .messenger
                    .send(&source, &self.messages.command_disabled);
                return RouteOutcome::OriginDisabled;
            }
        }

        let group = self.directory.resolve(origin.as_ref());
        let live = self.availability.filter_live(group.endpoints()).await;
        if live.is_empty() {
            self.services
                .messenger
                .send(&source, &self.messages.no_lobby_found);
            return RouteOutcome::NoLobbyFound;
        }

        // Cycling: with more than one live candidate, drop the current
        // attachment so repeated commands spread clients out.
        let mut choices = live;
        if self.settings.cycle_lobbies && choices.len() > 1 {
            if let Some(origin) = origin {
                choices.retain(|id| id != origin);
            }
        }

        let Some(target) = select_endpoint(
            &choices,
            self.services.loads.as_ref(),
            self.settings.selection_mode,
        ) else {
            self.services
                .messenger
                .send(&source, &self.messages.no_lobby_found);
            return RouteOutcome::NoLobbyFound;
        };

        if origin.as_ref() == Some(&target) && !self.settings.reconnect_on_command {
            self.services
                .messenger
                .send(&source, &self.messages.already_connected);
            return RouteOutcome::AlreadyConnected;
        }

        self.services.messenger.send(&source, &self.messages.connecting);
        self.cooldown.arm(client);
        self.dispatch(source.clone(), client.clone(), target.clone());
        RouteOutcome::Dispatched { endpoint: target }
    }

    /// Fires the connection request in the background.
    ///
    /// The attempt is not re-validated against the cache and never
    /// retried; a failure is reported back through the messenger and
    /// the armed cooldown stands.
    fn dispatch(&self, source: CommandSource, client: ClientId, endpoint: EndpointId) {
        let transport = Arc::clone(&self.services.transport);
        let messenger = Arc::clone(&self.services.messenger);
        let messages = Arc::clone(&self.messages);
        tokio::spawn(async move {
            if let Err(err) = transport.connect(&client, &endpoint).await {
                tracing::warn!(
                    client = %client,
                    endpoint = %endpoint,
                    error = %err,
                    "connection dispatch failed"
                );
                messenger.send(&source, &messages.render_connect_failed(&err.reason));
            }
        });
    }
}
