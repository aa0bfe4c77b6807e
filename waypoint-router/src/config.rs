//! Deployment configuration for the routing engine.
//!
//! One TOML file, loaded at startup; a changed file takes effect on
//! restart. Every field has a default, so a partial file loads.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use waypoint_core::domain::{CandidateGroup, DirectoryError, EndpointId, GroupDirectory};
use waypoint_core::selection::SelectionMode;

use crate::availability::AvailabilitySettings;
use crate::messages::MessageCatalog;
use crate::router::RouterSettings;

/// Name of the group every unmapped origin falls back to.
pub const DEFAULT_GROUP: &str = "default";

/// Errors raised while loading or validating the deployment file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The group table does not define the fallback group.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// The `[commands]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CommandsSection {
    /// Alternative command names the host should register.
    pub aliases: Vec<String>,
    /// Capability node required to invoke routing.
    pub permission: String,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            aliases: vec!["hub".to_owned(), "spawn".to_owned()],
            permission: "waypoint.use".to_owned(),
        }
    }
}

/// The `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SettingsSection {
    /// Re-issue the connection when the client is already attached to
    /// the selected endpoint.
    pub reconnect_on_command: bool,
    /// Seconds between routing actions per client; zero disables the
    /// cooldown.
    pub command_cooldown: u64,
    /// Selection strategy name: `LEAST_LOAD` or `RANDOM`,
    /// case-insensitive. Unknown names fall back to `RANDOM`.
    pub selection_mode: String,
    /// Origins where the routing command is disabled.
    pub blacklist: Vec<String>,
    /// Drop the current attachment from consideration when more than
    /// one live candidate remains.
    pub cycle_lobbies: bool,
    /// Probe candidates before connecting.
    pub ping_before_connect: bool,
    /// Seconds between wholesale liveness-cache clears.
    pub ping_cache_duration: u64,
    /// Upper bound on a single probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            reconnect_on_command: true,
            command_cooldown: 3,
            selection_mode: "LEAST_LOAD".to_owned(),
            blacklist: vec!["auth".to_owned()],
            cycle_lobbies: false,
            ping_before_connect: true,
            ping_cache_duration: 60,
            probe_timeout_ms: 2500,
        }
    }
}

/// Root of the deployment file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Command registration surface.
    pub commands: CommandsSection,
    /// Behavioral switches.
    pub settings: SettingsSection,
    /// Group name to ordered endpoint list.
    pub groups: HashMap<String, Vec<String>>,
    /// Origin endpoint to group name.
    pub group_mappings: HashMap<String, String>,
    /// Endpoint to socket address, for the TCP prober.
    pub endpoints: HashMap<String, SocketAddr>,
    /// Feedback templates.
    pub messages: MessageCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commands: CommandsSection::default(),
            settings: SettingsSection::default(),
            groups: HashMap::from([(
                DEFAULT_GROUP.to_owned(),
                vec!["lobby1".to_owned(), "lobby2".to_owned()],
            )]),
            group_mappings: HashMap::new(),
            endpoints: HashMap::new(),
            messages: MessageCatalog::default(),
        }
    }
}

impl Config {
    /// Loads and parses the deployment file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Builds the origin-to-group directory, validating that the
    /// fallback group is defined. A missing fallback group is fatal at
    /// startup so resolution can stay total at request time.
    pub fn build_directory(&self) -> Result<GroupDirectory, ConfigError> {
        let groups = self
            .groups
            .iter()
            .map(|(name, endpoints)| {
                CandidateGroup::new(
                    name.clone(),
                    endpoints.iter().map(|id| EndpointId::from(id.as_str())).collect(),
                )
            })
            .collect();
        let mappings = self
            .group_mappings
            .iter()
            .map(|(origin, group)| (EndpointId::from(origin.as_str()), group.clone()))
            .collect();
        Ok(GroupDirectory::new(groups, mappings, DEFAULT_GROUP)?)
    }

    /// Availability tuning derived from `[settings]`.
    pub fn availability_settings(&self) -> AvailabilitySettings {
        AvailabilitySettings {
            enabled: self.settings.ping_before_connect,
            probe_timeout: Duration::from_millis(self.settings.probe_timeout_ms),
            clear_period: Duration::from_secs(self.settings.ping_cache_duration),
        }
    }

    /// Router switches derived from `[commands]` and `[settings]`.
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            permission_node: self.commands.permission.clone(),
            selection_mode: self.selection_mode(),
            reconnect_on_command: self.settings.reconnect_on_command,
            cycle_lobbies: self.settings.cycle_lobbies,
            blacklist: self.blacklist(),
        }
    }

    /// Cooldown window between routing actions; zero disables.
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.settings.command_cooldown)
    }

    /// Endpoint address table for the TCP prober.
    pub fn probe_addresses(&self) -> HashMap<EndpointId, SocketAddr> {
        self.endpoints
            .iter()
            .map(|(id, addr)| (EndpointId::from(id.as_str()), *addr))
            .collect()
    }

    fn blacklist(&self) -> HashSet<EndpointId> {
        self.settings
            .blacklist
            .iter()
            .map(|id| EndpointId::from(id.as_str()))
            .collect()
    }

    fn selection_mode(&self) -> SelectionMode {
        match SelectionMode::parse(&self.settings.selection_mode) {
            Some(mode) => mode,
            None => {
                tracing::warn!(
                    mode = %self.settings.selection_mode,
                    "unknown selection mode, falling back to RANDOM"
                );
                SelectionMode::Random
            }
        }
    }
}
