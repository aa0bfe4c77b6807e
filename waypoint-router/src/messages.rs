//! User-facing feedback templates.

use serde::Deserialize;

/// Template catalog for every message the routing engine can emit.
///
/// Placeholders use the `<name>` convention: `cooldown` understands
/// `<time>` and `connect-failed` understands `<reason>`. Rendering is
/// plain substitution; rich markup and localization are left to the
/// embedding host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MessageCatalog {
    /// Sent right before a connection request is issued.
    pub connecting: String,
    /// Rejection for a client already attached to the selected endpoint.
    pub already_connected: String,
    /// Rejection when no live candidate remains.
    pub no_lobby_found: String,
    /// Rejection for non-interactive invokers such as a console.
    pub player_only: String,
    /// Rejection for principals lacking the routing capability.
    pub no_permission: String,
    /// Rejection while the cooldown window is still open.
    pub cooldown: String,
    /// Rejection for origins where routing is disabled.
    pub command_disabled: String,
    /// Asynchronous dispatch-failure report.
    pub connect_failed: String,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            connecting: "Connecting you to the lobby...".to_owned(),
            already_connected: "You are already connected to this lobby!".to_owned(),
            no_lobby_found: "Error: No available lobby servers could be found.".to_owned(),
            player_only: "This command can only be run by a player.".to_owned(),
            no_permission: "You do not have permission to use this command.".to_owned(),
            cooldown: "Please wait <time> seconds before using this again.".to_owned(),
            command_disabled: "You cannot use this command on this server.".to_owned(),
            connect_failed: "Failed to connect: <reason>".to_owned(),
        }
    }
}

impl MessageCatalog {
    /// Renders the cooldown rejection for `remaining_secs`.
    pub fn render_cooldown(&self, remaining_secs: u64) -> String {
        self.cooldown.replace("<time>", &remaining_secs.to_string())
    }

    /// Renders the dispatch-failure report for `reason`.
    pub fn render_connect_failed(&self, reason: &str) -> String {
        self.connect_failed.replace("<reason>", reason)
    }
}
