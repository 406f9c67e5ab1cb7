//! Message catalog with placeholder substitution
//!
//! Every broadcast the core issues is rendered from a key -> template lookup
//! so deployments can reword messages without code changes. Placeholders use
//! `{name}` syntax, e.g. `{queue}`, `{current}`, `{max}`, `{seconds}`.

use std::collections::HashMap;

/// Key -> template lookup for all user-visible messages
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    /// Catalog with the built-in default templates
    pub fn with_defaults() -> Self {
        let mut messages = HashMap::new();
        for (key, template) in DEFAULT_MESSAGES {
            messages.insert((*key).to_string(), (*template).to_string());
        }
        Self { messages }
    }

    /// Defaults overlaid with per-key overrides from configuration
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut catalog = Self::with_defaults();
        for (key, template) in overrides {
            catalog.messages.insert(key.clone(), template.clone());
        }
        catalog
    }

    /// Look up a raw template; unknown keys fall back to the key itself so a
    /// missing entry is visible rather than silent.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.messages.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Render a template with `{placeholder}` substitutions
    pub fn render(&self, key: &str, params: &[(&str, String)]) -> String {
        let mut text = self.get(key).to_string();
        for (name, value) in params {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (
        "queue.join.success",
        "You joined the {queue} queue ({current}/{max})",
    ),
    ("queue.join.already-in", "You are already queued"),
    ("queue.join.full", "That queue is full"),
    ("queue.join.not-found", "Queue {queue} does not exist"),
    ("queue.leave.success", "You left the queue"),
    ("queue.leave.not-in", "You are not in any queue"),
    ("queue.group.ready", "Your match is ready!"),
    (
        "queue.group.confirm-prompt",
        "Type /confirm within {seconds}s to accept",
    ),
    ("queue.group.confirm-success", "Participation confirmed"),
    (
        "queue.group.confirm-all",
        "All players confirmed, starting countdown...",
    ),
    ("queue.group.countdown", "Match starts in {seconds}s"),
    ("queue.group.cancelled", "Your match was cancelled"),
    (
        "queue.group.timeout",
        "Confirmation timed out, match cancelled",
    ),
    ("queue.group.launching", "Launching match..."),
    (
        "queue.confirm.none",
        "You have no match awaiting confirmation",
    ),
    (
        "queue.list.entry",
        "{queue}: {current} waiting ({min}-{max} players)",
    ),
    ("queue.shutdown", "Service shutting down, queue cancelled"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let catalog = MessageCatalog::with_defaults();
        let text = catalog.render(
            "queue.join.success",
            &[
                ("queue", "duo".to_string()),
                ("current", "1".to_string()),
                ("max", "2".to_string()),
            ],
        );
        assert_eq!(text, "You joined the duo queue (1/2)");
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let catalog = MessageCatalog::with_defaults();
        assert_eq!(catalog.get("no.such.key"), "no.such.key");
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "queue.leave.success".to_string(),
            "Bye {player}".to_string(),
        );
        let catalog = MessageCatalog::with_overrides(&overrides);
        let text = catalog.render("queue.leave.success", &[("player", "alice".to_string())]);
        assert_eq!(text, "Bye alice");
        // Untouched keys keep their defaults
        assert_eq!(catalog.get("queue.join.full"), "That queue is full");
    }
}
