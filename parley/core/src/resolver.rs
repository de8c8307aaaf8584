//! Resolver
//!
//! Decides which command (if any) an utterance dispatches to. Matching is
//! case-insensitive on the trimmed input and proceeds in three tiers, first
//! match wins:
//!
//! 1. [`MatchTier::Exact`]: the whole input equals a command name
//! 2. [`MatchTier::Alias`]: some alias occurs inside the input
//! 3. [`MatchTier::Name`]: some command name occurs inside the input
//!
//! Substring containment is deliberate: "what time is it" has to reach the
//! `time` command without a grammar. The price is that a name hidden inside
//! an unrelated word also matches.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{Command, CommandError, CommandRegistry};

/// Which tier produced a match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// Input equals a command name
    Exact,
    /// Input contains an alias
    Alias,
    /// Input contains a command name
    Name,
}

/// A command selected for an utterance, not yet executed
#[derive(Clone)]
pub struct CommandMatch {
    /// Name of the command that will run
    pub command: String,
    /// Tier that selected it
    pub tier: MatchTier,
    /// The alias or name text that matched
    pub matched: String,
    handler: Arc<dyn Command>,
}

impl std::fmt::Debug for CommandMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandMatch")
            .field("command", &self.command)
            .field("tier", &self.tier)
            .field("matched", &self.matched)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Command that ran
    pub command: String,
    /// Tier that selected it
    pub tier: MatchTier,
    /// Reply produced by the handler
    pub reply: String,
}

/// A handler ran and failed
#[derive(Debug, Error)]
#[error("Error executing command '{command}': {source}")]
pub struct ResolveError {
    /// Command whose handler failed
    pub command: String,
    /// Underlying handler error
    #[source]
    pub source: CommandError,
}

/// Resolves utterances against a borrowed registry
///
/// The resolver never mutates the registry.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    registry: &'a CommandRegistry,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `registry`
    #[must_use]
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self { registry }
    }

    /// Select the command an utterance dispatches to, without running it
    #[must_use]
    pub fn find(&self, input: &str) -> Option<CommandMatch> {
        let input = normalize(input);
        if input.is_empty() {
            return None;
        }

        if let Some(handler) = self.registry.lookup_exact(&input) {
            return Some(CommandMatch {
                command: input.clone(),
                tier: MatchTier::Exact,
                matched: input,
                handler,
            });
        }

        for (alias, target) in self.registry.aliases() {
            if !input.contains(alias) {
                continue;
            }
            if let Some(handler) = self.registry.lookup_exact(target) {
                return Some(CommandMatch {
                    command: target.to_string(),
                    tier: MatchTier::Alias,
                    matched: alias.to_string(),
                    handler,
                });
            }
        }

        for name in self.registry.names() {
            if input.contains(name) {
                if let Some(handler) = self.registry.lookup_exact(name) {
                    return Some(CommandMatch {
                        command: name.to_string(),
                        tier: MatchTier::Name,
                        matched: name.to_string(),
                        handler,
                    });
                }
            }
        }

        None
    }

    /// Resolve an utterance and run the selected handler
    ///
    /// Returns `Ok(None)` when nothing matches. Handler panics are caught and
    /// reported as [`CommandError::Panicked`].
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when the selected handler fails.
    pub async fn resolve(&self, input: &str) -> Result<Option<Resolution>, ResolveError> {
        let Some(selected) = self.find(input) else {
            return Ok(None);
        };

        tracing::debug!(
            command = %selected.command,
            tier = ?selected.tier,
            matched = %selected.matched,
            "Command resolved"
        );

        run_handler(&selected).await.map(|reply| {
            Some(Resolution {
                command: selected.command,
                tier: selected.tier,
                reply,
            })
        })
    }
}

async fn run_handler(selected: &CommandMatch) -> Result<String, ResolveError> {
    let outcome = AssertUnwindSafe(selected.handler.execute())
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(CommandError::Panicked(panic_message(panic.as_ref()))));

    outcome.map_err(|source| ResolveError {
        command: selected.command.clone(),
        source,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Normalize an utterance for matching: trimmed and lowercased
#[must_use]
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FnCommand;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register_fn("time", ["what time", "current time"], || "12:00 PM".into())
            .unwrap();
        registry.register_fn("help", ["what can you do"], || "help text".into()).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_exact_tier() {
        let registry = registry();
        let resolution = Resolver::new(&registry).resolve("  TIME ").await.unwrap().unwrap();
        assert_eq!(resolution.reply, "12:00 PM");
        assert_eq!(resolution.tier, MatchTier::Exact);
    }

    #[tokio::test]
    async fn test_alias_tier() {
        let registry = registry();
        let resolution = Resolver::new(&registry)
            .resolve("So, what can you do?")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.command, "help");
        assert_eq!(resolution.tier, MatchTier::Alias);
    }

    #[tokio::test]
    async fn test_name_containment_tier() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("time", Vec::<String>::new(), || "12:00 PM".into()).unwrap();
        registry.register_fn("help", Vec::<String>::new(), || "help text".into()).unwrap();

        let resolution = Resolver::new(&registry)
            .resolve("what time is it")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.reply, "12:00 PM");
        assert_eq!(resolution.tier, MatchTier::Name);
    }

    #[tokio::test]
    async fn test_alias_beats_name_containment() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("date", Vec::<String>::new(), || "date".into()).unwrap();
        registry.register_fn("time", ["update"], || "time".into()).unwrap();

        // "update" contains "date", but the alias tier runs first
        let found = Resolver::new(&registry).find("update me").unwrap();
        assert_eq!(found.command, "time");
        assert_eq!(found.tier, MatchTier::Alias);
    }

    #[tokio::test]
    async fn test_no_match() {
        let registry = registry();
        assert!(Resolver::new(&registry).resolve("hello there").await.unwrap().is_none());
        assert!(Resolver::new(&registry).resolve("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_registered_alias_wins() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("first", ["tell me"], || "1".into()).unwrap();
        registry.register_fn("second", ["me"], || "2".into()).unwrap();

        let found = Resolver::new(&registry).find("tell me").unwrap();
        assert_eq!(found.command, "first");
    }

    #[tokio::test]
    async fn test_handler_error_is_reported() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                "weather",
                Arc::new(FnCommand::new(|| Err(CommandError::failed("no network")))),
                Vec::<String>::new(),
            )
            .unwrap();

        let err = Resolver::new(&registry).resolve("weather").await.unwrap_err();
        assert_eq!(err.to_string(), "Error executing command 'weather': no network");
    }

    #[tokio::test]
    async fn test_handler_panic_is_caught() {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                "crash",
                Arc::new(FnCommand::new(|| panic!("kaboom"))),
                Vec::<String>::new(),
            )
            .unwrap();

        let err = Resolver::new(&registry).resolve("crash").await.unwrap_err();
        assert!(matches!(err.source, CommandError::Panicked(ref msg) if msg == "kaboom"));
    }
}
