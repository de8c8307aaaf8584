//! Command Registry
//!
//! Holds the bindings from command names to handlers, and from aliases to
//! command names. The registry is populated once at session start with the
//! built-in commands and may be extended at runtime. There is no removal.
//!
//! # Ordering
//!
//! Names and aliases remember the order in which they were first bound.
//! The [`Resolver`](crate::resolver::Resolver) walks them in that order, so
//! when several aliases could match the same utterance the one registered
//! first wins. Re-binding an alias (or re-registering a name) updates the
//! target in place and keeps the original position.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a command handler can report
#[derive(Debug, Error)]
pub enum CommandError {
    /// The handler ran but could not produce a reply
    #[error("{0}")]
    Failed(String),

    /// The handler depends on something that isn't available right now
    #[error("{0} is unavailable")]
    Unavailable(String),

    /// The handler exceeded its own time budget
    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The handler panicked while executing
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl CommandError {
    /// Convenience constructor for [`CommandError::Failed`]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Errors raised while registering commands
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Command names must contain at least one non-whitespace character
    #[error("command name must not be empty")]
    EmptyName,
}

/// A command the shell can run
///
/// Commands take no arguments and produce a reply. Handlers that need
/// external data (HTTP, processes) do their own I/O and are responsible for
/// bounding it with a timeout.
#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command and produce the reply text
    async fn execute(&self) -> Result<String, CommandError>;
}

/// Adapter that turns a closure into a [`Command`]
pub struct FnCommand<F> {
    f: F,
}

impl<F> FnCommand<F>
where
    F: Fn() -> Result<String, CommandError> + Send + Sync + 'static,
{
    /// Wrap a fallible closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Command for FnCommand<F>
where
    F: Fn() -> Result<String, CommandError> + Send + Sync + 'static,
{
    async fn execute(&self) -> Result<String, CommandError> {
        (self.f)()
    }
}

/// A registered command
#[derive(Clone)]
pub struct CommandEntry {
    /// Canonical lowercase name
    pub name: String,
    /// Handler invoked when the command resolves
    pub handler: Arc<dyn Command>,
    /// Aliases supplied when this entry was registered
    pub aliases: Vec<String>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Name → handler and alias → name bindings
#[derive(Default)]
pub struct CommandRegistry {
    entries: HashMap<String, CommandEntry>,
    /// Names in first-registration order
    names: Vec<String>,
    /// Alias → target name
    aliases: HashMap<String, String>,
    /// Aliases in first-binding order
    alias_order: Vec<String>,
}

impl CommandRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under `name` with optional aliases
    ///
    /// Names and aliases are trimmed and lowercased. Registering an existing
    /// name replaces its handler. Binding an existing alias silently points
    /// it at the new name. Empty aliases are skipped, since an empty string
    /// is contained in every utterance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] if `name` is blank.
    pub fn register<I, S>(
        &mut self,
        name: &str,
        handler: Arc<dyn Command>,
        aliases: I,
    ) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = normalize_key(name);
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut bound = Vec::new();
        for alias in aliases {
            let alias = normalize_key(alias.as_ref());
            if alias.is_empty() {
                tracing::warn!(command = %name, "Skipping empty alias");
                continue;
            }
            if let Some(previous) = self.aliases.insert(alias.clone(), name.clone()) {
                if previous != name {
                    tracing::debug!(alias = %alias, from = %previous, to = %name, "Alias rebound");
                }
            } else {
                self.alias_order.push(alias.clone());
            }
            bound.push(alias);
        }

        let entry = CommandEntry {
            name: name.clone(),
            handler,
            aliases: bound,
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            tracing::debug!(command = %name, "Command handler replaced");
        } else {
            self.names.push(name.clone());
        }

        tracing::trace!(command = %name, "Command registered");
        Ok(())
    }

    /// Register an infallible closure as a command
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] if `name` is blank.
    pub fn register_fn<I, S, F>(&mut self, name: &str, aliases: I, f: F) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnCommand::new(move || Ok(f()))), aliases)
    }

    /// Look up the handler registered under exactly `token`
    #[must_use]
    pub fn lookup_exact(&self, token: &str) -> Option<Arc<dyn Command>> {
        self.entries
            .get(&normalize_key(token))
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Get the full entry for a command name
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(&normalize_key(name))
    }

    /// Whether a command with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_key(name))
    }

    /// The command an alias currently points at
    #[must_use]
    pub fn alias_target(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&normalize_key(alias)).map(String::as_str)
    }

    /// Command names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// `(alias, target)` pairs in binding order
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alias_order.iter().filter_map(|alias| {
            self.aliases
                .get(alias)
                .map(|target| (alias.as_str(), target.as_str()))
        })
    }

    /// Number of registered commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no commands are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("names", &self.names)
            .field("aliases", &self.alias_order)
            .finish()
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &'static str) -> Arc<dyn Command> {
        Arc::new(FnCommand::new(move || Ok(text.to_string())))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register("Time", reply("12:00 PM"), ["What Time"]).unwrap();

        let handler = registry.lookup_exact("time").unwrap();
        assert_eq!(handler.execute().await.unwrap(), "12:00 PM");
        assert_eq!(registry.alias_target("what time"), Some("time"));
        assert!(registry.lookup_exact("what time").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_last_write_wins() {
        let mut registry = CommandRegistry::new();
        registry.register("help", reply("first"), Vec::<String>::new()).unwrap();
        registry.register("help", reply("second"), Vec::<String>::new()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["help"]);
        let handler = registry.lookup_exact("help").unwrap();
        assert_eq!(handler.execute().await.unwrap(), "second");
    }

    #[test]
    fn test_alias_rebinding_keeps_position() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("a", ["shared", "only-a"], || "a".into()).unwrap();
        registry.register_fn("b", ["shared"], || "b".into()).unwrap();

        let aliases: Vec<_> = registry.aliases().collect();
        assert_eq!(aliases, vec![("shared", "b"), ("only-a", "a")]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = CommandRegistry::new();
        let err = registry.register_fn("   ", ["x"], String::new).unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
        assert!(registry.is_empty());
        assert!(registry.alias_target("x").is_none());
    }

    #[test]
    fn test_empty_alias_skipped() {
        let mut registry = CommandRegistry::new();
        registry.register_fn("time", ["", "  "], String::new).unwrap();
        assert_eq!(registry.aliases().count(), 0);
        assert!(registry.entry("time").unwrap().aliases.is_empty());
    }

    #[test]
    fn test_command_error_display() {
        assert_eq!(CommandError::failed("boom").to_string(), "boom");
        assert_eq!(
            CommandError::Unavailable("weather service".into()).to_string(),
            "weather service is unavailable"
        );
    }
}
