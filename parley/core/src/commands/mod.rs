//! Built-in commands
//!
//! The standard registry holds, in registration order:
//!
//! | Command    | Aliases                          |
//! |------------|----------------------------------|
//! | `time`     | `what time`, `current time`      |
//! | `date`     | `what date`, `current date`      |
//! | `datetime` | `date and time`, `what day`      |
//! | `weather`  | (opt-in)                         |
//! | `forecast` | (opt-in)                         |
//! | `exit`     | `quit`, `stop`, `goodbye`        |
//! | `help`     | `commands`, `what can you do`    |
//!
//! `help` is registered last so its text can list everything before it.

pub mod clock;
pub mod weather;

use std::sync::Arc;

use crate::config::WeatherSettings;
use crate::registry::{CommandRegistry, RegistryError};

use self::weather::{CurrentWeather, WeatherClient, WeatherForecast};

/// Reply of the `exit` command
pub const EXIT_REPLY: &str = "Goodbye! Shutting down...";

/// Help text listing `names`
#[must_use]
pub fn help_text<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.into_iter().collect();
    format!(
        "Available commands: {}. You can also ask me questions!",
        names.join(", ")
    )
}

/// Register the clock commands and `exit`, then `help`
///
/// # Errors
///
/// Only fails if a built-in name were blank.
pub fn register_builtins(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    clock::register(registry)?;
    register_exit(registry)?;
    register_help(registry)
}

fn register_exit(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register_fn("exit", ["quit", "stop", "goodbye"], || {
        EXIT_REPLY.to_string()
    })
}

/// (Re-)register `help` with the names currently in the registry
///
/// # Errors
///
/// Only fails if a built-in name were blank.
pub fn register_help(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    let names = registry.names().filter(|name| *name != "help");
    let text = help_text(names.chain(std::iter::once("help")));
    registry.register_fn("help", ["commands", "what can you do"], move || text.clone())
}

/// The registry a session starts with
///
/// # Errors
///
/// Only fails if a built-in name were blank.
pub fn standard_registry(weather: &WeatherSettings) -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    clock::register(&mut registry)?;

    if weather.enabled {
        let client = WeatherClient::new(weather);
        registry.register(
            "weather",
            Arc::new(CurrentWeather(client.clone())),
            Vec::<&str>::new(),
        )?;
        registry.register("forecast", Arc::new(WeatherForecast(client)), Vec::<&str>::new())?;
        tracing::debug!(location = %weather.location, "Weather commands enabled");
    }

    register_exit(&mut registry)?;
    register_help(&mut registry)?;
    Ok(registry)
}
