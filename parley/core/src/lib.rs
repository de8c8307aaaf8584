//! Parley Core - Command Resolution and Session Orchestration
//!
//! This crate is the engine behind the `parley` shell. It takes utterances
//! (typed or transcribed), dispatches them to named commands, falls back to
//! a pattern responder when nothing matches, and keeps a bounded record of
//! the conversation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   utterance   ┌──────────────────────────────────────┐
//! │ InputSource  │──────────────▶│            Orchestrator              │
//! │ console/STT  │               │                                      │
//! └──────────────┘               │  Resolver ──hit──▶ Command handler   │
//!                                │     │                                │
//!                                │    miss                              │
//!                                │     ▼                                │
//!                                │  Responder ──▶ ConversationLedger    │
//! ┌──────────────┐     reply     │                                      │
//! │ OutputSink   │◀──────────────│  exit phrase? ──▶ farewell, stop     │
//! │ console/TTS  │               └──────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Orchestrator`]: the conversation loop
//! - [`CommandRegistry`]: name and alias bindings
//! - [`Resolver`]: three-tier utterance matching
//! - [`PatternResponder`]: canned replies for everything else
//! - [`ConversationLedger`]: the last N fallback turns
//!
//! # Quick Start
//!
//! ```ignore
//! use parley_core::{ConsoleInput, ConsoleOutput, Orchestrator, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut session = Orchestrator::new(
//!         Box::new(ConsoleInput::default()),
//!         Box::new(ConsoleOutput::default()),
//!         SessionConfig::default(),
//!     );
//!     let summary = session.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     println!("{} turns", summary.stats.turns);
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`registry`]: commands, handlers, aliases
//! - [`resolver`]: matching an utterance to a command
//! - [`responder`]: fallback replies
//! - [`ledger`]: bounded conversation history
//! - [`transcript`]: persisting the ledger as JSON
//! - [`surface`]: input and output collaborators
//! - [`voice`]: external speech programs
//! - [`commands`]: built-in commands (clock, weather, help, exit)
//! - [`config`]: TOML/env/CLI configuration
//! - [`session`]: the orchestrator

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod ledger;
pub mod registry;
pub mod resolver;
pub mod responder;
pub mod session;
pub mod surface;
pub mod transcript;
pub mod voice;

// Re-exports for convenience
pub use commands::{help_text, register_builtins, standard_registry, EXIT_REPLY};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ParleyConfig, ParleyToml, RunMode, TemperatureUnit,
};
pub use ledger::{ConversationLedger, Role, Turn, DEFAULT_HISTORY_LIMIT};
pub use registry::{Command, CommandError, CommandRegistry, FnCommand, RegistryError};
pub use resolver::{MatchTier, Resolution, ResolveError, Resolver};
pub use responder::{PatternResponder, Responder};
pub use session::{
    is_exit_phrase, EndReason, Orchestrator, ReplySource, SessionConfig, SessionState,
    SessionStats, SessionSummary, TurnOutcome, EXIT_PHRASES,
};
pub use surface::{
    ConsoleInput, ConsoleOutput, InputSource, MemoryOutput, OutputSink, ScriptStep,
    ScriptedInput, SpeechMirror, SurfaceError,
};
pub use transcript::{Transcript, TranscriptError};
pub use voice::{SpeechSynthesizer, Transcriber, TranscriberInput, VoiceError, VoiceStack};
