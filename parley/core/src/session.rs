//! Session Orchestrator
//!
//! Drives the conversation loop: acquire an utterance, resolve it to a
//! command or a fallback reply, deliver the reply, and check for an exit
//! phrase.
//!
//! # Design Philosophy
//!
//! The orchestrator owns everything a session mutates (registry, ledger,
//! statistics) and nothing else. Input, output, and speech are
//! collaborators behind [`InputSource`] and [`OutputSink`], so the same loop
//! runs against a console, a speech recognizer, or a scripted test.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──run──▶ Running ──exit phrase / interrupt / input closed──▶ Terminated
//! ```
//!
//! Terminated is final. An exit phrase gets the farewell; an interrupt
//! does not.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::commands;
use crate::config::{ParleyConfig, WeatherSettings};
use crate::ledger::{ConversationLedger, DEFAULT_HISTORY_LIMIT};
use crate::registry::CommandRegistry;
use crate::resolver::{normalize, MatchTier, Resolver};
use crate::responder::{PatternResponder, Responder};
use crate::surface::{InputSource, OutputSink, SurfaceError};
use crate::transcript::{Transcript, TranscriptError};

/// Utterances that end the session, compared against the whole normalized input
pub const EXIT_PHRASES: &[&str] = &["exit", "quit", "stop", "goodbye"];

/// Whether `utterance` is exactly one of the [`EXIT_PHRASES`]
#[must_use]
pub fn is_exit_phrase(utterance: &str) -> bool {
    let normalized = normalize(utterance);
    EXIT_PHRASES.contains(&normalized.as_str())
}

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, loop not started
    Idle,
    /// Loop is processing turns
    Running,
    /// Loop has stopped; no further turns
    Terminated,
}

impl SessionState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Terminated => "Terminated",
        }
    }
}

/// Why the session stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The user said an exit phrase
    ExitPhrase,
    /// The host interrupted the loop (Ctrl-C)
    Interrupted,
    /// The input source has nothing more to give
    InputClosed,
}

/// Session settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Turns retained in the ledger
    pub history_limit: usize,
    /// How long to wait for each utterance (`None` waits forever)
    pub listen_timeout: Option<Duration>,
    /// Time allowed past `listen_timeout` for an utterance already underway
    pub recognition_grace: Duration,
    /// Reply emitted after an exit phrase
    pub farewell: String,
    /// Whether replies are also sent to `OutputSink::speak`
    pub speak_replies: bool,
    /// Where to save the transcript on shutdown
    pub transcript_path: Option<std::path::PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            listen_timeout: None,
            recognition_grace: Duration::ZERO,
            farewell: "Goodbye!".to_string(),
            speak_replies: true,
            transcript_path: None,
        }
    }
}

impl SessionConfig {
    /// Session settings from loaded configuration
    #[must_use]
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            history_limit: config.session.history_limit,
            listen_timeout: None,
            recognition_grace: Duration::ZERO,
            farewell: config.session.farewell.clone(),
            speak_replies: config.voice.enabled && config.voice.speak_replies,
            transcript_path: config.session.transcript_path.clone(),
        }
    }

    /// Bound each listen to `timeout`
    #[must_use]
    pub fn with_listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = Some(timeout);
        self
    }

    /// Let an utterance run `grace` past the listen timeout before giving up
    #[must_use]
    pub fn with_recognition_grace(mut self, grace: Duration) -> Self {
        self.recognition_grace = grace;
        self
    }
}

/// What produced a reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplySource {
    /// A command handler
    Command {
        /// Command that ran
        command: String,
        /// Tier that selected it
        tier: MatchTier,
    },
    /// The fallback responder
    Fallback,
    /// A command handler that failed
    Error {
        /// Command whose handler failed
        command: String,
    },
}

/// Result of processing one utterance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Reply to deliver
    pub reply: String,
    /// What produced it
    pub source: ReplySource,
}

/// Counters kept over a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Utterances processed
    pub turns: u64,
    /// Utterances answered by a command
    pub commands: u64,
    /// Utterances answered by the fallback responder
    pub fallbacks: u64,
    /// Command handlers that failed
    pub handler_errors: u64,
    /// Input collaborator failures
    pub input_errors: u64,
    /// Output collaborator failures
    pub output_errors: u64,
}

/// End-of-session report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session identifier
    pub session_id: Uuid,
    /// When the loop started (or the session was created, if it never ran)
    pub started_at: DateTime<Local>,
    /// When the summary was taken
    pub ended_at: DateTime<Local>,
    /// Turns currently in the ledger
    pub turns_in_ledger: usize,
    /// Counters
    pub stats: SessionStats,
    /// Why the loop stopped, if it has
    pub end_reason: Option<EndReason>,
}

impl SessionSummary {
    /// Wall-clock time between start and summary
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Result of one loop tick, computed before any state changes
enum Tick {
    Interrupted,
    Input(Result<Option<String>, SurfaceError>),
}

/// The conversation loop
pub struct Orchestrator {
    id: Uuid,
    config: SessionConfig,
    registry: CommandRegistry,
    responder: Box<dyn Responder>,
    ledger: ConversationLedger,
    input: Box<dyn InputSource>,
    output: Box<dyn OutputSink>,
    state: SessionState,
    stats: SessionStats,
    started_at: DateTime<Local>,
    end_reason: Option<EndReason>,
}

impl Orchestrator {
    /// Create a session with the standard commands and pattern responder
    pub fn new(
        input: Box<dyn InputSource>,
        output: Box<dyn OutputSink>,
        config: SessionConfig,
    ) -> Self {
        let registry = match commands::standard_registry(&WeatherSettings::default()) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register built-in commands");
                CommandRegistry::new()
            }
        };

        Self {
            id: Uuid::new_v4(),
            ledger: ConversationLedger::new(config.history_limit),
            config,
            registry,
            responder: Box::new(PatternResponder::default()),
            input,
            output,
            state: SessionState::Idle,
            stats: SessionStats::default(),
            started_at: Local::now(),
            end_reason: None,
        }
    }

    /// Replace the command registry
    #[must_use]
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the fallback responder
    #[must_use]
    pub fn with_responder(mut self, responder: Box<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Commands available to this session
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Mutable registry, for adding commands at runtime
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// Conversation so far
    #[must_use]
    pub fn ledger(&self) -> &ConversationLedger {
        &self.ledger
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Session settings
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process one utterance without delivering the reply
    ///
    /// Command replies are not recorded; fallback exchanges are appended
    /// to the ledger. A failing handler produces an error reply and leaves
    /// the ledger untouched. Returns `None` for blank input and once the
    /// session has terminated.
    pub async fn process_input(&mut self, utterance: &str) -> Option<TurnOutcome> {
        if self.state == SessionState::Terminated {
            tracing::debug!("Ignoring input after termination");
            return None;
        }
        if utterance.trim().is_empty() {
            return None;
        }

        self.stats.turns += 1;
        let resolved = Resolver::new(&self.registry).resolve(utterance).await;

        let outcome = match resolved {
            Ok(Some(resolution)) => {
                self.stats.commands += 1;
                TurnOutcome {
                    reply: resolution.reply,
                    source: ReplySource::Command {
                        command: resolution.command,
                        tier: resolution.tier,
                    },
                }
            }
            Ok(None) => {
                let reply = self.responder.respond(utterance);
                self.ledger.record_exchange(utterance, reply.clone());
                self.stats.fallbacks += 1;
                TurnOutcome {
                    reply,
                    source: ReplySource::Fallback,
                }
            }
            Err(e) => {
                tracing::warn!(command = %e.command, error = %e.source, "Command failed");
                self.stats.handler_errors += 1;
                TurnOutcome {
                    reply: e.to_string(),
                    source: ReplySource::Error { command: e.command },
                }
            }
        };

        Some(outcome)
    }

    /// Run until an exit phrase or the input closes
    pub async fn run(&mut self) -> SessionSummary {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until an exit phrase, the input closes, or `interrupt` completes
    ///
    /// The interrupt is honored while waiting for input and while a turn is
    /// being handled. A turn cut short emits nothing, and an interrupted
    /// session skips the farewell.
    pub async fn run_until<F>(&mut self, interrupt: F) -> SessionSummary
    where
        F: Future<Output = ()>,
    {
        if self.state != SessionState::Idle {
            tracing::warn!(state = ?self.state, "Session already started");
            return self.summary();
        }

        let span = tracing::info_span!("session", session_id = %self.id);
        self.run_loop(interrupt).instrument(span).await;
        self.summary()
    }

    async fn run_loop<F>(&mut self, interrupt: F)
    where
        F: Future<Output = ()>,
    {
        self.state = SessionState::Running;
        self.started_at = Local::now();
        tracing::info!("Session started");

        tokio::pin!(interrupt);

        while self.state == SessionState::Running {
            let timeout = self.config.listen_timeout;
            let grace = self.config.recognition_grace;
            let input = &mut self.input;
            let acquire = async move {
                match timeout {
                    Some(limit) => {
                        tokio::time::timeout(limit + grace, input.next_utterance(Some(limit)))
                            .await
                            .unwrap_or(Ok(None))
                    }
                    None => input.next_utterance(None).await,
                }
            };

            let tick = tokio::select! {
                biased;
                () = &mut interrupt => Tick::Interrupted,
                acquired = acquire => Tick::Input(acquired),
            };

            match tick {
                Tick::Interrupted => {
                    tracing::info!("Session interrupted");
                    self.terminate(EndReason::Interrupted);
                }
                Tick::Input(Ok(Some(utterance))) => {
                    let finished = tokio::select! {
                        biased;
                        () = &mut interrupt => false,
                        () = self.handle_utterance(&utterance) => true,
                    };
                    if !finished {
                        tracing::info!("Session interrupted mid-turn");
                        self.terminate(EndReason::Interrupted);
                    }
                }
                Tick::Input(Ok(None)) => {
                    tracing::trace!("No input this tick");
                }
                Tick::Input(Err(SurfaceError::Closed)) => {
                    tracing::info!("Input closed");
                    self.terminate(EndReason::InputClosed);
                }
                Tick::Input(Err(e)) => {
                    tracing::warn!(error = %e, "Input failed, continuing");
                    self.stats.input_errors += 1;
                }
            }
        }
    }

    async fn handle_utterance(&mut self, utterance: &str) {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return;
        }

        if let Err(e) = self.output.heard(utterance) {
            tracing::warn!(error = %e, "Failed to acknowledge input");
            self.stats.output_errors += 1;
        }

        let Some(outcome) = self.process_input(utterance).await else {
            return;
        };
        tracing::debug!(source = ?outcome.source, "Turn processed");

        if is_exit_phrase(utterance) {
            // Last words are spoken in order and to the end
            self.deliver_and_wait(&outcome.reply).await;
            let farewell = self.config.farewell.clone();
            self.deliver_and_wait(&farewell).await;
            self.terminate(EndReason::ExitPhrase);
        } else {
            self.deliver(&outcome.reply);
        }
    }

    /// Display and (optionally) speak a reply; failures are logged and dropped
    fn deliver(&mut self, text: &str) {
        if let Err(e) = self.output.emit(text) {
            tracing::warn!(error = %e, "Failed to display reply");
            self.stats.output_errors += 1;
        }
        if self.config.speak_replies {
            if let Err(e) = self.output.speak(text) {
                tracing::warn!(error = %e, "Failed to speak reply");
                self.stats.output_errors += 1;
            }
        }
    }

    async fn deliver_and_wait(&mut self, text: &str) {
        if let Err(e) = self.output.emit(text) {
            tracing::warn!(error = %e, "Failed to display reply");
            self.stats.output_errors += 1;
        }
        if self.config.speak_replies {
            if let Err(e) = self.output.speak_and_wait(text).await {
                tracing::warn!(error = %e, "Failed to speak reply");
                self.stats.output_errors += 1;
            }
        }
    }

    /// Move to [`SessionState::Terminated`]; later calls keep the first reason
    pub fn terminate(&mut self, reason: EndReason) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        self.end_reason = Some(reason);
        tracing::info!(reason = ?reason, "Session terminated");
    }

    /// Snapshot the counters and timing
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            started_at: self.started_at,
            ended_at: Local::now(),
            turns_in_ledger: self.ledger.len(),
            stats: self.stats,
            end_reason: self.end_reason,
        }
    }

    /// Persist the ledger to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be written.
    pub fn save_transcript(&self, path: &Path) -> Result<(), TranscriptError> {
        Transcript::from_ledger(&self.ledger).save(path)
    }

    /// Log statistics and save the transcript if one is configured
    ///
    /// Transcript failures are logged, not returned.
    pub fn shutdown(&mut self) -> SessionSummary {
        if self.state != SessionState::Terminated {
            self.terminate(EndReason::Interrupted);
        }

        let summary = self.summary();
        tracing::info!(
            session_id = %summary.session_id,
            turns = summary.stats.turns,
            commands = summary.stats.commands,
            fallbacks = summary.stats.fallbacks,
            errors = summary.stats.handler_errors,
            ledger = summary.turns_in_ledger,
            duration_secs = summary.duration().num_seconds(),
            "Session statistics"
        );

        if let Some(path) = self.config.transcript_path.clone() {
            if let Err(e) = self.save_transcript(&path) {
                tracing::warn!(error = %e, "Failed to save transcript");
            }
        }

        summary
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("ledger_len", &self.ledger.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
