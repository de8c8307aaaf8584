//! Input and output surfaces
//!
//! The orchestrator talks to the outside world through two narrow traits:
//!
//! - [`InputSource`]: yields one utterance per call (console line, speech
//!   transcription, scripted test step)
//! - [`OutputSink`]: displays replies and optionally speaks them
//!
//! Output is fire-and-forget from the loop's point of view. A sink that
//! speaks must not make the loop wait for audio to finish; see
//! [`SpeechMirror`].

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::voice::SpeechSynthesizer;

/// Errors raised by input and output collaborators
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Reading input failed
    #[error("Input error: {0}")]
    Input(#[source] std::io::Error),

    /// Writing output failed
    #[error("Output error: {0}")]
    Output(#[source] std::io::Error),

    /// The input has no more utterances (end of file, script exhausted)
    #[error("Input closed")]
    Closed,

    /// A backend (speech, transcription) reported a failure
    #[error("{0}")]
    Backend(String),
}

/// Supplies utterances to the session loop
#[async_trait]
pub trait InputSource: Send {
    /// Wait for the next utterance
    ///
    /// Returns `Ok(None)` when nothing usable arrived this tick (timeout,
    /// unrecognized audio). `timeout` is a hint; the orchestrator enforces
    /// it regardless.
    async fn next_utterance(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, SurfaceError>;
}

/// Receives replies from the session loop
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Display a reply
    fn emit(&self, text: &str) -> Result<(), SurfaceError>;

    /// Speak a reply; sinks without audio ignore this
    fn speak(&self, _text: &str) -> Result<(), SurfaceError> {
        Ok(())
    }

    /// Speak a reply and return once playback has finished
    ///
    /// Used for the last words of a session, where nothing may talk over
    /// them and the process is about to exit.
    async fn speak_and_wait(&self, text: &str) -> Result<(), SurfaceError> {
        self.speak(text)
    }

    /// Acknowledge what the user said (useful when input was transcribed)
    fn heard(&self, _utterance: &str) -> Result<(), SurfaceError> {
        Ok(())
    }
}

// =============================================================================
// Console
// =============================================================================

/// Line-buffered stdin
pub struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
    prompt: String,
    /// Whether the prompt for the pending read was already printed
    prompted: bool,
}

impl ConsoleInput {
    /// Read from stdin, printing `prompt` before each line
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            prompt: prompt.into(),
            prompted: false,
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new("You: ")
    }
}

#[async_trait]
impl InputSource for ConsoleInput {
    async fn next_utterance(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Result<Option<String>, SurfaceError> {
        if !self.prompted {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{}", self.prompt).map_err(SurfaceError::Output)?;
            stdout.flush().map_err(SurfaceError::Output)?;
            self.prompted = true;
        }

        // next_line is cancel safe, so a timed-out read loses nothing
        let line = self.lines.next_line().await.map_err(SurfaceError::Input)?;
        self.prompted = false;

        match line {
            Some(line) => {
                let line = line.trim();
                Ok((!line.is_empty()).then(|| line.to_string()))
            }
            None => Err(SurfaceError::Closed),
        }
    }
}

/// Prints replies to stdout
#[derive(Clone, Debug)]
pub struct ConsoleOutput {
    speaker: String,
    echo_heard: bool,
}

impl ConsoleOutput {
    /// Prefix replies with `speaker`
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            echo_heard: false,
        }
    }

    /// Also print what was heard (for transcribed input)
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_heard = echo;
        self
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new("Parley")
    }
}

impl OutputSink for ConsoleOutput {
    fn emit(&self, text: &str) -> Result<(), SurfaceError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}: {text}", self.speaker).map_err(SurfaceError::Output)
    }

    fn heard(&self, utterance: &str) -> Result<(), SurfaceError> {
        if !self.echo_heard {
            return Ok(());
        }
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "You: {utterance}").map_err(SurfaceError::Output)
    }
}

// =============================================================================
// Speech mirror
// =============================================================================

/// Forwards display to an inner sink and speech to a synthesizer
///
/// Each `speak` call spawns a detached task. The task is never awaited and
/// owns nothing but its copy of the text; synthesis failures are logged and
/// dropped.
pub struct SpeechMirror {
    inner: Box<dyn OutputSink>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl SpeechMirror {
    /// Mirror `inner`'s replies to `synthesizer`
    pub fn new(inner: Box<dyn OutputSink>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { inner, synthesizer }
    }
}

#[async_trait]
impl OutputSink for SpeechMirror {
    fn emit(&self, text: &str) -> Result<(), SurfaceError> {
        self.inner.emit(text)
    }

    fn speak(&self, text: &str) -> Result<(), SurfaceError> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Err(SurfaceError::Backend(
                "speech requires a running tokio runtime".to_string(),
            ));
        };

        let synthesizer = Arc::clone(&self.synthesizer);
        let text = text.to_string();
        runtime.spawn(async move {
            if let Err(e) = synthesizer.speak(&text).await {
                tracing::warn!(error = %e, "Speech synthesis failed");
            }
        });
        Ok(())
    }

    async fn speak_and_wait(&self, text: &str) -> Result<(), SurfaceError> {
        self.synthesizer
            .speak(text)
            .await
            .map_err(|e| SurfaceError::Backend(e.to_string()))
    }

    fn heard(&self, utterance: &str) -> Result<(), SurfaceError> {
        self.inner.heard(utterance)
    }
}

// =============================================================================
// Scripted / in-memory surfaces
// =============================================================================

/// One step of a scripted input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    /// The user says something
    Say(String),
    /// Nothing arrives this tick
    Silence,
    /// The input collaborator fails this tick
    Fail(String),
}

/// Input that replays a fixed script, then reports [`SurfaceError::Closed`]
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedInput {
    /// Replay `steps` in order
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Replay plain utterances in order
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(|l| ScriptStep::Say(l.into())))
    }

    /// Steps not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_utterance(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Result<Option<String>, SurfaceError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Say(text)) => Ok(Some(text)),
            Some(ScriptStep::Silence) => Ok(None),
            Some(ScriptStep::Fail(reason)) => Err(SurfaceError::Backend(reason)),
            None => Err(SurfaceError::Closed),
        }
    }
}

/// What a [`MemoryOutput`] received
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captured {
    /// Displayed replies, in order
    pub emitted: Vec<String>,
    /// Spoken replies, in order
    pub spoken: Vec<String>,
    /// Utterances acknowledged via `heard`
    pub heard: Vec<String>,
}

/// Output sink that records everything; clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput {
    captured: Arc<Mutex<Captured>>,
    fail_emit: bool,
}

impl MemoryOutput {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose `emit` always fails (for error-path tests)
    #[must_use]
    pub fn failing() -> Self {
        Self {
            captured: Arc::default(),
            fail_emit: true,
        }
    }

    /// Copy of everything received so far
    #[must_use]
    pub fn captured(&self) -> Captured {
        self.captured.lock().clone()
    }

    /// Displayed replies so far
    #[must_use]
    pub fn emitted(&self) -> Vec<String> {
        self.captured.lock().emitted.clone()
    }
}

impl OutputSink for MemoryOutput {
    fn emit(&self, text: &str) -> Result<(), SurfaceError> {
        if self.fail_emit {
            return Err(SurfaceError::Output(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "display unavailable",
            )));
        }
        self.captured.lock().emitted.push(text.to_string());
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<(), SurfaceError> {
        self.captured.lock().spoken.push(text.to_string());
        Ok(())
    }

    fn heard(&self, utterance: &str) -> Result<(), SurfaceError> {
        self.captured.lock().heard.push(utterance.to_string());
        Ok(())
    }
}
