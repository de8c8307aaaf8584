//! Voice I/O
//!
//! Speech in both directions is delegated to external programs so the shell
//! carries no audio stack of its own:
//!
//! - [`CommandSynthesizer`] runs a text-to-speech program with the reply
//!   as its last argument (`espeak` by default)
//! - [`CommandTranscriber`] runs a speech-to-text program once per listen
//!   and takes its stdout as the utterance
//!
//! The listen timeout handed to a transcriber is how long to wait for speech
//! to start. The program is only killed once the recognition grace period on
//! top of that has also passed, so a long phrase still gets recognized.
//!
//! Argument templates may contain `{rate}`, `{language}` and `{timeout}`
//! placeholders, substituted per invocation.
//!
//! # Availability
//!
//! [`VoiceStack::probe`] locates both programs on `PATH` at startup. A
//! missing program disables that direction; the CLI then falls back to
//! text input or silent output.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::{RunMode, VoiceSettings};
use crate::surface::{InputSource, SurfaceError};

/// Upper bound for a single synthesis run
const SPEAK_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the external speech programs
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The program isn't installed
    #[error("{0} not found on PATH")]
    NotFound(String),

    /// The program couldn't be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The program ran and reported failure
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        /// Program name
        program: String,
        /// Exit status as reported by the OS
        status: String,
        /// Trimmed stderr output
        stderr: String,
    },

    /// The program didn't finish in time and was killed
    #[error("{program} timed out after {timeout:?}")]
    TimedOut {
        /// Program name
        program: String,
        /// Time allowed
        timeout: Duration,
    },

    /// Voice is disabled or not configured
    #[error("{0}")]
    Unavailable(String),
}

/// Speaks text aloud
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, returning once playback finishes
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;
}

/// Captures one spoken utterance
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Listen once; `Ok(None)` when nothing intelligible was heard
    async fn transcribe(&self, timeout: Option<Duration>) -> Result<Option<String>, VoiceError>;
}

/// A program plus its argument template, parsed from a command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalProgram {
    program: String,
    args: Vec<String>,
}

impl ExternalProgram {
    /// Split a command line on whitespace; `None` if it's blank
    #[must_use]
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Program name as configured
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Find the program on `PATH`
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::NotFound`] if it isn't installed.
    pub fn locate(&self) -> Result<PathBuf, VoiceError> {
        which::which(&self.program).map_err(|_| VoiceError::NotFound(self.program.clone()))
    }

    /// Arguments with placeholders substituted
    fn render_args(&self, vars: &[(&str, String)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }

    /// Run to completion, killing the child if `timeout` elapses
    async fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<std::process::Output, VoiceError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::TimedOut {
                program: self.program.clone(),
                timeout,
            })?
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VoiceError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Text-to-speech through an external program
#[derive(Clone, Debug)]
pub struct CommandSynthesizer {
    program: ExternalProgram,
    rate: u32,
    language: String,
}

impl CommandSynthesizer {
    /// Speak with `program` at `rate` words per minute
    #[must_use]
    pub fn new(program: ExternalProgram, rate: u32, language: impl Into<String>) -> Self {
        Self {
            program,
            rate,
            language: language.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let mut args = self.program.render_args(&[
            ("rate", self.rate.to_string()),
            ("language", self.language.clone()),
        ]);
        args.push(text.to_string());

        tracing::trace!(program = %self.program.program(), chars = text.len(), "Speaking");
        self.program.run(args, SPEAK_TIMEOUT).await.map(|_| ())
    }
}

/// Speech-to-text through an external program
#[derive(Clone, Debug)]
pub struct CommandTranscriber {
    program: ExternalProgram,
    language: String,
    default_timeout: Duration,
    recognition_grace: Duration,
}

impl CommandTranscriber {
    /// Listen with `program`; `default_timeout` applies when no timeout is given
    ///
    /// `recognition_grace` is added to the listen timeout to get the deadline
    /// after which the program is killed.
    #[must_use]
    pub fn new(
        program: ExternalProgram,
        language: impl Into<String>,
        default_timeout: Duration,
        recognition_grace: Duration,
    ) -> Self {
        Self {
            program,
            language: language.into(),
            default_timeout,
            recognition_grace,
        }
    }

    /// Hard deadline for one run listening for `timeout`
    #[must_use]
    pub fn deadline(&self, timeout: Duration) -> Duration {
        timeout + self.recognition_grace
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, timeout: Option<Duration>) -> Result<Option<String>, VoiceError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let args = self.program.render_args(&[
            ("language", self.language.clone()),
            ("timeout", timeout.as_secs().to_string()),
        ]);

        tracing::debug!(program = %self.program.program(), ?timeout, "Listening");
        match self.program.run(args, self.deadline(timeout)).await {
            Ok(output) => {
                let heard = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!heard.is_empty()).then_some(heard))
            }
            // Silence is not an error
            Err(VoiceError::TimedOut { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// [`InputSource`] backed by a [`Transcriber`]
pub struct TranscriberInput {
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriberInput {
    /// Listen through `transcriber`
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl InputSource for TranscriberInput {
    async fn next_utterance(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, SurfaceError> {
        self.transcriber
            .transcribe(timeout)
            .await
            .map_err(|e| SurfaceError::Backend(e.to_string()))
    }
}

/// The speech programs that were found at startup
#[derive(Clone, Default)]
pub struct VoiceStack {
    /// Speech-to-text, if available
    pub listener: Option<Arc<dyn Transcriber>>,
    /// Text-to-speech, if available
    pub speaker: Option<Arc<dyn SpeechSynthesizer>>,
}

impl VoiceStack {
    /// No voice in either direction
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Locate the configured programs and build whatever is available
    ///
    /// Missing programs are logged and leave that direction disabled.
    #[must_use]
    pub fn probe(settings: &VoiceSettings) -> Self {
        if !settings.enabled {
            tracing::info!("Voice disabled by configuration");
            return Self::disabled();
        }

        let listener = settings
            .stt_command
            .as_deref()
            .and_then(ExternalProgram::parse)
            .and_then(|program| match program.locate() {
                Ok(path) => {
                    tracing::debug!(path = %path.display(), "Speech recognizer found");
                    Some(Arc::new(CommandTranscriber::new(
                        program,
                        settings.language.clone(),
                        settings.listen_timeout(),
                        settings.recognition_timeout(),
                    )) as Arc<dyn Transcriber>)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Speech recognition unavailable");
                    None
                }
            });

        let speaker = if settings.speak_replies {
            settings
                .tts_command
                .as_deref()
                .and_then(ExternalProgram::parse)
                .and_then(|program| match program.locate() {
                    Ok(path) => {
                        tracing::debug!(path = %path.display(), "Speech synthesizer found");
                        Some(Arc::new(CommandSynthesizer::new(
                            program,
                            settings.rate,
                            settings.language.clone(),
                        )) as Arc<dyn SpeechSynthesizer>)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Speech output unavailable");
                        None
                    }
                })
        } else {
            None
        };

        Self { listener, speaker }
    }

    /// Whether spoken input is possible
    #[must_use]
    pub fn can_listen(&self) -> bool {
        self.listener.is_some()
    }

    /// Whether spoken output is possible
    #[must_use]
    pub fn can_speak(&self) -> bool {
        self.speaker.is_some()
    }

    /// The mode the session will actually run in
    ///
    /// Voice mode without a listener degrades to text mode.
    #[must_use]
    pub fn effective_mode(&self, requested: RunMode) -> RunMode {
        match requested {
            RunMode::Voice if !self.can_listen() => {
                tracing::warn!("Voice input unavailable, falling back to text mode");
                RunMode::Text
            }
            mode => mode,
        }
    }
}

impl std::fmt::Debug for VoiceStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceStack")
            .field("can_listen", &self.can_listen())
            .field("can_speak", &self.can_speak())
            .finish()
    }
}
