//! Parley - Conversational Command Shell
//!
//! Reads typed or spoken utterances, answers commands (time, date, help,
//! weather), chats back through a pattern responder, and exits on "exit",
//! "quit", "stop" or "goodbye".
//!
//! # Usage
//!
//! ```bash
//! # Text mode (default)
//! parley
//!
//! # Voice mode with a speech recognizer configured
//! PARLEY_STT_COMMAND="parley-listen --timeout {timeout}" parley --mode voice
//!
//! # No spoken replies, save the conversation
//! parley --no-voice --save-transcript ~/conversation_log.json
//!
//! # Verbose logging (to stderr)
//! RUST_LOG=debug parley
//! ```
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl-C): stop immediately, without the farewell

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::info;

use parley_core::config::{load_config_from_path, ParleyConfig};
use parley_core::{
    standard_registry, ConfigOverrides, ConsoleInput, ConsoleOutput, InputSource, Orchestrator,
    OutputSink, PatternResponder, RunMode, SessionConfig, SessionSummary, SpeechMirror,
    TranscriberInput, VoiceStack,
};

/// Parley - a conversational command shell
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Interaction mode (voice or text)
    #[arg(short = 'm', long, env = "PARLEY_MODE", value_name = "MODE")]
    mode: Option<RunMode>,

    /// Speech recognition and synthesis language
    #[arg(long, value_name = "LANG")]
    language: Option<String>,

    /// Disable spoken replies and voice input
    #[arg(long)]
    no_voice: bool,

    /// Configuration file path
    #[arg(short = 'c', long, env = "PARLEY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save the conversation to this file on exit
    #[arg(long, value_name = "FILE")]
    save_transcript: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PARLEY_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    /// CLI flags as configuration overrides
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(mode) = self.mode {
            overrides = overrides.with_mode(mode);
        }
        if let Some(ref language) = self.language {
            overrides = overrides.with_language(language.clone());
        }
        if self.no_voice {
            overrides = overrides.with_voice_enabled(false);
        }
        if let Some(ref path) = self.save_transcript {
            overrides = overrides.with_transcript_path(path.clone());
        }
        overrides
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they don't interleave with the conversation.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("parley={level},parley_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration and apply CLI overrides
fn load_settings(args: &Args) -> Result<ParleyConfig> {
    let path = args.config.clone().or_else(parley_core::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    info!(source = %config.source(), "Configuration loaded");
    Ok(config)
}

/// Wire the collaborators for the effective mode
fn build_session(config: &ParleyConfig) -> Result<(Orchestrator, RunMode)> {
    let voice = VoiceStack::probe(&config.voice);
    let mode = voice.effective_mode(config.session.mode);

    let mut session_config = SessionConfig::from_config(config);

    let input: Box<dyn InputSource> = match (mode, voice.listener.clone()) {
        (RunMode::Voice, Some(listener)) => {
            session_config = session_config
                .with_listen_timeout(config.voice.listen_timeout())
                .with_recognition_grace(config.voice.recognition_timeout());
            Box::new(TranscriberInput::new(listener))
        }
        _ => Box::new(ConsoleInput::default()),
    };

    let display = ConsoleOutput::default().with_echo(mode == RunMode::Voice);
    let output: Box<dyn OutputSink> = match voice.speaker {
        Some(speaker) => Box::new(SpeechMirror::new(Box::new(display), speaker)),
        None => {
            session_config.speak_replies = false;
            Box::new(display)
        }
    };

    let registry = standard_registry(&config.weather).context("Failed to register commands")?;
    let responder = PatternResponder::default().with_patterns(config.responses.clone());

    let orchestrator = Orchestrator::new(input, output, session_config)
        .with_registry(registry)
        .with_responder(Box::new(responder));

    Ok((orchestrator, mode))
}

fn print_banner(mode: RunMode) {
    println!("{}", "=".repeat(60));
    println!("Parley - conversational command shell");
    println!("Started at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    match mode {
        RunMode::Voice => println!("Voice mode: speak after each prompt."),
        RunMode::Text => println!("Text mode: type a message and press Enter."),
    }
    println!("Say 'help' for commands, 'exit' to quit.");
    println!("{}", "=".repeat(60));
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("{}", "=".repeat(60));
    println!("Session ended at {}", summary.ended_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Turns: {} ({} commands, {} conversational, {} errors)",
        summary.stats.turns,
        summary.stats.commands,
        summary.stats.fallbacks,
        summary.stats.handler_errors
    );
    println!("Conversation history: {} entries", summary.turns_in_ledger);
    println!("Duration: {}s", summary.duration().num_seconds());
    println!("{}", "=".repeat(60));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_settings(&args)?;
    let (mut session, mode) = build_session(&config)?;
    info!(session_id = %session.id(), mode = %mode, "Session ready");

    print_banner(mode);

    session
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT, stopping");
            } else {
                // No signal handler; never interrupt
                std::future::pending::<()>().await;
            }
        })
        .await;

    let summary = session.shutdown();
    print_summary(&summary);

    // A console read may still be parked on stdin; don't wait for it
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["parley"]).unwrap();
        assert!(!args.no_voice);
        assert_eq!(args.log_level, "warn");
        assert!(args.save_transcript.is_none());
    }

    #[test]
    fn test_flags_become_overrides() {
        let args = Args::try_parse_from([
            "parley",
            "--mode",
            "voice",
            "--language",
            "de-DE",
            "--no-voice",
            "--save-transcript",
            "log.json",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.mode, Some(RunMode::Voice));
        assert_eq!(overrides.language.as_deref(), Some("de-DE"));
        assert_eq!(overrides.voice_enabled, Some(false));
        assert_eq!(overrides.transcript_path, Some(PathBuf::from("log.json")));
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(Args::try_parse_from(["parley", "--mode", "telepathy"]).is_err());
    }

    #[test]
    fn test_invalid_config_fails_startup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[session]\nhistory_limit = 0\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from(["parley", "--config", &path]).unwrap();
        assert!(load_settings(&args).is_err());
    }

    #[tokio::test]
    async fn test_voice_without_recognizer_runs_text() {
        let mut config = ParleyConfig::default();
        config.session.mode = RunMode::Voice;
        config.voice.stt_command = None;
        config.voice.tts_command = None;

        let (session, mode) = build_session(&config).unwrap();
        assert_eq!(mode, RunMode::Text);
        assert!(!session.config().speak_replies);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_voice_input_gets_recognition_grace() {
        let mut config = ParleyConfig::default();
        config.session.mode = RunMode::Voice;
        config.voice.stt_command = Some("true".to_string());
        config.voice.tts_command = None;

        let (session, mode) = build_session(&config).unwrap();
        assert_eq!(mode, RunMode::Voice);
        assert_eq!(
            session.config().listen_timeout,
            Some(std::time::Duration::from_secs(5))
        );
        assert_eq!(
            session.config().recognition_grace,
            std::time::Duration::from_secs(10)
        );
    }
}
