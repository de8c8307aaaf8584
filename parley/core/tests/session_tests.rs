//! Session integration tests
//!
//! Drive the public API end to end with scripted input and a recording sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use parley_core::{
    Command, CommandError, CommandRegistry, EndReason, MatchTier, MemoryOutput, Orchestrator,
    PatternResponder, ReplySource, Resolver, Role, ScriptStep, ScriptedInput, SessionConfig,
    SessionState, Transcript,
};

fn orchestrator(steps: Vec<ScriptStep>, output: &MemoryOutput) -> Orchestrator {
    Orchestrator::new(
        Box::new(ScriptedInput::new(steps)),
        Box::new(output.clone()),
        SessionConfig::default(),
    )
}

fn say(text: &str) -> ScriptStep {
    ScriptStep::Say(text.to_string())
}

struct Failing;

struct Slow;

#[async_trait]
impl Command for Slow {
    async fn execute(&self) -> Result<String, CommandError> {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok("slow reply".to_string())
    }
}

#[async_trait]
impl Command for Failing {
    async fn execute(&self) -> Result<String, CommandError> {
        Err(CommandError::Unavailable("weather service".into()))
    }
}

#[tokio::test]
async fn test_name_containment_reaches_time() {
    let mut registry = CommandRegistry::new();
    registry
        .register_fn("time", Vec::<&str>::new(), || "12:00 PM".to_string())
        .unwrap();
    registry
        .register_fn("help", Vec::<&str>::new(), || "help text".to_string())
        .unwrap();

    let resolution = Resolver::new(&registry)
        .resolve("what time is it")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolution.reply, "12:00 PM");
    assert_eq!(resolution.tier, MatchTier::Name);
}

#[tokio::test]
async fn test_every_name_resolves_exactly() {
    let registry = parley_core::standard_registry(&Default::default()).unwrap();
    let names: Vec<String> = registry.names().map(str::to_string).collect();

    for name in names {
        let found = Resolver::new(&registry).find(&name).unwrap();
        assert_eq!(found.command, name);
        assert_eq!(found.tier, MatchTier::Exact);
    }
}

#[tokio::test]
async fn test_fallback_with_empty_registry() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![], &output).with_registry(CommandRegistry::new());

    let outcome = session.process_input("hello there").await.unwrap();

    assert_eq!(outcome.reply, "Hello! How can I assist you today?");
    assert_eq!(outcome.source, ReplySource::Fallback);

    let turns = session.ledger().snapshot();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role(), Role::User);
    assert_eq!(turns[0].content(), "hello there");
    assert_eq!(turns[1].role(), Role::Assistant);
}

#[tokio::test]
async fn test_eleven_fallback_turns_keep_last_ten() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![], &output).with_registry(CommandRegistry::new());

    for i in 1..=11 {
        session.process_input(&format!("remark {i}")).await.unwrap();
    }

    // 22 appends, bound of 10: the last five exchanges survive
    let contents: Vec<String> = session
        .ledger()
        .snapshot()
        .iter()
        .map(|t| t.content().to_string())
        .collect();
    assert_eq!(contents.len(), 10);
    assert_eq!(contents[0], "remark 7");
    assert_eq!(contents[8], "remark 11");

    session.process_input("one more").await.unwrap();
    assert_eq!(session.ledger().len(), 10);
}

#[tokio::test]
async fn test_please_exit_now_does_not_terminate() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![say("please exit now")], &output);

    let summary = session.run().await;

    // A command answers by containment, but only the exhausted script ends
    // the session, and without a farewell
    assert_eq!(summary.end_reason, Some(EndReason::InputClosed));
    assert_eq!(summary.stats.commands, 1);
    assert_eq!(output.emitted().len(), 1);
}

#[tokio::test]
async fn test_exit_command_by_containment_is_not_an_exit_phrase() {
    let mut registry = CommandRegistry::new();
    parley_core::register_builtins(&mut registry).unwrap();
    let resolution = Resolver::new(&registry).find("please exit").unwrap();
    assert_eq!(resolution.command, "exit");
    assert!(!parley_core::is_exit_phrase("please exit"));
}

#[tokio::test]
async fn test_exact_exit_phrase_terminates_with_farewell() {
    let output = MemoryOutput::new();
    let config = SessionConfig {
        farewell: "See you soon.".to_string(),
        ..SessionConfig::default()
    };
    let mut session = Orchestrator::new(
        Box::new(ScriptedInput::lines(["hello", "  STOP ", "thanks"])),
        Box::new(output.clone()),
        config,
    );

    let summary = session.run().await;

    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(summary.end_reason, Some(EndReason::ExitPhrase));
    assert_eq!(
        output.emitted(),
        vec![
            "Hello! How can I assist you today?",
            "Goodbye! Shutting down...",
            "See you soon.",
        ]
    );
    assert_eq!(summary.stats.turns, 2);
}

#[tokio::test]
async fn test_reregistration_last_write_wins() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![], &output);

    session
        .registry_mut()
        .register_fn("help", Vec::<&str>::new(), || "first".to_string())
        .unwrap();
    session
        .registry_mut()
        .register_fn("help", Vec::<&str>::new(), || "second".to_string())
        .unwrap();

    let outcome = session.process_input("help").await.unwrap();
    assert_eq!(outcome.reply, "second");
    assert_eq!(
        session.registry().names().filter(|n| *n == "help").count(),
        1
    );
}

#[tokio::test]
async fn test_handler_error_becomes_reply_and_loop_continues() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![say("weather please"), say("hello"), say("quit")], &output);
    session
        .registry_mut()
        .register("weather", Arc::new(Failing), Vec::<&str>::new())
        .unwrap();

    let summary = session.run().await;
    let emitted = output.emitted();

    assert_eq!(
        emitted[0],
        "Error executing command 'weather': weather service is unavailable"
    );
    assert_eq!(emitted[1], "Hello! How can I assist you today?");
    assert_eq!(summary.stats.handler_errors, 1);
    assert_eq!(summary.end_reason, Some(EndReason::ExitPhrase));
    // The failed command left no trace in the ledger
    assert_eq!(session.ledger().len(), 2);
}

#[tokio::test]
async fn test_panicking_handler_does_not_crash_session() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![say("explode"), say("exit")], &output);
    session
        .registry_mut()
        .register_fn("explode", Vec::<&str>::new(), || panic!("boom"))
        .unwrap();

    let summary = session.run().await;

    assert!(output.emitted()[0].starts_with("Error executing command 'explode'"));
    assert_eq!(summary.end_reason, Some(EndReason::ExitPhrase));
}

#[tokio::test]
async fn test_silence_and_blank_lines_are_skipped() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(
        vec![ScriptStep::Silence, say("   "), say("goodbye")],
        &output,
    );

    let summary = session.run().await;

    assert_eq!(summary.stats.turns, 1);
    assert_eq!(output.captured().heard, vec!["goodbye"]);
}

#[tokio::test]
async fn test_custom_patterns_come_after_defaults() {
    let output = MemoryOutput::new();
    let responder = PatternResponder::default()
        .with_patterns([("good morning".to_string(), "Morning!".to_string())]);
    let mut session = orchestrator(vec![], &output).with_responder(Box::new(responder));

    let outcome = session.process_input("Good morning").await.unwrap();
    assert_eq!(outcome.reply, "Morning!");
}

#[tokio::test]
async fn test_transcript_round_trip_after_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conversation_log.json");

    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![say("who created you"), say("exit")], &output);
    session.run().await;
    session.save_transcript(&path).unwrap();

    let transcript = Transcript::load(&path).unwrap();
    assert_eq!(transcript.conversation.len(), 2);
    assert_eq!(transcript.conversation[0].content(), "who created you");
    assert_eq!(
        transcript.conversation[1].content(),
        "I was created by the Parley developers."
    );
}

#[tokio::test]
async fn test_interrupt_cuts_a_slow_turn_short() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![say("slow"), say("hello")], &output);
    session
        .registry_mut()
        .register("slow", Arc::new(Slow), Vec::<&str>::new())
        .unwrap();

    let interrupt = async {
        let _ =
            tokio::time::timeout(Duration::from_millis(20), std::future::pending::<()>()).await;
    };

    let started = Instant::now();
    let summary = session.run_until(interrupt).await;

    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(summary.end_reason, Some(EndReason::Interrupted));
    assert!(output.emitted().is_empty());
    assert!(output.captured().spoken.is_empty());
}

#[tokio::test]
async fn test_know_is_not_a_command() {
    let output = MemoryOutput::new();
    let mut session = orchestrator(vec![], &output);

    let outcome = session
        .process_input("do you know who created you")
        .await
        .unwrap();

    assert_eq!(outcome.source, ReplySource::Fallback);
    assert_eq!(outcome.reply, "I was created by the Parley developers.");
}
