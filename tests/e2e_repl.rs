#![cfg(unix)]

use expectrl::{Eof, Regex, Session};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

const EXPECT_TIMEOUT: Duration = Duration::from_secs(4);

fn binary_path() -> String {
    std::env::var("CARGO_BIN_EXE_physchat").unwrap_or_else(|_| "target/debug/physchat".to_string())
}

fn spawn_without_key() -> (Session, TempDir, TempDir) {
    let config_home = tempfile::tempdir().expect("create XDG_CONFIG_HOME tempdir");
    let state_home = tempfile::tempdir().expect("create XDG_STATE_HOME tempdir");

    let mut command = Command::new(binary_path());
    command
        .current_dir(config_home.path())
        .env("NO_COLOR", "1")
        .env("XDG_CONFIG_HOME", config_home.path())
        .env("XDG_STATE_HOME", state_home.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_MODEL")
        .env_remove("GEMINI_BASE_URL");

    let mut session = Session::spawn(command).expect("spawn physchat in PTY");
    session.set_expect_timeout(Some(EXPECT_TIMEOUT));
    (session, config_home, state_home)
}

#[test]
fn repl_starts_with_welcome_and_prompt() {
    let (mut p, _config_home, _state_home) = spawn_without_key();
    p.expect(Regex("Welcome to the Physics Assistant! How can I help you today\\?"))
        .expect("welcome line");
    p.expect(Regex("you> ")).expect("startup prompt");
    p.send_line("exit").expect("exit line");
    p.expect(Eof).expect("process exits");
}

#[test]
fn question_without_key_prints_setup_guidance() {
    let (mut p, _config_home, _state_home) = spawn_without_key();
    p.expect(Regex("you> ")).expect("startup prompt");
    p.send_line("what is momentum?").expect("question");
    p.expect(Regex(
        "Assistant unavailable: missing GEMINI_API_KEY\\. Configure it in your shell",
    ))
    .expect("missing key guidance");
    p.expect(Regex("you> ")).expect("prompt persists");
    p.send_line("quit").expect("quit line");
    p.expect(Eof).expect("process exits");
}

#[test]
fn help_lists_commands() {
    let (mut p, _config_home, _state_home) = spawn_without_key();
    p.expect(Regex("you> ")).expect("startup prompt");
    p.send_line("/help").expect("help command");
    p.expect(Regex("/normalize \\[on\\|off\\]")).expect("normalize entry");
    p.expect(Regex("you> ")).expect("prompt persists");
    p.send_line("/normalize off").expect("toggle");
    p.expect(Regex("Unicode math rendering turned off\\."))
        .expect("toggle confirmation");
    p.send_line("exit").expect("exit line");
    p.expect(Eof).expect("process exits");
}

#[test]
fn trace_command_points_into_state_home() {
    let (mut p, _config_home, state_home) = spawn_without_key();
    p.expect(Regex("you> ")).expect("startup prompt");
    p.send_line("/trace").expect("trace command");
    let expected = format!(
        "Trace file: {}/physchat/traces/session-",
        state_home.path().display()
    );
    p.expect(expected.as_str()).expect("trace path");
    p.send_line("exit").expect("exit line");
    p.expect(Eof).expect("process exits");
}

#[test]
fn invalid_config_fails_at_startup() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let config_dir = config_home.path().join("physchat");
    std::fs::create_dir_all(&config_dir).expect("create config dir");
    std::fs::write(
        config_dir.join("config.toml"),
        "[[normalizer.rules]]\npattern = \"\"\nreplacement = \"x\"\n",
    )
    .expect("write config");

    let output = Command::new(binary_path())
        .current_dir(config_home.path())
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("GEMINI_API_KEY")
        .output()
        .expect("run physchat");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("normalizer.rules[0]: pattern must not be empty"),
        "stderr:\n{stderr}"
    );
}
