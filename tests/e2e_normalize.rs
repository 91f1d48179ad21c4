use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn binary_path() -> String {
    std::env::var("CARGO_BIN_EXE_physchat").unwrap_or_else(|_| "target/debug/physchat".to_string())
}

fn normalize_command(config_home: &TempDir) -> Command {
    let mut command = Command::new(binary_path());
    command
        .arg("normalize")
        .current_dir(config_home.path())
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("GEMINI_API_KEY");
    command
}

fn run_with_stdin(mut command: Command, input: &str) -> String {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn physchat normalize");
    child
        .stdin
        .take()
        .expect("child stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for physchat");
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8 stdout")
}

#[test]
fn normalize_reads_stdin_without_api_key() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let output = run_with_stdin(
        normalize_command(&config_home),
        "$$\\int_0^\\infty e^{-x} dx = 1$$\n\\(v_0\\) is \\frac{1}{2} of v_1\n",
    );
    assert_eq!(output, "∫₀^∞ e^{-x} dx = 1\nv₀ is ½ of v₁\n");
}

#[test]
fn normalize_reads_file_and_applies_configured_rules() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let config_dir = config_home.path().join("physchat");
    fs::create_dir_all(&config_dir).expect("create config dir");
    fs::write(
        config_dir.join("config.toml"),
        "[[normalizer.rules]]\npattern = '\\hbar'\nreplacement = \"ħ\"\n",
    )
    .expect("write config");
    let answer = config_home.path().join("answer.md");
    fs::write(&answer, "E = \\hbar\\omega and x^2").expect("write answer");

    let output = normalize_command(&config_home)
        .arg(&answer)
        .output()
        .expect("run physchat");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "E = ħω and x²");
}

#[test]
fn normalize_reports_missing_file() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let output = normalize_command(&config_home)
        .arg(config_home.path().join("missing.md"))
        .output()
        .expect("run physchat");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}
