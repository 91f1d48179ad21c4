pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod normalize;
pub mod session;
pub mod trace;

use anyhow::{Result, anyhow};
use cli::{AppState, CliArgs, CliCommand, run_repl};
use config::AppConfig;
use http::client::HttpClient;
use http::debug::HttpDebugConfig;
use llm::gemini::GeminiProvider;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use trace::SessionTrace;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = AppConfig::load_with_path(args.config.as_deref())?;

    match &args.command {
        Some(CliCommand::Normalize { file }) => run_normalize(&config, file.as_deref()),
        Some(CliCommand::Chat) | None => run_chat(&args, &config).await,
    }
}

async fn run_chat(args: &CliArgs, config: &AppConfig) -> Result<()> {
    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;
    let http = HttpClient::new(
        reqwest::Client::new(),
        HttpDebugConfig::from_verbose(args.verbose),
    )
    .with_trace(trace.clone());
    let llm = GeminiProvider::new(
        http,
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    )
    .ok();

    let mut app_state = AppState::new(session_id, llm, config.text_normalizer(), trace);
    app_state.normalize_output = config.normalizer.enabled && !args.raw;
    app_state.styled =
        !args.no_color && std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    run_repl(&mut app_state, stdin, &mut stdout).await
}

fn run_normalize(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let input = match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| anyhow!("Failed to read {}: {err}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| anyhow!("Failed to read stdin: {err}"))?;
            text
        }
    };

    let normalizer = config.text_normalizer();
    let mut stdout = io::stdout().lock();
    stdout.write_all(normalizer.normalize(&input).as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
