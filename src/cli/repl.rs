use super::commands::{Command, HELP_TEXT, is_command_line, parse_command};
use crate::llm::{
    PHYSICS_TUTOR_PROMPT, WELCOME_MESSAGE,
    provider::{AssistantInput, LlmProvider, TokenUsage},
};
use crate::normalize::{LineNormalizer, TextNormalizer};
use crate::session::{ChatSession, Role};
use crate::trace::SessionTrace;
use anyhow::Result;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const PROMPT: &str = "you> ";
const THINKING: &str = "Thinking...";
const MISSING_KEY_MESSAGE: &str = "Assistant unavailable: missing GEMINI_API_KEY. Configure it in your shell, a .env file, or the config file (example: GEMINI_API_KEY=your_key).";

pub struct AppState<P> {
    pub session_id: String,
    pub llm: Option<P>,
    pub normalizer: TextNormalizer,
    pub normalize_output: bool,
    pub styled: bool,
    pub session: ChatSession,
    pub usage: TokenUsage,
    pub trace: SessionTrace,
}

impl<P: LlmProvider> AppState<P> {
    pub fn new(
        session_id: String,
        llm: Option<P>,
        normalizer: TextNormalizer,
        trace: SessionTrace,
    ) -> Self {
        Self {
            session_id,
            llm,
            normalizer,
            normalize_output: true,
            styled: false,
            session: ChatSession::new(),
            usage: TokenUsage::default(),
            trace,
        }
    }
}

pub async fn run_repl<P, R, W>(state: &mut AppState<P>, input: R, out: &mut W) -> Result<()>
where
    P: LlmProvider + Sync,
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    writeln!(out, "{WELCOME_MESSAGE}")?;
    writeln!(out, "Type /help for commands, exit to quit.")?;

    let mut lines = input.lines();
    loop {
        write_prompt(out, state.styled)?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line.is_empty() {
            continue;
        }

        if is_command_line(line) {
            state.trace.log_command(line);
            handle_command(state, line, out)?;
        } else {
            handle_question(state, line, out).await?;
        }
    }

    out.flush()?;
    Ok(())
}

fn write_prompt<W: Write>(out: &mut W, styled: bool) -> io::Result<()> {
    if styled {
        write!(out, "{}", PROMPT.bold().green())?;
    } else {
        write!(out, "{PROMPT}")?;
    }
    out.flush()
}

fn handle_command<P, W: Write>(state: &mut AppState<P>, line: &str, out: &mut W) -> Result<()> {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(err) => {
            writeln!(out, "{}", err.message())?;
            return Ok(());
        }
    };

    match command {
        Command::Help => writeln!(out, "{HELP_TEXT}")?,
        Command::Clear => {
            state.session.clear();
            writeln!(out, "Conversation cleared.")?;
        }
        Command::History(limit) => {
            let messages = match limit {
                Some(limit) => state.session.recent(limit),
                None => state.session.messages(),
            };
            if messages.is_empty() {
                writeln!(out, "No messages yet.")?;
            }
            for message in messages {
                let (label, text) = match message.role {
                    Role::User => ("you", message.text.clone()),
                    Role::Model if state.normalize_output => {
                        ("assistant", state.normalizer.normalize(&message.text))
                    }
                    Role::Model => ("assistant", message.text.clone()),
                };
                writeln!(out, "{label}: {text}")?;
            }
        }
        Command::Trace => writeln!(out, "Trace file: {}", state.trace.file_path().display())?,
        Command::Normalize(None) => writeln!(
            out,
            "Unicode math rendering is {} ({} rules).",
            on_off(state.normalize_output),
            state.normalizer.table().len()
        )?,
        Command::Normalize(Some(enabled)) => {
            state.normalize_output = enabled;
            writeln!(out, "Unicode math rendering turned {}.", on_off(enabled))?;
        }
        Command::Usage => writeln!(
            out,
            "Tokens used in session {}: {} prompt, {} output, {} total over {} turns.",
            state.session_id,
            state.usage.prompt_tokens,
            state.usage.output_tokens,
            state.usage.total_tokens,
            state.session.turns()
        )?,
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

async fn handle_question<P, W>(state: &mut AppState<P>, line: &str, out: &mut W) -> Result<()>
where
    P: LlmProvider + Sync,
    W: Write + Send,
{
    let Some(provider) = state.llm.as_ref() else {
        writeln!(out, "{MISSING_KEY_MESSAGE}")?;
        return Ok(());
    };

    state.session.push_user(line);
    state.trace.log_user_input(line);

    let input = AssistantInput {
        system_instruction: Some(PHYSICS_TUTOR_PROMPT.to_string()),
        messages: state.session.messages().to_vec(),
    };

    if state.styled {
        write!(out, "{}", THINKING.dim())?;
        out.flush()?;
    }

    let lines = state
        .normalize_output
        .then(|| state.normalizer.line_stream());
    let mut printer = DeltaPrinter::new(out, lines, state.styled);
    let result = provider
        .stream_generate(input, |delta| printer.push(delta))
        .await;
    printer.finish()?;

    match result {
        Ok(output) => {
            state.session.push_model(&output.text);
            state.trace.log_assistant_output(&output.text);
            if let Some(usage) = output.usage {
                state.usage.add(usage);
            }
        }
        Err(err) => {
            state.session.pop_last_user();
            state.trace.log_assistant_error(&err.to_string());
            let message = format!("❌ Error: {err}");
            if state.styled {
                writeln!(out, "{}", message.red())?;
            } else {
                writeln!(out, "{message}")?;
            }
        }
    }

    Ok(())
}

/// Writes streamed deltas as they arrive. The first write failure is kept
/// and later deltas are dropped.
struct DeltaPrinter<'a, W: Write> {
    out: &'a mut W,
    lines: Option<LineNormalizer<'a>>,
    placeholder: bool,
    at_line_start: bool,
    error: Option<io::Error>,
}

impl<'a, W: Write> DeltaPrinter<'a, W> {
    fn new(out: &'a mut W, lines: Option<LineNormalizer<'a>>, placeholder: bool) -> Self {
        Self {
            out,
            lines,
            placeholder,
            at_line_start: true,
            error: None,
        }
    }

    fn push(&mut self, delta: &str) {
        if self.error.is_some() {
            return;
        }

        let text = match self.lines.as_mut() {
            Some(lines) => lines.push(delta),
            None => delta.to_string(),
        };
        if let Err(err) = self.write_text(&text) {
            self.error = Some(err);
        }
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        self.clear_placeholder()?;
        self.out.write_all(text.as_bytes())?;
        self.at_line_start = text.ends_with('\n');
        self.out.flush()
    }

    fn clear_placeholder(&mut self) -> io::Result<()> {
        if self.placeholder {
            self.placeholder = false;
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        if let Some(lines) = self.lines.take() {
            let tail = lines.finish();
            self.write_text(&tail)?;
        }
        self.clear_placeholder()?;
        if !self.at_line_start {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}
