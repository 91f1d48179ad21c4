#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Clear,
    History(Option<usize>),
    Trace,
    Normalize(Option<bool>),
    Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    message: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }
}

pub(crate) const HELP_TEXT: &str = "Available commands:\n  /help                Show this command list\n  /clear               Forget the conversation so far\n  /history [n]         Show the conversation (or its last n messages)\n  /trace               Show path to the current trace file\n  /normalize [on|off]  Show or toggle rewriting LaTeX math as Unicode\n  /usage               Show tokens used in this session\n  exit | quit          Leave the chat";

pub(crate) fn parse_command(line: &str) -> Result<Command, ParseError> {
    let trimmed = line.trim();
    let Some(command_text) = trimmed.strip_prefix('/') else {
        return Err(ParseError::new("not a command"));
    };

    let mut parts = command_text.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_ascii_lowercase();
    if name.is_empty() {
        return Err(ParseError::new("empty command. Try /help"));
    }
    let rest = parts.next().map(str::trim).unwrap_or("");

    match name.as_str() {
        "help" => expect_no_args(rest, Command::Help, "usage: /help"),
        "clear" => expect_no_args(rest, Command::Clear, "usage: /clear"),
        "history" => parse_history(rest),
        "trace" => expect_no_args(rest, Command::Trace, "usage: /trace"),
        "normalize" => parse_toggle(rest, "usage: /normalize [on|off]").map(Command::Normalize),
        "usage" => expect_no_args(rest, Command::Usage, "usage: /usage"),
        _ => Err(ParseError::new(format!(
            "unknown command '/{name}'. Try /help"
        ))),
    }
}

pub(crate) fn is_command_line(line: &str) -> bool {
    line.trim_start().starts_with('/')
}

fn expect_no_args(rest: &str, command: Command, usage: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::new(usage))
    }
}

fn parse_history(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Ok(Command::History(None));
    }

    let value = rest
        .parse::<usize>()
        .map_err(|_| ParseError::new("usage: /history [n]"))?;
    if value == 0 {
        return Err(ParseError::new("usage: /history [n] (n must be >= 1)"));
    }

    Ok(Command::History(Some(value)))
}

fn parse_toggle(rest: &str, usage: &str) -> Result<Option<bool>, ParseError> {
    match rest {
        "" => Ok(None),
        "on" => Ok(Some(true)),
        "off" => Ok(Some(false)),
        _ => Err(ParseError::new(usage)),
    }
}
