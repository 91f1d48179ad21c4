use anyhow::{Result, anyhow, bail};
use reqwest::header::HeaderMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

const TRACE_DIR_NAME: &str = "physchat/traces";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceKind {
    UserInput,
    Command,
    AssistantOutput,
    AssistantError,
    HttpRequest,
    HttpResponse,
    HttpError,
}

impl TraceKind {
    fn label(self) -> &'static str {
        match self {
            Self::UserInput => "user.in",
            Self::Command => "cmd.in",
            Self::AssistantOutput => "ai.out",
            Self::AssistantError => "ai.err",
            Self::HttpRequest => "ai.http.in",
            Self::HttpResponse => "ai.http.out",
            Self::HttpError => "ai.http.err",
        }
    }
}

/// Per-session log of questions, answers and provider traffic. Cloning shares
/// the same file.
#[derive(Clone)]
pub struct SessionTrace {
    inner: Arc<TraceInner>,
}

struct TraceInner {
    writer: Mutex<BufWriter<File>>,
    file_path: PathBuf,
    write_failed: AtomicBool,
}

impl SessionTrace {
    pub fn create(session_id: &str) -> Result<Self> {
        Self::create_in_dir(session_id, &resolve_trace_dir_from_env()?)
    }

    pub fn create_in_dir(session_id: &str, trace_dir: &Path) -> Result<Self> {
        fs::create_dir_all(trace_dir).map_err(|err| {
            anyhow!(
                "Failed to create trace directory {}: {err}",
                trace_dir.display()
            )
        })?;

        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        let file_path = trace_dir.join(format!("session-{session_id}-{started}.log"));
        let file = create_trace_file(&file_path)
            .map_err(|err| anyhow!("Failed to create trace file {}: {err}", file_path.display()))?;

        Ok(Self {
            inner: Arc::new(TraceInner {
                writer: Mutex::new(BufWriter::new(file)),
                file_path,
                write_failed: AtomicBool::new(false),
            }),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    pub fn log_user_input(&self, text: &str) {
        self.log_text(TraceKind::UserInput, text);
    }

    pub fn log_command(&self, text: &str) {
        self.log_text(TraceKind::Command, text);
    }

    pub fn log_assistant_output(&self, text: &str) {
        self.log_text(TraceKind::AssistantOutput, text);
    }

    pub fn log_assistant_error(&self, text: &str) {
        self.log_text(TraceKind::AssistantError, text);
    }

    pub fn log_http_request(&self, method: &str, url: &str, headers: &HeaderMap, body: &str) {
        self.log_http(TraceKind::HttpRequest, &format!("{method} {url}"), headers, body);
    }

    pub fn log_http_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        self.log_http(TraceKind::HttpResponse, &format!("HTTP {status}"), headers, body);
    }

    pub fn log_http_error(&self, message: &str) {
        self.log_line(TraceKind::HttpError, message);
    }

    fn log_http(&self, kind: TraceKind, start_line: &str, headers: &HeaderMap, body: &str) {
        self.log_line(kind, start_line);
        for (name, value) in headers {
            let value = value.to_str().unwrap_or("<non-utf8>");
            self.log_line(kind, &format!("{}: {value}", name.as_str()));
        }
        self.log_text(kind, body);
    }

    /// Multi-line text becomes one entry per line; empty text is marked.
    fn log_text(&self, kind: TraceKind, text: &str) {
        if text.is_empty() {
            self.log_line(kind, "<empty>");
        }
        for line in text.lines() {
            self.log_line(kind, line);
        }
    }

    fn log_line(&self, kind: TraceKind, text: &str) {
        let entry = format!("[{}] [{:<11}] {text}\n", current_timestamp(), kind.label());
        let written = match self.inner.writer.lock() {
            Ok(mut writer) => writer
                .write_all(entry.as_bytes())
                .and_then(|()| writer.flush())
                .map_err(|_| "failed to write to trace file"),
            Err(_) => Err("failed to acquire trace writer lock"),
        };
        if let Err(message) = written {
            self.warn_once(message);
        }
    }

    fn warn_once(&self, message: &str) {
        if !self.inner.write_failed.swap(true, Ordering::Relaxed) {
            eprintln!("physchat trace warning: {message}");
        }
    }
}

#[cfg(unix)]
fn create_trace_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_trace_file(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

fn current_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}

pub fn resolve_trace_dir_from_env() -> Result<PathBuf> {
    let xdg_state = env::var("XDG_STATE_HOME").ok();
    let home = dirs::home_dir();
    resolve_trace_dir(xdg_state.as_deref(), home.as_deref())
}

fn resolve_trace_dir(xdg_state_home: Option<&str>, home_dir: Option<&Path>) -> Result<PathBuf> {
    let state_root = match xdg_state_home.map(str::trim) {
        Some("") => bail!("Failed to resolve trace path: XDG_STATE_HOME is set but empty"),
        Some(xdg) => PathBuf::from(xdg),
        None => home_dir
            .ok_or_else(|| anyhow!("Failed to resolve trace path: HOME directory is unavailable"))?
            .join(".local/state"),
    };
    Ok(state_root.join(TRACE_DIR_NAME))
}
