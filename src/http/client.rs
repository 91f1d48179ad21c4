use super::debug::{
    HttpDebugConfig, redact_header_value, redact_text_body, redact_url, truncate_for_log,
};
use crate::trace::SessionTrace;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: LogSink,
    trace: Option<SessionTrace>,
}

#[derive(Clone)]
enum LogSink {
    Stderr,
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("trace", &self.trace.as_ref().map(SessionTrace::file_path))
            .finish()
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: LogSink::Stderr,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Posts `payload` as JSON. For a 2xx response every body line is passed
    /// to `on_line` as soon as it has fully arrived; error bodies are only
    /// returned. The full body is always returned.
    pub async fn post_json_lines<T, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &T,
        mut on_line: F,
    ) -> Result<HttpResponseData, reqwest::Error>
    where
        T: Serialize + ?Sized + Sync,
        F: FnMut(&str) + Send,
    {
        let body_json = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));

        let request = self.inner.post(url).query(query).json(payload).build()?;
        self.log_request(&request, &body_json);
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                request.url().as_str(),
                request.headers(),
                &body_json,
            );
        }

        let response = match self.inner.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                self.trace_error(&err);
                return Err(err);
            }
        };
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = if response.status().is_success() {
            read_body_lines(response, &mut on_line).await
        } else {
            response.text().await
        };
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                self.trace_error(&err);
                return Err(err);
            }
        };

        self.log_response(status, &headers, &body);
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, &headers, &body);
        }

        Ok(HttpResponseData { status, body })
    }

    fn trace_error(&self, err: &reqwest::Error) {
        if let Some(trace) = &self.trace {
            trace.log_http_error(&err.to_string());
        }
    }

    fn log_request(&self, request: &reqwest::Request, body_json: &str) {
        if !self.debug.enabled {
            return;
        }

        for line in request_log_lines(self.debug, request, body_json) {
            self.log_line(line);
        }
    }

    fn log_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        if !self.debug.enabled {
            return;
        }

        for line in response_log_lines(self.debug, status, headers, body) {
            self.log_line(line);
        }
    }

    fn log_line(&self, line: String) {
        match &self.sink {
            LogSink::Stderr => {
                let mut stderr = io::stderr().lock();
                let _ = writeln!(stderr, "{line}");
            }
            #[cfg(test)]
            LogSink::Buffer(buffer) => {
                if let Ok(mut b) = buffer.lock() {
                    b.push(line);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn with_buffer_sink(
        inner: Client,
        debug: HttpDebugConfig,
    ) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let client = Self {
            inner,
            debug,
            sink: LogSink::Buffer(Arc::clone(&buffer)),
            trace: None,
        };
        (client, buffer)
    }
}

async fn read_body_lines<F: FnMut(&str)>(
    response: reqwest::Response,
    on_line: &mut F,
) -> Result<String, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut pending: Vec<u8> = Vec::new();
    let mut body = String::new();

    while let Some(chunk) = stream.next().await {
        pending.extend_from_slice(&chunk?);
        // A line is only decoded once its newline arrived, so multi-byte
        // characters split across chunks stay intact.
        while let Some(end) = pending.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = pending.drain(..=end).collect();
            emit_line(&raw, &mut body, on_line);
        }
    }

    if !pending.is_empty() {
        emit_line(&pending, &mut body, on_line);
    }

    Ok(body)
}

fn emit_line<F: FnMut(&str)>(raw: &[u8], body: &mut String, on_line: &mut F) {
    let line = String::from_utf8_lossy(raw);
    body.push_str(&line);
    on_line(line.trim_end_matches(['\n', '\r']));
}

fn request_log_lines(
    debug: HttpDebugConfig,
    request: &reqwest::Request,
    body_json: &str,
) -> Vec<String> {
    let url = redact_url(request.url(), debug.redact_secrets);
    let body = redact_text_body(body_json, debug.redact_secrets);
    let body = truncate_for_log(&body, debug.max_body_chars);

    let mut lines = vec![format!("[http-debug] > {} {}", request.method(), url)];
    append_header_lines(&mut lines, '>', request.headers(), debug);
    lines.push("[http-debug] >".to_string());
    append_body_lines(&mut lines, '>', &body);
    lines
}

fn response_log_lines(
    debug: HttpDebugConfig,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let body = redact_text_body(body, debug.redact_secrets);
    let body = truncate_for_log(&body, debug.max_body_chars);

    let mut lines = vec![format!("[http-debug] < HTTP {status}")];
    append_header_lines(&mut lines, '<', headers, debug);
    lines.push("[http-debug] <".to_string());
    append_body_lines(&mut lines, '<', &body);
    lines
}

fn append_header_lines(
    lines: &mut Vec<String>,
    direction: char,
    headers: &HeaderMap,
    debug: HttpDebugConfig,
) {
    for (name, value) in headers {
        lines.push(format!(
            "[http-debug] {direction} {}: {}",
            name.as_str(),
            redact_header_value(name.as_str(), value, debug.redact_secrets)
        ));
    }
}

fn append_body_lines(lines: &mut Vec<String>, direction: char, body: &str) {
    if body.trim().is_empty() {
        lines.push(format!("[http-debug] {direction} <empty body>"));
        return;
    }

    // Event streams separate events with blank lines; they carry no content.
    for line in body.lines().filter(|line| !line.trim().is_empty()) {
        lines.push(format!("[http-debug] {direction} {line}"));
    }
}
