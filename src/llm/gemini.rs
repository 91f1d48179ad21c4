use serde::{Deserialize, Serialize};

use super::provider::{
    AssistantInput, AssistantOutput, LlmError, LlmProvider, LlmResult, TokenUsage,
};
use crate::http::client::HttpClient;
use crate::session::ChatMessage;

const MAX_ERROR_BODY_CHARS: usize = 400;
const SSE_DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url, self.model
        )
    }

    fn build_request(input: &AssistantInput) -> GeminiGenerateRequest {
        GeminiGenerateRequest {
            contents: input.messages.iter().map(GeminiContent::from).collect(),
            system_instruction: input
                .system_instruction
                .as_ref()
                .map(|text| GeminiSystemInstruction {
                    parts: vec![GeminiPart { text: text.clone() }],
                }),
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn stream_generate<F: FnMut(&str) + Send>(
        &self,
        input: AssistantInput,
        mut on_delta: F,
    ) -> LlmResult<AssistantOutput> {
        let payload = Self::build_request(&input);
        let mut stream = StreamAccumulator::default();

        let response = self
            .http
            .post_json_lines(
                &self.endpoint(),
                &[("alt", "sse"), ("key", self.api_key.as_str())],
                &payload,
                |line| stream.push_line(line, &mut on_delta),
            )
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !response.is_success() {
            return Err(LlmError::HttpStatus {
                status: response.status,
                body: truncate_error_body(&response.body),
            });
        }

        stream.finish()
    }
}

fn truncate_error_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[derive(Debug, Default)]
struct StreamAccumulator {
    text: String,
    usage: Option<TokenUsage>,
    error: Option<LlmError>,
}

impl StreamAccumulator {
    fn push_line<F: FnMut(&str)>(&mut self, line: &str, on_delta: &mut F) {
        if self.error.is_some() {
            return;
        }
        let Some(data) = line.strip_prefix(SSE_DATA_PREFIX) else {
            return;
        };
        let data = data.trim();
        if data.is_empty() {
            return;
        }

        let chunk = match serde_json::from_str::<GeminiStreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.error = Some(LlmError::Parse(err.to_string()));
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.error = Some(error.into());
            return;
        }

        if let Some(usage) = chunk.usage_metadata {
            self.usage = Some(usage.into());
        }

        // Only the first candidate is ever shown.
        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return;
        };
        let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                on_delta(&text);
                self.text.push_str(&text);
            }
        }
    }

    fn finish(self) -> LlmResult<AssistantOutput> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(AssistantOutput {
            text: self.text,
            usage: self.usage,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

impl From<&ChatMessage> for GeminiContent {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str(),
            parts: vec![GeminiPart {
                text: message.text.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    error: Option<GeminiStreamError>,
}

/// Failure reported inside a successful event stream, e.g. an overload
/// after some text was already sent.
#[derive(Debug, Deserialize)]
struct GeminiStreamError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    status: Option<String>,
}

impl From<GeminiStreamError> for LlmError {
    fn from(error: GeminiStreamError) -> Self {
        let body = match error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message,
        };
        LlmError::HttpStatus {
            status: error.code,
            body: truncate_error_body(&body),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl From<GeminiUsageMetadata> for TokenUsage {
    fn from(usage: GeminiUsageMetadata) -> Self {
        Self {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        }
    }
}
