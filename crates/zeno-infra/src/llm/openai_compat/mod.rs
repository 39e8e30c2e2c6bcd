//! Gateway for chat-completions style APIs.
//!
//! Serves OpenRouter, OpenAI and any self-hosted server exposing
//! `POST {base}/chat/completions` with `stream: true`. Each SSE event
//! carries a chunk whose first choice holds an incremental `delta.content`;
//! the literal `[DONE]` ends the stream.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use zeno_core::llm::provider::{FragmentStream, ProviderGateway};
use zeno_types::llm::{GenerationRequest, LlmError};

use self::types::{ChatCompletionChunk, ChatCompletionMessage, ChatCompletionRequest};
use super::sse::{Decoded, fragment_stream};

const PROVIDER_NAME: &str = "openai_compatible";

/// Adapter for chat-completions style providers.
///
/// Does not derive `Debug`; the API key stays behind `SecretString`.
pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleGateway {
    /// Build a gateway against `base_url` (for example
    /// `https://openrouter.ai/api/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        connect_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Translate a normalized request into the chat-completions body.
pub fn build_request(request: &GenerationRequest) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| ChatCompletionMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect(),
        max_tokens: request.max_output_tokens,
        stream: true,
    }
}

/// Decode one SSE `data:` payload.
pub(crate) fn decode_event(data: &str) -> Decoded {
    let data = data.trim();
    if data.is_empty() {
        return Decoded::Skip;
    }
    if data == "[DONE]" {
        return Decoded::Done;
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(provider = PROVIDER_NAME, error = %e, "skipping malformed chunk");
            return Decoded::Skip;
        }
    };

    if let Some(error) = chunk.error {
        let message = match error.code {
            Some(code) => format!("{} (code {code})", error.message),
            None => error.message,
        };
        return Decoded::Fail(LlmError::Provider { message });
    }

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
    {
        Some(text) if !text.is_empty() => Decoded::Text(text),
        _ => Decoded::Skip,
    }
}

impl ProviderGateway for OpenAiCompatibleGateway {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn stream(&self, request: GenerationRequest) -> FragmentStream {
        let body = build_request(&request);
        let mut builder = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        debug!(provider = PROVIDER_NAME, model = %request.model, "opening completion stream");
        fragment_stream(builder, request.timeout, PROVIDER_NAME, decode_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::sse::{serve_once, sse_response};
    use futures_util::StreamExt;
    use zeno_types::llm::NormalizedMessage;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "meta-llama/llama-3-8b-instruct:free".to_string(),
            messages: vec![
                NormalizedMessage::system("be brief"),
                NormalizedMessage::user("hi"),
                NormalizedMessage::assistant("hello"),
                NormalizedMessage::user("how are you"),
            ],
            max_output_tokens: 50,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn request_body_shape() {
        let json = serde_json::to_value(build_request(&request())).unwrap();
        assert_eq!(json["model"], "meta-llama/llama-3-8b-instruct:free");
        assert_eq!(json["max_tokens"], 50);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"][3]["content"], "how are you");
    }

    #[test]
    fn decodes_delta_content() {
        let data = r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(decode_event(data), Decoded::Text("Hel".to_string()));
    }

    #[test]
    fn role_only_and_empty_deltas_are_skipped() {
        assert_eq!(
            decode_event(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Decoded::Skip
        );
        assert_eq!(
            decode_event(r#"{"choices":[{"delta":{"content":""}}]}"#),
            Decoded::Skip
        );
        assert_eq!(decode_event(r#"{"choices":[]}"#), Decoded::Skip);
    }

    #[test]
    fn done_marker_and_garbage() {
        assert_eq!(decode_event("[DONE]"), Decoded::Done);
        assert_eq!(decode_event("{not json"), Decoded::Skip);
        assert_eq!(decode_event("  "), Decoded::Skip);
    }

    #[test]
    fn error_object_fails_the_stream() {
        let data = r#"{"error":{"message":"Provider returned error","code":502}}"#;
        match decode_event(data) {
            Decoded::Fail(LlmError::Provider { message }) => {
                assert!(message.contains("Provider returned error"));
                assert!(message.contains("502"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streams_from_server() {
        let body = concat!(
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {broken\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (url, server) = serve_once(sse_response(body)).await;

        let gateway = OpenAiCompatibleGateway::new(
            format!("{url}/api/v1/"),
            Some(SecretString::from("sk-test".to_string())),
            Duration::from_secs(2),
        )
        .unwrap();
        let fragments: Vec<String> = gateway
            .stream(request())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hello".to_string(), " world".to_string()]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/v1/chat/completions"));
        assert!(raw.to_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn upstream_status_is_reported() {
        let (url, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 8\r\nconnection: close\r\n\r\nupstream"
                .to_string(),
        )
        .await;
        let gateway = OpenAiCompatibleGateway::new(url, None, Duration::from_secs(2)).unwrap();
        let first = gateway.stream(request()).next().await.unwrap();
        assert_eq!(
            first.unwrap_err(),
            LlmError::Status {
                status: 503,
                body: "upstream".to_string()
            }
        );
    }
}
