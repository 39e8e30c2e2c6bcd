//! Gateway for the Google Gemini streaming API.
//!
//! Requests go to `POST {base}/models/{model}:streamGenerateContent?alt=sse`.
//! The system message becomes `systemInstruction`, assistant turns use the
//! `model` role, and each SSE chunk's first candidate contributes the
//! concatenation of its text parts.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use zeno_core::llm::provider::{FragmentStream, ProviderGateway};
use zeno_types::llm::{GenerationRequest, LlmError, MessageRole};

use self::types::{
    GeminiChunk, GeminiContent, GeminiPart, GeminiRequest, GeminiSystemInstruction,
    GenerationConfig,
};
use super::sse::{Decoded, fragment_stream};

const PROVIDER_NAME: &str = "gemini";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Adapter for Gemini models.
///
/// Does not derive `Debug`; the API key stays behind `SecretString`.
pub struct GeminiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl GeminiGateway {
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

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:streamGenerateContent", self.base_url)
    }
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
    }
}

/// Translate a normalized request into the Gemini body.
pub fn build_request(request: &GenerationRequest) -> GeminiRequest {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        match message.role {
            MessageRole::System => system.push(text_part(&message.content)),
            MessageRole::User => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![text_part(&message.content)],
            }),
            MessageRole::Assistant => contents.push(GeminiContent {
                role: Some("model".to_string()),
                parts: vec![text_part(&message.content)],
            }),
        }
    }

    GeminiRequest {
        contents,
        system_instruction: (!system.is_empty())
            .then_some(GeminiSystemInstruction { parts: system }),
        generation_config: GenerationConfig {
            max_output_tokens: request.max_output_tokens,
        },
    }
}

/// Decode one SSE `data:` payload.
pub(crate) fn decode_event(data: &str) -> Decoded {
    let data = data.trim();
    if data.is_empty() {
        return Decoded::Skip;
    }

    let chunk: GeminiChunk = match serde_json::from_str(data) {
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

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Decoded::Fail(LlmError::Provider {
                message: format!("prompt blocked: {reason}"),
            });
        }
        return Decoded::Skip;
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        Decoded::Skip
    } else {
        Decoded::Text(text)
    }
}

impl ProviderGateway for GeminiGateway {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn stream(&self, request: GenerationRequest) -> FragmentStream {
        let body = build_request(&request);
        let mut builder = self
            .client
            .post(self.endpoint(&request.model))
            .query(&[("alt", "sse")])
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key.expose_secret());
        }

        debug!(provider = PROVIDER_NAME, model = %request.model, "opening content stream");
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
            model: "gemini-1.5-flash".to_string(),
            messages: vec![
                NormalizedMessage::system("You are ZenoAi."),
                NormalizedMessage::user("hi"),
                NormalizedMessage::assistant("hello"),
                NormalizedMessage::user("again"),
            ],
            max_output_tokens: 512,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn request_body_maps_roles_and_system() {
        let json = serde_json::to_value(build_request(&request())).unwrap();
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are ZenoAi."
        );
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "again");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn no_system_instruction_when_absent() {
        let mut req = request();
        req.messages.remove(0);
        let json = serde_json::to_value(build_request(&req)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(decode_event(data), Decoded::Text("Hello".to_string()));
    }

    #[test]
    fn finish_only_chunk_is_skipped() {
        let data = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":3}}"#;
        assert_eq!(decode_event(data), Decoded::Skip);
        assert_eq!(decode_event("not json"), Decoded::Skip);
    }

    #[test]
    fn blocked_prompt_fails() {
        let data = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(
            decode_event(data),
            Decoded::Fail(LlmError::Provider { .. })
        ));
    }

    #[test]
    fn endpoint_accepts_prefixed_model() {
        let gateway = GeminiGateway::new("http://h/v1beta/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            gateway.endpoint("models/gemini-pro"),
            "http://h/v1beta/models/gemini-pro:streamGenerateContent"
        );
    }

    #[tokio::test]
    async fn streams_from_server() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Bon\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"jour\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        let (url, server) = serve_once(sse_response(body)).await;

        let gateway = GeminiGateway::new(
            url,
            Some(SecretString::from("g-key".to_string())),
            Duration::from_secs(2),
        )
        .unwrap();
        let fragments: Vec<String> = gateway
            .stream(request())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Bon".to_string(), "jour".to_string()]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /models/gemini-1.5-flash:streamGenerateContent?alt=sse"));
        assert!(raw.to_lowercase().contains("x-goog-api-key: g-key"));
    }
}
