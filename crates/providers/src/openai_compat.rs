//! OpenAI-compatible provider implementation.
//!
//! Works with every gateway in the catalog: OpenRouter, OpenAI, Gemini's
//! OpenAI endpoint, Anthropic's compatibility layer, Ollama, DeepSeek,
//! Moonshot and Copilot.
//!
//! Supports:
//! - Chat completions (non-streaming)
//! - Tool use / function calling
//! - Inline images, audio and files in user turns
//! - Reasoning text and citation annotations in responses
//! - Model listing

use async_trait::async_trait;
use scribe_core::error::ProviderError;
use scribe_core::message::{AudioFormat, Content, ContentPart, Role, ToolCall, Turn};
use scribe_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// An OpenAI-compatible LLM provider.
///
/// Every gateway exposes an OpenAI-style `/chat/completions` endpoint;
/// they differ only in base URL, credentials, extra headers and the way
/// inline audio has to be encoded.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    headers: Vec<(String, String)>,
    audio_format: AudioFormat,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("audio_format", &self.audio_format)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("{name}: failed to create HTTP client: {e}")))?;

        Ok(Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            headers: Vec::new(),
            audio_format: AudioFormat::OpenAi,
            client,
        })
    }

    /// Send an extra header with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_audio_format(mut self, audio_format: AudioFormat) -> Self {
        self.audio_format = audio_format;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.headers
            .iter()
            .fold(builder.bearer_auth(&self.api_key), |b, (k, v)| b.header(k, v))
    }

    /// Convert our turns to OpenAI API format.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: if t.content.is_empty() && !t.tool_calls.is_empty() {
                    None
                } else {
                    Some(Self::to_api_content(&t.content))
                },
                tool_calls: if t.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        t.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: t.tool_call_id.clone(),
                reasoning: None,
                reasoning_content: None,
                annotations: None,
            })
            .collect()
    }

    fn to_api_content(content: &Content) -> ApiContent {
        match content {
            Content::Text(text) => ApiContent::Text(text.clone()),
            Content::Parts(parts) => ApiContent::Parts(parts.iter().map(Self::to_api_part).collect()),
        }
    }

    fn to_api_part(part: &ContentPart) -> ApiContentPart {
        match part {
            ContentPart::Text { text } => ApiContentPart::Text { text: text.clone() },
            ContentPart::Image { url, .. } => ApiContentPart::ImageUrl {
                image_url: ApiImageUrl { url: url.clone() },
            },
            ContentPart::File { path, text } => ApiContentPart::Text {
                text: format!("<FILE path=\"{path}\">\n{text}\n</FILE>"),
            },
            ContentPart::Audio {
                extension,
                data,
                format: AudioFormat::OpenAi,
                ..
            } => ApiContentPart::InputAudio {
                input_audio: ApiInputAudio {
                    data: data.clone(),
                    format: extension.clone(),
                },
            },
            ContentPart::Audio {
                mime_type,
                data,
                format: AudioFormat::Gemini,
                ..
            } => ApiContentPart::ImageUrl {
                image_url: ApiImageUrl {
                    url: format!("data:{mime_type};base64,{data}"),
                },
            },
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }
        if request.include_reasoning {
            body["include_reasoning"] = serde_json::json!(true);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(effort) = request.reasoning_effort {
            body["reasoning_effort"] = serde_json::json!(effort.to_string());
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }

    /// Convert one returned choice into an assistant turn.
    fn from_api_message(message: ApiMessage) -> Turn {
        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let text = match message.content {
            Some(ApiContent::Text(text)) => text,
            Some(ApiContent::Parts(parts)) => parts
                .into_iter()
                .filter_map(|p| match p {
                    ApiContentPart::Text { text } => Some(text),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            None => String::new(),
        };

        let mut turn = Turn::assistant(text);
        turn.tool_calls = tool_calls;
        turn.reasoning = message
            .reasoning
            .or(message.reasoning_content)
            .filter(|r| !r.is_empty());
        if let Some(annotations) = message.annotations {
            turn.metadata.insert("annotations".into(), annotations);
        }
        turn
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(format!(
                "{}: invalid API key or insufficient permissions",
                self.name
            )));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn audio_format(&self) -> AudioFormat {
        self.audio_format
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            turns = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = self.check_status(response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if api_response.choices.is_empty() {
            return Err(ProviderError::InvalidResponse("No choices in response".into()));
        }

        let messages = api_response
            .choices
            .into_iter()
            .map(|c| Self::from_api_message(c.message))
            .collect();

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            messages,
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = self.check_status(response).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let models = body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ApiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning_content: Option<String>,
    #[serde(default, skip_serializing)]
    annotations: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
    InputAudio { input_audio: ApiInputAudio },
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiInputAudio {
    data: String,
    format: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::json;

    fn provider(base_url: &str) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", base_url, "sk-test").unwrap()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn base_url_is_trimmed() {
        let p = provider("https://generativelanguage.googleapis.com/v1beta/openai/");
        assert_eq!(p.base_url(), "https://generativelanguage.googleapis.com/v1beta/openai");
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", provider("http://localhost"));
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn message_conversion() {
        let call = ToolCall::new("call_1", "search_web", &json!({"query": "berlin"}));
        let turns = vec![
            Turn::system("You are helpful"),
            Turn::user("Hello"),
            Turn::assistant_tool_calls(vec![call]),
            Turn::tool_result("call_1", "R1"),
        ];
        let api = serde_json::to_value(OpenAiCompatProvider::to_api_messages(&turns)).unwrap();

        assert_eq!(api[0], json!({"role": "system", "content": "You are helpful"}));
        assert_eq!(api[1], json!({"role": "user", "content": "Hello"}));
        assert_eq!(
            api[2],
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search_web", "arguments": "{\"query\":\"berlin\"}"}
                }]
            })
        );
        assert_eq!(api[3], json!({"role": "tool", "content": "R1", "tool_call_id": "call_1"}));
    }

    #[test]
    fn content_parts_are_encoded_per_audio_format() {
        let parts = vec![
            ContentPart::text("look: "),
            ContentPart::Image {
                source: "https://x/cat.png".into(),
                url: "https://x/cat.png".into(),
                alt: None,
            },
            ContentPart::File {
                path: "notes.txt".into(),
                text: "hello".into(),
            },
            ContentPart::Audio {
                path: "a.mp3".into(),
                mime_type: "audio/mpeg".into(),
                extension: "mp3".into(),
                data: "AAAA".into(),
                format: AudioFormat::OpenAi,
            },
            ContentPart::Audio {
                path: "a.mp3".into(),
                mime_type: "audio/mpeg".into(),
                extension: "mp3".into(),
                data: "AAAA".into(),
                format: AudioFormat::Gemini,
            },
        ];
        let api = serde_json::to_value(OpenAiCompatProvider::to_api_messages(&[Turn::user(
            Content::Parts(parts),
        )]))
        .unwrap();
        let content = &api[0]["content"];

        assert_eq!(content[0], json!({"type": "text", "text": "look: "}));
        assert_eq!(content[1], json!({"type": "image_url", "image_url": {"url": "https://x/cat.png"}}));
        assert_eq!(
            content[2],
            json!({"type": "text", "text": "<FILE path=\"notes.txt\">\nhello\n</FILE>"})
        );
        assert_eq!(
            content[3],
            json!({"type": "input_audio", "input_audio": {"data": "AAAA", "format": "mp3"}})
        );
        assert_eq!(
            content[4],
            json!({"type": "image_url", "image_url": {"url": "data:audio/mpeg;base64,AAAA"}})
        );
    }

    #[test]
    fn request_body_only_sets_present_options() {
        let mut request = ProviderRequest::new("m", vec![Turn::user("hi")]);
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("include_reasoning").is_none());
        assert!(body.get("temperature").is_none());

        request.tools = vec![ToolDefinition {
            name: "shell".into(),
            description: "Run a shell command".into(),
            parameters: json!({"type": "object"}),
        }];
        request.include_reasoning = true;
        request.max_tokens = Some(100);
        request.reasoning_effort = Some(ReasoningEffort::High);
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "shell");
        assert_eq!(body["include_reasoning"], true);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["reasoning_effort"], "high");
    }

    #[test]
    fn response_message_carries_reasoning_and_annotations() {
        let message: ApiMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": "Berlin.",
            "reasoning_content": "thinking hard",
            "annotations": [{"type": "url_citation"}]
        }))
        .unwrap();
        let turn = OpenAiCompatProvider::from_api_message(message);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text(), "Berlin.");
        assert_eq!(turn.reasoning.as_deref(), Some("thinking hard"));
        assert_eq!(turn.metadata["annotations"][0]["type"], "url_citation");
    }

    #[test]
    fn response_tool_calls_without_content() {
        let message: ApiMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"type": "function", "function": {"name": "t", "arguments": "{}"}}]
        }))
        .unwrap();
        let turn = OpenAiCompatProvider::from_api_message(message);
        assert!(turn.requests_tools());
        assert_eq!(turn.tool_calls[0].id, "");
        assert!(turn.content.is_empty());
    }

    #[tokio::test]
    async fn complete_returns_every_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                axum::Json(json!({
                    "model": "served-model",
                    "choices": [
                        {"message": {"role": "assistant", "content": "one"}},
                        {"message": {"role": "assistant", "content": "two"}}
                    ],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                }))
            }),
        );
        let p = provider(&serve(app).await);
        let response = p
            .complete(ProviderRequest::new("m", vec![Turn::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.model, "served-model");
        assert_eq!(response.messages.len(), 2);
        assert_eq!(response.messages[1].text(), "two");
        assert_eq!(response.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let app = Router::new()
            .route("/limited/chat/completions", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .route("/denied/chat/completions", post(|| async { StatusCode::UNAUTHORIZED }))
            .route(
                "/broken/chat/completions",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let base = serve(app).await;
        let request = || ProviderRequest::new("m", vec![Turn::user("hi")]);

        let err = provider(&format!("{base}/limited")).complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));

        let err = provider(&format!("{base}/denied")).complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));

        let err = provider(&format!("{base}/broken")).complete(request()).await.unwrap_err();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_models_reads_ids() {
        let app = Router::new().route(
            "/models",
            get(|| async { axum::Json(json!({"data": [{"id": "a"}, {"id": "b"}]})) }),
        );
        let p = provider(&serve(app).await);
        assert_eq!(p.list_models().await.unwrap(), vec!["a", "b"]);
    }
}
