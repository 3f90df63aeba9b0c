use reqwest;
use serde::Serialize;
use serde_json::Value;

macro_rules! debug_println {
    ($($arg:tt)*) => {
        if std::env::var("ASKBOX_DEBUG").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const MALFORMED_REPLY: &str = "Error: the model returned an unexpected response.";

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Assemble the one-message request body. The effective prompt is followed by
/// the raw question even when they coincide, so pre-made templates can refer
/// to "the user input below" positionally. Without an image the `images`
/// field is omitted from the JSON entirely, never sent as an empty list.
pub fn build_request(
    effective_prompt: &str,
    question: &str,
    model: &str,
    image: Option<String>,
) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: format!("{}\n\n{}", effective_prompt, question),
        }],
        images: image.map(|img| vec![img]),
        stream: false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Success(String),
    MalformedResponse,
    TransportFailure(String),
}

impl CompletionOutcome {
    /// The single string shown to the user, whatever happened.
    pub fn into_display(self) -> String {
        match self {
            CompletionOutcome::Success(text) => text,
            CompletionOutcome::MalformedResponse => MALFORMED_REPLY.to_string(),
            CompletionOutcome::TransportFailure(message) => format!("Error: {}", message),
        }
    }
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn with_config(base_url: String, model: String) -> Self {
        OllamaClient {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One round trip, one outcome. Transport problems and non-2xx statuses
    /// become `TransportFailure`; a body without a string at
    /// `message.content` becomes `MalformedResponse`. Nothing propagates
    /// past this call.
    pub async fn send(&self, request: &ChatRequest) -> CompletionOutcome {
        debug_println!("[Ollama] POST {}/api/chat model={}", self.base_url, request.model);

        let response = match self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return CompletionOutcome::TransportFailure(e.to_string()),
        };

        if !response.status().is_success() {
            return CompletionOutcome::TransportFailure(format!(
                "Ollama API error: {}",
                response.status()
            ));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) => return CompletionOutcome::MalformedResponse,
        };

        match body.pointer("/message/content").and_then(Value::as_str) {
            Some(text) => CompletionOutcome::Success(text.to_string()),
            None => CompletionOutcome::MalformedResponse,
        }
    }
}
