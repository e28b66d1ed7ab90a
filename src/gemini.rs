//! Gemini API client and the model invoker seam
//!
//! Converts conversation history into a `generateContent` request with the
//! tool registry bound as function declarations, and converts the reply back
//! into one assistant message.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::models::{Message, Role, ToolCall, ToolDescriptor};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Produces the next assistant message for a history.
///
/// Implementations must return exactly one message; any transport or model
/// error is returned as [`AgentError::ModelInvocation`] and is not retried.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: &str, temperature: f32) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
            temperature,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
            config.temperature,
        )
    }

    fn build_request(&self, history: &[Message], tools: &[ToolDescriptor]) -> GeminiRequest {
        let system_text: Vec<&str> = history
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part::text(system_text.join("\n\n"))],
            })
        };

        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolSet {
                function_declarations: tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: t.name.to_string(),
                        description: t.description.to_string(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }]
        };

        GeminiRequest {
            contents: to_contents(history),
            tools,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
            system_instruction,
        }
    }
}

#[async_trait]
impl ModelInvoker for GeminiClient {
    async fn invoke(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::ModelInvocation("GEMINI_API_KEY not configured".to_string())
        })?;

        let request = self.build_request(history, tools);

        info!(messages = history.len(), tools = tools.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::ModelInvocation(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AgentError::ModelInvocation(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::ModelInvocation(format!("Gemini parse error: {}", e))
        })?;

        let message = into_message(gemini_response)?;

        debug!(
            tool_calls = message.tool_calls.len(),
            content_len = message.content.len(),
            "Gemini response received"
        );

        Ok(message)
    }
}

/// Map history onto Gemini contents. System messages travel separately;
/// tool results go back as `functionResponse` parts on the user side.
fn to_contents(history: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(history.len());

    for message in history {
        let (role, part) = match message.role {
            Role::System => continue,
            Role::User => ("user", vec![Part::text(message.content.clone())]),
            Role::Assistant => {
                let mut parts = Vec::with_capacity(message.tool_calls.len() + 1);
                if !message.content.is_empty() {
                    parts.push(Part::text(message.content.clone()));
                }
                for call in &message.tool_calls {
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                        ..Part::default()
                    });
                }
                ("model", parts)
            }
            Role::Tool => {
                let response = serde_json::from_str::<Value>(&message.content)
                    .ok()
                    .filter(Value::is_object)
                    .unwrap_or_else(|| json!({ "content": message.content }));
                (
                    "user",
                    vec![Part {
                        function_response: Some(FunctionResponse {
                            name: message.name.clone().unwrap_or_default(),
                            response,
                        }),
                        ..Part::default()
                    }],
                )
            }
        };

        if part.is_empty() {
            continue;
        }

        // Consecutive function responses belong to one user turn.
        match contents.last_mut() {
            Some(last)
                if message.role == Role::Tool
                    && last.role.as_deref() == Some("user")
                    && last.parts.iter().all(|p| p.function_response.is_some()) =>
            {
                last.parts.extend(part);
            }
            _ => contents.push(Content {
                role: Some(role.to_string()),
                parts: part,
            }),
        }
    }

    contents
}

fn into_message(response: GeminiResponse) -> Result<Message> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::ModelInvocation("No response from Gemini API".to_string()))?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            // Gemini calls carry no id; one is assigned below.
            let arguments = if call.args.is_null() { json!({}) } else { call.args };
            tool_calls.push(ToolCall::new(String::new(), call.name, arguments));
        }
    }

    if text.is_empty() && tool_calls.is_empty() {
        return Err(AgentError::ModelInvocation(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let mut message = Message::assistant_with_tools(text, tool_calls);
    message.ensure_unique_call_ids();
    Ok(message)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSet>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
