use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason why the generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One event of a streamed completion.
///
/// The payload is kept verbatim in `raw`; the accessors read the
/// OpenAI-compatible fields when the endpoint sends them and return `None`
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    raw: String,
    value: Value,
}

impl StreamChunk {
    /// Parse one SSE `data:` payload
    pub fn from_data(raw: impl Into<String>) -> Result<Self, serde_json::Error> {
        let raw = raw.into();
        let value = serde_json::from_str(&raw)?;
        Ok(Self { raw, value })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn id(&self) -> Option<&str> {
        self.value.get("id").and_then(Value::as_str)
    }

    pub fn model(&self) -> Option<&str> {
        self.value.get("model").and_then(Value::as_str)
    }

    fn first_choice(&self) -> Option<&Value> {
        self.value.get("choices")?.get(0)
    }

    /// Text fragment carried by the first choice
    pub fn delta(&self) -> Option<&str> {
        self.first_choice()?
            .get("delta")?
            .get("content")
            .and_then(Value::as_str)
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.first_choice()?
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(FinishReason::parse)
    }

    /// Usage from the top-level `usage` object, or Groq's `x_groq.usage`
    pub fn usage(&self) -> Option<Usage> {
        let usage = self
            .value
            .get("usage")
            .filter(|u| u.is_object())
            .or_else(|| self.value.get("x_groq")?.get("usage"))?;

        serde_json::from_value(usage.clone()).ok()
    }

    /// Message of an in-band `{"error": ...}` event
    pub fn error_message(&self) -> Option<String> {
        let error = self.value.get("error")?;

        let message = match error {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            Value::Null => return None,
            other => other.to_string(),
        };

        Some(message)
    }
}
