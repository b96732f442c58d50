use super::Message;
use crate::domain::StreamError;

/// Service tiers the upstream accepts; anything else is left out of the body
const FORWARDED_SERVICE_TIERS: &[&str] = &["flex", "on_demand"];

/// A chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Overrides the endpoint's configured model
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub service_tier: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop: None,
            service_tier: None,
            stream: false,
        }
    }

    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::new()
    }

    /// Reject requests that must never reach the network
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.messages.is_empty() {
            return Err(StreamError::validation(
                "chat request must contain at least one message",
            ));
        }

        if let Some(ref model) = self.model {
            if model.trim().is_empty() {
                return Err(StreamError::validation("model override must not be empty"));
            }
        }

        Ok(())
    }

    /// The service tier to send upstream, if it is one the upstream accepts
    pub fn forwarded_service_tier(&self) -> Option<&str> {
        self.service_tier
            .as_deref()
            .filter(|tier| FORWARDED_SERVICE_TIERS.contains(tier))
    }
}

/// Builder for ChatRequest
#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    messages: Vec<Message>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    stop: Option<Vec<String>>,
    service_tier: Option<String>,
    stream: bool,
}

impl ChatRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Message::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Message::user(content))
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(Message::assistant(content))
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn service_tier(mut self, tier: impl Into<String>) -> Self {
        self.service_tier = Some(tier.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn build(self) -> ChatRequest {
        ChatRequest {
            messages: self.messages,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            stop: self.stop,
            service_tier: self.service_tier,
            stream: self.stream,
        }
    }
}
