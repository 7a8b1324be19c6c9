use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A ClientWrapper is a thin adapter around a hosted LLM service.
/// It does not keep track of the conversation: the [`Transcript`](crate::Transcript) owns the
/// history and the [`TurnDriver`](crate::TurnDriver) renders it into messages for every call.
// src/colloquy/client_wrapper.rs

/// Represents the possible roles for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // set by the developer to steer the model's responses
    System,
    // a message sent by a human user, or by another participant as seen from the speaker
    User,
    // content generated by the model on behalf of the speaker
    Assistant,
}

impl Role {
    /// Wire name used by OpenAI compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: Arc<str>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: Arc::from(content.into().as_str()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Error type crossing the provider seam. Any error is treated as "model unavailable" by the
/// turn driver, which then moves on to the next model of the fallback chain.
pub type ClientError = Box<dyn Error + Send + Sync>;

/// Trait defining the interface to a model-hosting service.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the role-tagged `messages` to `model` and return the assistant reply.
    async fn send_message(&self, model: &str, messages: &[Message])
        -> Result<Message, ClientError>;

    /// Short provider label used in logs (e.g. `"openai"`).
    fn provider_name(&self) -> &str;

    /// Hook to retrieve usage from the *last* send_message() call.
    /// Default impl reads the slot exposed by [`ClientWrapper::usage_slot`].
    async fn get_last_usage(&self) -> Option<TokenUsage> {
        match self.usage_slot() {
            Some(slot) => slot.lock().await.clone(),
            None => None,
        }
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // Wrappers supporting TokenUsage tracking return their slot by overriding this method.
        None
    }
}
