//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat Completions API,
//! capturing both the assistant response and the token usage of the last call so the
//! turn driver can attach cost estimates to every turn.
//!
//! The model is chosen per call rather than per client, which lets a single client serve a
//! whole panel of participants and walk a fallback chain without rebuilding anything.
//!
//! # Example
//!
//! ```rust,no_run
//! use colloquy::clients::openai::{model_to_string, Model, OpenAIClient};
//! use colloquy::client_wrapper::{ClientWrapper, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let secret_key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new(&secret_key).with_max_completion_tokens(200);
//!
//!     let reply = client
//!         .send_message(
//!             &model_to_string(Model::GPT4oMini),
//!             &[Message::system("You are terse."), Message::user("Hello!")],
//!         )
//!         .await?;
//!     println!("Assistant: {}", reply.content);
//!
//!     if let Some(usage) = client.get_last_usage().await {
//!         println!("input: {}, output: {}", usage.input_tokens, usage.output_tokens);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use tokio::sync::Mutex;

use crate::client_wrapper::{ClientError, ClientWrapper, Message, Role, TokenUsage};
use crate::clients::common::{get_shared_http_client, send_and_track};

/// Model identifiers the default configuration refers to.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// `gpt-4.1` – general availability GPT-4.1.
    GPT41,
    /// `gpt-4.1-mini` – reduced cost GPT-4.1 tier.
    GPT41Mini,
    /// `gpt-4.1-nano-2025-04-14` – pinned ultra low cost GPT-4.1 snapshot.
    GPT41Nano20250414,
    /// `gpt-4o` – Omni model with text + image inputs.
    GPT4o,
    /// `gpt-4o-mini` – cost effective GPT-4o derivative.
    GPT4oMini,
    /// `gpt-3.5-turbo` – legacy fallback of last resort.
    GPT35Turbo,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT41 => "gpt-4.1".to_string(),
        Model::GPT41Mini => "gpt-4.1-mini".to_string(),
        Model::GPT41Nano20250414 => "gpt-4.1-nano-2025-04-14".to_string(),
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT35Turbo => "gpt-3.5-turbo".to_string(),
    }
}

/// Client wrapper for OpenAI's Chat Completions API.
pub struct OpenAIClient {
    /// Underlying SDK client pointing at the REST endpoint.
    client: openai_rust::Client,
    /// Upper bound on generated tokens per reply, `None` for the provider default.
    max_completion_tokens: Option<u32>,
    /// Storage for the token usage returned by the most recent request.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a client for the public OpenAI endpoint.
    pub fn new(secret_key: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client(
                secret_key,
                get_shared_http_client().clone(),
            ),
            max_completion_tokens: None,
            token_usage: Mutex::new(None),
        }
    }

    /// Construct a client targeting a custom OpenAI compatible base URL.
    pub fn new_with_base_url(secret_key: &str, base_url: &str) -> Self {
        OpenAIClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                get_shared_http_client().clone(),
                base_url,
            ),
            max_completion_tokens: None,
            token_usage: Mutex::new(None),
        }
    }

    /// Cap the length of every reply (builder pattern).
    pub fn with_max_completion_tokens(mut self, max_completion_tokens: u32) -> Self {
        self.max_completion_tokens = Some(max_completion_tokens);
        self
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<Message, ClientError> {
        let formatted_messages = messages
            .iter()
            .map(|msg| chat::Message {
                role: msg.role.as_str().to_owned(),
                content: msg.content.to_string(),
            })
            .collect::<Vec<_>>();

        let content = send_and_track(
            &self.client,
            model,
            formatted_messages,
            Some("/v1/chat/completions".to_string()),
            self.max_completion_tokens,
            &self.token_usage,
        )
        .await?;

        Ok(Message::new(Role::Assistant, content))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
