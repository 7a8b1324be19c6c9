//! Helpers shared by the OpenAI compatible clients: a process-wide pooled HTTP client and the
//! request/usage bookkeeping around a single chat completion.

use crate::client_wrapper::{ClientError, TokenUsage};
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    /// One pooled client for every wrapper so connections, DNS lookups and TLS sessions are
    /// reused across turns.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = build_pooled_client();
}

/// Returns the process-wide HTTP client.
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Builds a reqwest client tuned for long-lived, sequential completion calls:
/// - `pool_idle_timeout(90s)` keeps idle connections around between UI actions
/// - `tcp_keepalive(60s)` stops middleboxes from dropping them
/// - `timeout(300s)` bounds a single completion request
fn build_pooled_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_else(|err| {
            log::warn!(
                "colloquy::clients::common: pooled HTTP client could not be built ({}), \
                 using defaults",
                err
            );
            reqwest::Client::new()
        })
}

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    max_completion_tokens: Option<u32>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, ClientError> {
    let mut chat_arguments = chat::ChatArguments::new(model, formatted_msgs);
    chat_arguments.max_tokens = max_completion_tokens;

    let response = match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => response,
        Err(err) => {
            log::error!(
                "colloquy::clients::common::send_and_track(...): API error for model '{}': {}",
                model,
                err
            );
            return Err(err.into());
        }
    };

    let usage = TokenUsage {
        input_tokens: response.usage.prompt_tokens as usize,
        output_tokens: response.usage.completion_tokens as usize,
        total_tokens: response.usage.total_tokens as usize,
    };
    *usage_slot.lock().await = Some(usage);

    match response.choices.first() {
        Some(choice) => Ok(choice.message.content.clone()),
        None => Err(format!("no choices returned by model '{}'", model).into()),
    }
}
