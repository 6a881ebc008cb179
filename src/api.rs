//! # API Module
//!
//! External capabilities consumed by the engine, behind narrow traits:
//!
//! - [`Embedder`]: text in, fixed-dimension vector out.
//! - [`ChatModel`]: assembled prompt in, completion text out.
//!
//! The engine never talks to a model provider directly; it only sees these
//! traits. [`OpenAiEmbedder`] and [`OpenAiChat`] are the bundled
//! implementations for OpenAI compatible APIs (including local backends that
//! speak the same protocol). Timeouts and retries are the capability's
//! concern, not the engine's.
//!
//! # Example
//!
//! ```no_run
//! use tome::api::{Embedder, OpenAiEmbedder};
//! use tome::config::TomeConfig;
//!
//! # async fn demo(config: &TomeConfig) -> Result<(), tome::error::EmbeddingError> {
//! let embedder = OpenAiEmbedder::new(config);
//! let vector = embedder.embed("Rust is great!").await?;
//! println!("{} dimensions", vector.len());
//! # Ok(()) }
//! ```

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        chat::{
            ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
            ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
            CreateChatCompletionRequestArgs,
        },
        embeddings::CreateEmbeddingRequestArgs,
    },
};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::{Write, stdout};
use tracing::debug;

use crate::{
    config::TomeConfig,
    error::{EmbeddingError, ModelError},
};

/// Maps text to a fixed-dimension vector. May fail on quota, network, or
/// auth problems; callers decide whether that is fatal.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Produces a completion for a fully assembled prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Creates a new OpenAI API client from configuration.
pub fn create_client(config: &TomeConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());
    debug!("Client created with config: {:?}", openai_config);
    Client::with_config(openai_config)
}

/// [`Embedder`] backed by the OpenAI embeddings endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &TomeConfig) -> Self {
        Self {
            client: create_client(config),
            model: config.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(text)
            .build()?;

        let response = self.client.embeddings().create(request).await?;
        let first = response
            .data
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResponse)?;

        Ok(first.embedding)
    }
}

/// [`ChatModel`] backed by the OpenAI chat completions endpoint.
///
/// With `stream` enabled the response is consumed as a delta stream and
/// echoed to stdout as it arrives (for interactive use); the accumulated
/// text is returned either way, so callers see the same contract.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u16,
    stop_words: Vec<String>,
    stream: bool,
}

impl OpenAiChat {
    pub fn new(config: &TomeConfig) -> Self {
        Self {
            client: create_client(config),
            model: config.model.clone(),
            max_tokens: config.max_response_tokens,
            stop_words: config.stop_words.clone(),
            stream: config.should_stream.unwrap_or(false),
        }
    }

    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest, ModelError> {
        let message = ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
            name: None,
        });

        let request = if self.stop_words.is_empty() {
            CreateChatCompletionRequestArgs::default()
                .max_tokens(self.max_tokens)
                .model(self.model.clone())
                .messages(vec![message])
                .build()?
        } else {
            CreateChatCompletionRequestArgs::default()
                .max_tokens(self.max_tokens)
                .model(self.model.clone())
                .stop(self.stop_words.clone())
                .messages(vec![message])
                .build()?
        };

        Ok(request)
    }

    async fn fetch(&self, prompt: &str) -> Result<String, ModelError> {
        let request = self.build_request(prompt)?;
        debug!("Sending request: {:?}", request);

        let response = self.client.chat().create(request).await?;

        let mut response_string = String::new();
        for chat_choice in response.choices {
            if let Some(content) = chat_choice.message.content {
                response_string.push_str(&content);
            }
        }

        if response_string.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(response_string)
    }

    async fn fetch_streaming(&self, prompt: &str) -> Result<String, ModelError> {
        let request = self.build_request(prompt)?;
        debug!("Sending streaming request: {:?}", request);

        let mut stream = self.client.chat().create_stream(request).await?;
        let mut response_string = String::new();

        while let Some(result) = stream.next().await {
            let response = result?;
            let mut lock = stdout().lock();
            for chat_choice in &response.choices {
                if let Some(ref content) = chat_choice.delta.content {
                    response_string.push_str(content);
                    let _ = write!(lock, "{content}");
                    let _ = lock.flush();
                }
            }
        }
        let _ = writeln!(stdout().lock());

        if response_string.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(response_string)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        if self.stream {
            self.fetch_streaming(prompt).await
        } else {
            self.fetch(prompt).await
        }
    }
}
