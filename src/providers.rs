//! Optional LLM provider adapters (feature `rig`).
//!
//! The core pipeline only knows the [`Generator`] trait; this module plugs a
//! local Ollama model behind it via `rig`. Enable with:
//!
//! ```toml
//! ragfuse = { version = "0.1", features = ["rig"] }
//! ```

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::providers::ollama;

use crate::generate::Generator;
use crate::types::RagError;

/// [`Generator`] backed by a local Ollama model.
pub struct OllamaGenerator {
    model: String,
    preamble: String,
    temperature: f64,
}

impl OllamaGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            preamble: "Answer the question using only the provided context."
                .to_string(),
            temperature: 0.7,
        }
    }

    /// Override the system preamble sent with every completion.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let client = ollama::Client::new();
        let completion_model = client.completion_model(&self.model);

        let request = completion_model
            .completion_request(rig::completion::Message::user(prompt.to_owned()))
            .preamble(self.preamble.clone())
            .temperature(self.temperature)
            .build();

        let response = completion_model
            .completion(request)
            .await
            .map_err(|err| RagError::Generation(err.to_string()))?;

        let text = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                rig::message::AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            return Err(RagError::Generation(
                "model returned no text content".to_string(),
            ));
        }
        Ok(text)
    }
}
