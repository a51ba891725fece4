use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::ollama::{OllamaClient, OllamaModel};

pub const QUESTION_PREFIX: &str = "question: ";

pub const APOLOGY_MESSAGE: &str =
    "I'm sorry, I encountered an error while processing your question.";

pub const REPHRASE_MESSAGE: &str = "I'm still learning about flood risks in South Sudan. Could you please rephrase your question or ask about flood preparation, safety, or specific regions?";

pub const RULE_ONLY_MESSAGE: &str = "I can help with flood information in South Sudan. Please ask about specific regions (Bentiu, Bor, Malakal, Juba), flood preparation, safety measures, or seasonal patterns.";

const MIN_ANSWER_WORDS: usize = 5;

/// Prompt in, generated text out. Implemented by the served fine-tuned model.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    Generated,
    TooShort,
    Failed,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct FallbackAnswer {
    pub text: String,
    pub outcome: FallbackOutcome,
}

impl FallbackAnswer {
    fn fixed(text: &str, outcome: FallbackOutcome) -> Self {
        Self {
            text: text.to_string(),
            outcome,
        }
    }
}

#[derive(Clone)]
pub struct ModelFallback {
    generator: Option<Arc<dyn TextGenerator>>,
    generation_limit: Arc<Semaphore>,
}

impl ModelFallback {
    pub fn new(generator: Arc<dyn TextGenerator>, generation_limit: Arc<Semaphore>) -> Self {
        Self {
            generator: Some(generator),
            generation_limit,
        }
    }

    pub fn disabled() -> Self {
        Self {
            generator: None,
            generation_limit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Rule-only mode when no model is configured or the runtime does not have it.
    pub async fn from_config(config: &AppConfig, generation_limit: Arc<Semaphore>) -> Self {
        let Some(model) = config.fallback.model.clone() else {
            tracing::warn!("no fallback model configured, running rule-only");
            return Self::disabled();
        };

        let client = OllamaClient::new(config.ollama_base_url.clone());
        match client.has_model(&model).await {
            Ok(true) => {
                tracing::info!("fallback model {} available", model);
            }
            Ok(false) => {
                tracing::warn!(
                    "fallback model {} not found on {}, running rule-only",
                    model,
                    config.ollama_base_url
                );
                return Self::disabled();
            }
            Err(err) => {
                tracing::warn!("ollama unreachable ({}), running rule-only", err);
                return Self::disabled();
            }
        }

        let generator = OllamaModel::new(
            client,
            model,
            config.fallback.max_output_tokens,
            config.fallback.temperature,
        );
        Self::new(Arc::new(generator), generation_limit)
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.generator.as_deref().map(|g| g.name())
    }

    pub fn format_prompt(query: &str) -> String {
        format!("{QUESTION_PREFIX}{}", query.trim())
    }

    /// Never fails: inference errors become the apology message.
    pub async fn answer(&self, query: &str) -> FallbackAnswer {
        let Some(generator) = &self.generator else {
            return FallbackAnswer::fixed(RULE_ONLY_MESSAGE, FallbackOutcome::Unavailable);
        };

        let _permit = match self.generation_limit.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::error!("generation limiter closed: {}", err);
                return FallbackAnswer::fixed(APOLOGY_MESSAGE, FallbackOutcome::Failed);
            }
        };

        let prompt = Self::format_prompt(query);
        match generator.generate(&prompt).await {
            Ok(text) => {
                let text = sanitize_model_output(text);
                if text.split_whitespace().count() < MIN_ANSWER_WORDS {
                    tracing::debug!("model reply too short for query '{}'", query);
                    return FallbackAnswer::fixed(REPHRASE_MESSAGE, FallbackOutcome::TooShort);
                }
                tracing::info!("generated response for query '{}'", query);
                FallbackAnswer {
                    text,
                    outcome: FallbackOutcome::Generated,
                }
            }
            Err(err) => {
                tracing::error!("error generating response: {:#}", err);
                FallbackAnswer::fixed(APOLOGY_MESSAGE, FallbackOutcome::Failed)
            }
        }
    }
}

fn sanitize_model_output(answer: String) -> String {
    let mut text = answer.trim().to_string();
    if text.starts_with("```") {
        let fenced = Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```$")
            .ok()
            .and_then(|re| re.captures(&text).and_then(|caps| caps.get(1)))
            .map(|body| body.as_str().trim().to_string());
        text = match fenced {
            Some(body) => body,
            None => text.replace("```", "").trim().to_string(),
        };
    }
    text
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub struct StubGenerator {
        reply: std::result::Result<String, String>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(vec![]),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(vec![]),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow::anyhow!(message.clone())),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }
}
