use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::fallback::TextGenerator;

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct TagsResp {
            models: Vec<ModelTag>,
        }

        #[derive(Deserialize)]
        struct ModelTag {
            name: String,
        }

        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to call ollama tags endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/tags returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<TagsResp>()
            .await
            .context("failed to decode ollama /api/tags response")?;

        Ok(response.models.into_iter().map(|m| m.name).collect())
    }

    pub async fn has_model(&self, model: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|name| model_name_matches(name, model)))
    }

    pub async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        num_predict: usize,
        temperature: f32,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: GenerateOptions,
        }

        #[derive(Serialize)]
        struct GenerateOptions {
            num_predict: usize,
            temperature: f32,
            top_k: u32,
            top_p: f32,
        }

        #[derive(Deserialize)]
        struct GenerateResp {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&GenerateReq {
                model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    num_predict,
                    temperature,
                    top_k: 50,
                    top_p: 0.95,
                },
            })
            .send()
            .await
            .context("failed to call ollama generate endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/generate returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<GenerateResp>()
            .await
            .context("failed to decode ollama generate response")?;

        Ok(response.response.trim().to_string())
    }
}

/// The fine-tuned model as served by Ollama.
#[derive(Clone)]
pub struct OllamaModel {
    client: OllamaClient,
    model: String,
    num_predict: usize,
    temperature: f32,
}

impl OllamaModel {
    pub fn new(
        client: OllamaClient,
        model: impl Into<String>,
        num_predict: usize,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            num_predict,
            temperature,
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client
            .generate_text(&self.model, prompt, self.num_predict, self.temperature)
            .await
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// "floodsense-t5" is listed by Ollama as "floodsense-t5:latest"
fn model_name_matches(listed: &str, wanted: &str) -> bool {
    if listed == wanted {
        return true;
    }
    !wanted.contains(':') && listed.strip_suffix(":latest") == Some(wanted)
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
