use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use crate::prompt::{PROMPT_VERSION, SYSTEM_PROMPT};
use crate::types::{Legend, Screenshot};

/// A vision-capable chat model: one prompt, one text block, one image in; text out.
#[async_trait]
pub trait Model: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        image_base64: &str,
    ) -> Result<String>;
}

/// Ask the model for the next action. No retries; errors end the cycle.
pub async fn request_decision(
    model: &dyn Model,
    legend: &Legend,
    task: &str,
    screenshot: &Screenshot,
) -> Result<String> {
    let user_text = format!("{}\n{}", legend, task);
    let output = model
        .complete(SYSTEM_PROMPT, &user_text, &screenshot.to_base64())
        .await?;
    debug!(prompt_version = PROMPT_VERSION, "raw model output: {}", output);
    Ok(output)
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
}

pub struct OpenAiModel {
    client: Client,
    config: ModelConfig,
}

impl OpenAiModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Model for OpenAiModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        image_base64: &str,
    ) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": user_text },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/png;base64,{}", image_base64) }
                        }
                    ]
                }
            ],
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .context("model request failed")?;

        let status = response.status();
        let json_resp: serde_json::Value = response
            .json()
            .await
            .context("model response was not JSON")?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            error!(%status, "model API error: {}", err_msg);
            return Err(anyhow!("model API error ({}): {}", status, err_msg));
        }

        extract_content(&json_resp)
    }
}

fn extract_content(json_resp: &serde_json::Value) -> Result<String> {
    json_resp["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| anyhow!("No content in model response: {}", json_resp))
}
