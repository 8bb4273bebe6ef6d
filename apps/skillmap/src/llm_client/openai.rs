//! HTTP backend for OpenAI-compatible `/completions` servers (vLLM,
//! llama.cpp server, text-generation-inference in OpenAI mode).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BackendSpec, GenerationBackend, GenerationError, SamplingParams};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [String],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    index: usize,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct OpenAiCompatibleBackend {
    client: Client,
    spec: BackendSpec,
}

impl OpenAiCompatibleBackend {
    pub fn new(spec: BackendSpec) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, spec })
    }

    fn completions_url(&self) -> String {
        format!("{}/completions", self.spec.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    /// Sends the whole batch in one request. Retries on 429 and 5xx with
    /// exponential backoff (1s, 2s).
    async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<String>, GenerationError> {
        if prompts.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = CompletionRequest {
            model: self.spec.served_model(),
            prompt: prompts,
            max_tokens: params.max_new_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let mut last_error: Option<GenerationError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Generation call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(self.completions_url()).json(&request_body);
            if let Some(key) = &self.spec.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(GenerationError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Generation API returned {}: {}", status, body);
                last_error = Some(GenerationError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(GenerationError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: CompletionResponse = response.json().await?;
            if let Some(usage) = &completion.usage {
                debug!(
                    "Generation call succeeded: prompts={}, prompt_tokens={}, completion_tokens={}",
                    prompts.len(),
                    usage.prompt_tokens,
                    usage.completion_tokens
                );
            }

            return Ok(collect_texts(completion.choices));
        }

        Err(last_error.unwrap_or(GenerationError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Choices may arrive out of order; `index` is the prompt position.
fn collect_texts(mut choices: Vec<Choice>) -> Vec<String> {
    choices.sort_by_key(|c| c.index);
    choices.into_iter().map(|c| c.text.trim().to_string()).collect()
}
