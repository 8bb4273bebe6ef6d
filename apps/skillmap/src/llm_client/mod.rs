//! Generation backend boundary: the only place the pipeline talks to a
//! text-generation service.
//!
//! The backend is an injected capability: callers `acquire` a `BackendHandle`
//! for an explicit `BackendSpec` and `release` it when done. Switching the
//! LoRA adapter means releasing one handle and acquiring another.
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

pub mod openai;
pub mod prompts;

pub use openai::OpenAiCompatibleBackend;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Backend returned empty content")]
    EmptyContent,

    #[error("Backend returned {got} responses for {expected} prompts")]
    CountMismatch { expected: usize, got: usize },

    #[error("Backend handle was already released")]
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl SamplingParams {
    /// Deterministic decoding for batched competency extraction.
    pub fn extraction() -> Self {
        Self {
            max_new_tokens: 128,
            temperature: 0.0,
            top_p: 1.0,
        }
    }

    /// Single free-form answer per industry.
    pub fn recommendation() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.4,
            top_p: 0.9,
        }
    }
}

/// A text-generation service. Returns one raw text per prompt, in prompt order.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<String>, GenerationError>;

    /// Frees whatever the backend holds. Called once by `BackendHandle::release`.
    async fn release(&self) {}
}

/// Everything needed to construct a backend. Passed explicitly instead of
/// living in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub adapter: Option<String>,
}

impl BackendSpec {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.generation_api_url.clone(),
            api_key: config.generation_api_key.clone(),
            model: config.generation_model.clone(),
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<String>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Model name sent on the wire: the adapter when one is loaded.
    pub fn served_model(&self) -> &str {
        self.adapter.as_deref().unwrap_or(&self.model)
    }
}

/// Owned access to an acquired backend.
pub struct BackendHandle {
    spec: BackendSpec,
    backend: Option<Arc<dyn GenerationBackend>>,
}

impl BackendHandle {
    /// Acquires an HTTP backend for `spec`.
    pub fn acquire(spec: BackendSpec) -> Result<Self, GenerationError> {
        let backend = OpenAiCompatibleBackend::new(spec.clone())?;
        info!(model = spec.served_model(), endpoint = %spec.endpoint, "generation backend acquired");
        Ok(Self::from_backend(spec, Arc::new(backend)))
    }

    /// Wraps an already-built backend (tests, alternative transports).
    pub fn from_backend(spec: BackendSpec, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            spec,
            backend: Some(backend),
        }
    }

    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    /// Generates one response per prompt and checks the count.
    pub async fn generate(
        &self,
        prompts: &[String],
        params: &SamplingParams,
    ) -> Result<Vec<String>, GenerationError> {
        let backend = self.backend.as_ref().ok_or(GenerationError::Released)?;
        let responses = backend.generate(prompts, params).await?;
        if responses.len() != prompts.len() {
            return Err(GenerationError::CountMismatch {
                expected: prompts.len(),
                got: responses.len(),
            });
        }
        Ok(responses)
    }

    /// Convenience for a single prompt.
    pub async fn generate_one(
        &self,
        prompt: String,
        params: &SamplingParams,
    ) -> Result<String, GenerationError> {
        self.generate(&[prompt], params)
            .await?
            .pop()
            .ok_or(GenerationError::EmptyContent)
    }

    pub async fn release(mut self) {
        if let Some(backend) = self.backend.take() {
            backend.release().await;
            info!(model = self.spec.served_model(), "generation backend released");
        }
    }

    /// Returns a handle for `spec`, releasing this one and calling `acquire`
    /// only when the spec differs from the current one.
    pub async fn switch_with<F>(self, spec: BackendSpec, acquire: F) -> Result<Self, GenerationError>
    where
        F: FnOnce(BackendSpec) -> Result<Self, GenerationError>,
    {
        if self.spec == spec && self.backend.is_some() {
            return Ok(self);
        }
        self.release().await;
        acquire(spec)
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// In-memory backend that answers from a script, or echoes a fixed reply.
    #[derive(Default)]
    pub struct ScriptedBackend {
        responses: Mutex<VecDeque<String>>,
        pub prompts_seen: Mutex<Vec<String>>,
        pub released: AtomicBool,
        pub fail: bool,
    }

    impl ScriptedBackend {
        pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(responses: I) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn was_released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            prompts: &[String],
            _params: &SamplingParams,
        ) -> Result<Vec<String>, GenerationError> {
            if self.fail {
                return Err(GenerationError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            self.prompts_seen.lock().unwrap().extend(prompts.iter().cloned());
            let mut queue = self.responses.lock().unwrap();
            Ok(prompts
                .iter()
                .map(|_| queue.pop_front().unwrap_or_default())
                .collect())
        }

        async fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    pub fn spec() -> BackendSpec {
        BackendSpec {
            endpoint: "http://localhost:9/v1".into(),
            api_key: None,
            model: "base-model".into(),
            adapter: None,
        }
    }

    pub fn handle(backend: Arc<ScriptedBackend>) -> BackendHandle {
        BackendHandle::from_backend(spec(), backend)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{handle, spec, ScriptedBackend};
    use super::*;

    struct ShortBackend;

    #[async_trait]
    impl GenerationBackend for ShortBackend {
        async fn generate(
            &self,
            _prompts: &[String],
            _params: &SamplingParams,
        ) -> Result<Vec<String>, GenerationError> {
            Ok(vec!["only one".into()])
        }
    }

    #[tokio::test]
    async fn test_generate_returns_one_response_per_prompt() {
        let backend = Arc::new(ScriptedBackend::new(["a", "b"]));
        let handle = handle(backend.clone());
        let out = handle
            .generate(&["p1".into(), "p2".into()], &SamplingParams::extraction())
            .await
            .unwrap();
        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(backend.prompts_seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let handle = BackendHandle::from_backend(spec(), Arc::new(ShortBackend));
        let err = handle
            .generate(&["p1".into(), "p2".into()], &SamplingParams::extraction())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::CountMismatch { expected: 2, got: 1 }));
    }

    #[tokio::test]
    async fn test_release_calls_backend_once() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        handle(backend.clone()).release().await;
        assert!(backend.was_released());
    }

    #[tokio::test]
    async fn test_switch_keeps_handle_for_same_spec() {
        let backend = Arc::new(ScriptedBackend::new(["kept"]));
        let switched = handle(backend.clone())
            .switch_with(spec(), |_| panic!("same spec must not re-acquire"))
            .await
            .unwrap();
        assert!(!backend.was_released());
        let out = switched
            .generate_one("p".into(), &SamplingParams::recommendation())
            .await
            .unwrap();
        assert_eq!(out, "kept");
    }

    #[tokio::test]
    async fn test_switch_to_new_adapter_releases_old_backend() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let adapted = spec().with_adapter(Some("vacancy-lora".into()));
        let next = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let switched = handle(backend.clone())
            .switch_with(adapted.clone(), |spec| {
                Ok(BackendHandle::from_backend(spec, next.clone()))
            })
            .await
            .unwrap();
        assert!(backend.was_released());
        assert_eq!(switched.spec(), &adapted);
        assert_eq!(switched.spec().served_model(), "vacancy-lora");
    }

    #[test]
    fn test_served_model_defaults_to_base() {
        assert_eq!(spec().served_model(), "base-model");
    }
}
