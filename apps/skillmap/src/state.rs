use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    pub fn for_tests() -> Self {
        Self {
            config: Config {
                data_dir: std::path::PathBuf::from("data"),
                top_n: crate::engine::summarizer::DEFAULT_TOP_N,
                batch_size: 8,
                raw_log_limit: 0,
                whitelist: None,
                generation_api_url: "http://localhost:8000/v1".to_string(),
                generation_api_key: None,
                generation_model: "test-model".to_string(),
                vacancy_adapter: None,
                port: 0,
                rust_log: "info".to_string(),
            },
        }
    }
}
