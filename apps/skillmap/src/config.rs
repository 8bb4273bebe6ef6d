use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::engine::summarizer::DEFAULT_TOP_N;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values are startup errors.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub top_n: usize,
    pub batch_size: usize,
    pub raw_log_limit: usize,
    pub whitelist: Option<PathBuf>,
    pub generation_api_url: String,
    pub generation_api_key: Option<String>,
    pub generation_model: String,
    /// LoRA adapter served for the vacancy pass, if any.
    pub vacancy_adapter: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            data_dir: PathBuf::from(env_or("SKILLMAP_DATA_DIR", "data")),
            top_n: parse_env("SKILLMAP_TOP_N", DEFAULT_TOP_N)?,
            batch_size: parse_env("SKILLMAP_BATCH_SIZE", 8)?,
            raw_log_limit: parse_env("SKILLMAP_RAW_LOG_LIMIT", 3)?,
            whitelist: optional_env("SKILLMAP_WHITELIST").map(PathBuf::from),
            generation_api_url: env_or("GENERATION_API_URL", "http://localhost:8000/v1"),
            generation_api_key: optional_env("GENERATION_API_KEY"),
            generation_model: env_or("GENERATION_MODEL", "meta-llama/Llama-3.1-8B-Instruct"),
            vacancy_adapter: optional_env("GENERATION_VACANCY_ADAPTER"),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    pub fn paths(&self) -> Paths {
        Paths::new(&self.data_dir)
    }
}

/// Conventional artifact locations under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub vacancy_competencies: PathBuf,
    pub project_competencies: PathBuf,
    pub matrix: PathBuf,
    pub filtered_matrix: PathBuf,
    pub gaps: PathBuf,
    pub stats: PathBuf,
    pub recommendations: PathBuf,
}

impl Paths {
    pub fn new(data_dir: &Path) -> Self {
        let derived = data_dir.join("derived");
        Self {
            vacancy_competencies: derived.join("vacancy_competencies.json"),
            project_competencies: derived.join("project_competencies.json"),
            matrix: derived.join("competency_matrix.json"),
            filtered_matrix: derived.join("competency_matrix_filtered.json"),
            gaps: derived.join("competency_gaps_and_redundancy.json"),
            stats: derived.join("stats.json"),
            recommendations: derived.join("recommendations.json"),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
