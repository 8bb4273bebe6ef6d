//! Per-industry recommendations from the gap summaries and top-N stats.
//! Backend answers go through `extract_object`, so every industry maps to a
//! JSON value even when the backend answers in prose.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::engine::extractor::extract_object;
use crate::engine::matrix::IndustrySummary;
use crate::engine::summarizer::{CompetencyStats, IndustryStats};
use crate::errors::AppError;
use crate::llm_client::prompts::recommendation_prompt;
use crate::llm_client::{BackendHandle, SamplingParams};

pub const INSUFFICIENT_DATA: &str = "Not enough data to analyse this industry.";
pub const NO_GAPS: &str = "No gap competencies found.";
pub const EMPTY_ANSWER: &str = "The model returned no answer.";

pub async fn recommend(
    summaries: &[IndustrySummary],
    stats: &CompetencyStats,
    backend: &BackendHandle,
) -> Result<BTreeMap<String, Value>, AppError> {
    let params = SamplingParams::recommendation();
    let empty = IndustryStats::default();
    let mut recommendations = BTreeMap::new();
    let mut generated = 0usize;

    for summary in summaries {
        let industry = summary.industry.as_str();
        let industry_stats = stats.industries.get(industry).unwrap_or(&empty);

        if !industry_stats.has_data() {
            recommendations.insert(industry.to_string(), json!(INSUFFICIENT_DATA));
            continue;
        }
        if summary.gaps.is_empty() {
            recommendations.insert(industry.to_string(), json!(NO_GAPS));
            continue;
        }

        // A competency named after the industry itself is noise, not a gap.
        let gaps: Vec<_> = summary
            .gaps
            .iter()
            .filter(|g| g.competency != industry)
            .cloned()
            .collect();

        let prompt = recommendation_prompt(
            industry,
            &industry_stats.top_demand,
            &industry_stats.top_supply,
            &gaps,
            &summary.redundancies,
        );
        debug!(industry, prompt = %prompt, "recommendation prompt");

        let raw = backend.generate_one(prompt, &params).await?;
        debug!(industry, raw = %raw, "recommendation response");

        let value = if raw.trim().is_empty() {
            json!({ "summary": EMPTY_ANSWER })
        } else {
            extract_object(&raw)
        };
        recommendations.insert(industry.to_string(), value);
        generated += 1;
    }

    info!(
        industries = recommendations.len(),
        generated, "recommendations ready"
    );
    Ok(recommendations)
}
