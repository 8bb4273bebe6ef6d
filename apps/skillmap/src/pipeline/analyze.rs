//! Stage 1 batch runner: prompts the generation backend for every source
//! record and turns each raw response into a normalized competency list.
//!
//! Bad responses never fail the batch. They become records with no
//! competencies. A backend failure does fail it, before anything is written.

use tracing::{debug, info};

use crate::engine::extractor::extract;
use crate::engine::normalizer::normalize_strings;
use crate::errors::AppError;
use crate::llm_client::prompts::{project_prompt, vacancy_prompt};
use crate::llm_client::{BackendHandle, SamplingParams};
use crate::models::{CompetencyRecord, EntityKind, Population, SourceRecord};

/// Target for raw backend output, so it can be enabled on its own.
pub const RAW_RESPONSE_TARGET: &str = "skillmap::raw_response";

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub population: Population,
    pub batch_size: usize,
    /// How many raw responses to log per run.
    pub raw_log_limit: usize,
    pub params: SamplingParams,
}

impl AnalyzeOptions {
    pub fn new(population: Population, batch_size: usize, raw_log_limit: usize) -> Self {
        Self {
            population,
            batch_size: batch_size.max(1),
            raw_log_limit,
            params: SamplingParams::extraction(),
        }
    }
}

pub fn render_prompt(record: &SourceRecord, population: Population) -> String {
    match population.entity_kind() {
        EntityKind::Vacancy => vacancy_prompt(record),
        EntityKind::Project => project_prompt(record),
    }
}

/// Extracts and normalizes one raw response.
pub fn competencies_from_response(raw: &str) -> Vec<String> {
    normalize_strings(&extract(raw))
}

pub async fn analyze_population(
    records: &[SourceRecord],
    backend: &BackendHandle,
    options: &AnalyzeOptions,
) -> Result<Vec<CompetencyRecord>, AppError> {
    let kind = options.population.entity_kind();
    let total_batches = records.len().div_ceil(options.batch_size);
    let mut results = Vec::with_capacity(records.len());
    let mut logged = 0usize;
    let mut empty = 0usize;

    info!(
        %kind,
        model = backend.spec().served_model(),
        records = records.len(),
        batches = total_batches,
        "analysis started"
    );

    for (batch_no, batch) in records.chunks(options.batch_size).enumerate() {
        let prompts: Vec<String> = batch
            .iter()
            .map(|record| render_prompt(record, options.population))
            .collect();

        let raw_answers = backend.generate(&prompts, &options.params).await?;

        for (record, raw) in batch.iter().zip(&raw_answers) {
            if logged < options.raw_log_limit {
                debug!(target: RAW_RESPONSE_TARGET, %kind, id = %record.id, raw = %raw, "raw response");
                logged += 1;
            }
        }

        // Extraction is CPU-only and independent per response.
        let lists = tokio::task::spawn_blocking(move || {
            raw_answers
                .iter()
                .map(|raw| competencies_from_response(raw))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        for (record, competencies) in batch.iter().zip(lists) {
            if competencies.is_empty() {
                empty += 1;
            }
            results.push(CompetencyRecord::new(record, competencies));
        }

        debug!(%kind, batch = batch_no + 1, of = total_batches, "batch analysed");
    }

    info!(
        %kind,
        records = results.len(),
        without_competencies = empty,
        "analysis finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm_client::testing::{handle, ScriptedBackend};
    use crate::models::record::EntityId;
    use crate::models::RawCompetency;
    use pretty_assertions::assert_eq;

    fn source(id: i64, industry: &str) -> SourceRecord {
        SourceRecord {
            id: EntityId::Number(id),
            industry: Some(industry.into()),
            title: Some(format!("Record {id}")),
            description: Some("Description".into()),
            tech: None,
            skills_extracted: vec![],
        }
    }

    fn names(record: &CompetencyRecord) -> Vec<&str> {
        record
            .competencies
            .iter()
            .filter_map(RawCompetency::name)
            .collect()
    }

    #[tokio::test]
    async fn test_batches_cover_every_record_in_order() {
        let backend = Arc::new(ScriptedBackend::new([
            r#"["python", "SQL"]"#,
            "Here: [\"React\", \"js\"] done",
            "no idea",
        ]));
        let records = vec![source(1, "AI"), source(2, "Web"), source(3, "Retail")];
        let options = AnalyzeOptions::new(Population::Demand, 2, 1);

        let out = analyze_population(&records, &handle(backend.clone()), &options)
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(names(&out[0]), vec!["Python", "SQL"]);
        assert_eq!(names(&out[1]), vec!["React", "JavaScript"]);
        assert!(out[2].competencies.is_empty());
        assert_eq!(out[2].id, EntityId::Number(3));
        assert_eq!(out[1].industry.as_deref(), Some("Web"));

        let prompts = backend.prompts_seen.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("job postings"));
    }

    #[tokio::test]
    async fn test_project_population_uses_project_prompt() {
        let backend = Arc::new(ScriptedBackend::new([r#"["Unity/Unreal Engine"]"#]));
        let options = AnalyzeOptions::new(Population::Supply, 8, 0);

        let out = analyze_population(&[source(1, "GameDev")], &handle(backend.clone()), &options)
            .await
            .unwrap();

        assert_eq!(names(&out[0]), vec!["Unity", "Unreal Engine"]);
        assert!(backend.prompts_seen.lock().unwrap()[0].contains("training projects"));
    }

    #[tokio::test]
    async fn test_backend_failure_aborts() {
        let backend = Arc::new(ScriptedBackend::failing());
        let options = AnalyzeOptions::new(Population::Demand, 4, 0);
        let err = analyze_population(&[source(1, "AI")], &handle(backend), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()));
        let options = AnalyzeOptions::new(Population::Demand, 0, 0);
        assert_eq!(options.batch_size, 1);
        let out = analyze_population(&[], &handle(backend.clone()), &options)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(backend.prompts_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_competencies_from_response_drops_sentinel() {
        assert!(competencies_from_response(r#"["-"]"#).is_empty());
        assert_eq!(competencies_from_response(r#"["docker", "-"]"#), vec!["Docker"]);
    }
}
