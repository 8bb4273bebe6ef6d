//! Stages 2–5 over competency files: aggregate, build, filter, summarize,
//! then write every artifact.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::aggregator::aggregate;
use crate::engine::matrix::{build, MatchStatus, MatrixReport, MatrixRow, Whitelist};
use crate::engine::summarizer::{summarize, CompetencyStats};
use crate::errors::AppError;
use crate::models::{CompetencyRecord, Population};
use crate::pipeline::store::{ensure_exists, load_records, load_whitelist, write_json};

#[derive(Debug, Clone)]
pub struct MatrixInputs {
    pub vacancies: PathBuf,
    pub projects: PathBuf,
    pub whitelist: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MatrixOutputs {
    pub matrix: PathBuf,
    pub filtered_matrix: PathBuf,
    pub gaps: PathBuf,
    pub stats: PathBuf,
}

/// Everything derived from one pair of record sets.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixArtifacts {
    #[serde(flatten)]
    pub report: MatrixReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_rows: Option<Vec<MatrixRow>>,
    pub stats: CompetencyStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub vacancies: usize,
    pub projects: usize,
    pub industries: usize,
    pub rows: usize,
    pub filtered_rows: Option<usize>,
    pub matches: usize,
    pub gaps: usize,
    pub redundancies: usize,
}

/// Pure computation shared by the CLI and the HTTP API.
pub fn compute(
    vacancies: &[CompetencyRecord],
    projects: &[CompetencyRecord],
    whitelist: Option<&Whitelist>,
    top_n: usize,
) -> MatrixArtifacts {
    let demand = aggregate(vacancies, Population::Demand);
    let supply = aggregate(projects, Population::Supply);
    let report = build(&demand, &supply);
    let filtered_rows = whitelist.map(|w| w.filter_rows(&report.rows));
    let stats = summarize(&demand, &supply, &report.summaries, top_n);

    MatrixArtifacts {
        report,
        filtered_rows,
        stats,
    }
}

pub fn run_matrix(
    inputs: &MatrixInputs,
    outputs: &MatrixOutputs,
    top_n: usize,
) -> Result<RunReport, AppError> {
    ensure_exists(
        [inputs.vacancies.as_path(), inputs.projects.as_path()]
            .into_iter()
            .chain(inputs.whitelist.as_deref()),
    )?;

    let vacancies: Vec<CompetencyRecord> = load_records(&inputs.vacancies)?;
    let projects: Vec<CompetencyRecord> = load_records(&inputs.projects)?;
    let whitelist = inputs.whitelist.as_deref().map(load_whitelist).transpose()?;

    let (report, _) = write_artifacts(&vacancies, &projects, whitelist.as_ref(), outputs, top_n)?;
    Ok(report)
}

/// Computes over records already in memory and writes every matrix artifact.
pub fn write_artifacts(
    vacancies: &[CompetencyRecord],
    projects: &[CompetencyRecord],
    whitelist: Option<&Whitelist>,
    outputs: &MatrixOutputs,
    top_n: usize,
) -> Result<(RunReport, MatrixArtifacts), AppError> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();

    let artifacts = compute(vacancies, projects, whitelist, top_n);

    write_json(&outputs.matrix, &artifacts.report.rows)?;
    if let Some(filtered) = &artifacts.filtered_rows {
        write_json(&outputs.filtered_matrix, filtered)?;
    }
    write_json(&outputs.gaps, &artifacts.report.summaries)?;
    write_json(&outputs.stats, &artifacts.stats)?;

    let report = RunReport::new(run_id, started_at, vacancies, projects, &artifacts);
    info!(
        run_id = %report.run_id,
        industries = report.industries,
        rows = report.rows,
        matches = report.matches,
        gaps = report.gaps,
        redundancies = report.redundancies,
        "competency matrix built"
    );
    Ok((report, artifacts))
}

impl RunReport {
    fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        vacancies: &[CompetencyRecord],
        projects: &[CompetencyRecord],
        artifacts: &MatrixArtifacts,
    ) -> Self {
        let rows = &artifacts.report.rows;
        let count = |status: MatchStatus| rows.iter().filter(|r| r.status == status).count();
        Self {
            run_id,
            started_at,
            vacancies: vacancies.len(),
            projects: projects.len(),
            industries: artifacts.report.summaries.len(),
            rows: rows.len(),
            filtered_rows: artifacts.filtered_rows.as_ref().map(Vec::len),
            matches: count(MatchStatus::Match),
            gaps: count(MatchStatus::Gap),
            redundancies: count(MatchStatus::Redundant),
        }
    }
}
