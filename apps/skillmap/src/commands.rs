//! Subcommand handlers. Each one resolves its paths against the configured
//! data directory, runs one or more pipeline stages, and prints a JSON
//! summary on stdout.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::cli::{
    AnalyzeArgs, Commands, ExtractArgs, MatrixArgs, RecommendArgs, RunArgs, ServeArgs,
};
use crate::config::{Config, Paths};
use crate::engine::extractor::{extract, extract_object};
use crate::engine::matrix::{IndustrySummary, Whitelist};
use crate::engine::normalizer::normalize_strings;
use crate::engine::summarizer::CompetencyStats;
use crate::errors::AppError;
use crate::llm_client::{BackendHandle, BackendSpec, GenerationError};
use crate::models::{Population, SourceRecord};
use crate::pipeline::analyze::{analyze_population, AnalyzeOptions};
use crate::pipeline::matrix_run::{
    run_matrix, write_artifacts, MatrixInputs, MatrixOutputs, RunReport,
};
use crate::pipeline::recommend::recommend;
use crate::pipeline::store::{
    ensure_exists, load_document, load_records, load_whitelist, write_json,
};
use crate::routes::build_router;
use crate::state::AppState;

pub async fn dispatch(command: Commands, config: &Config) -> anyhow::Result<()> {
    let acquire = BackendHandle::acquire;
    match command {
        Commands::Analyze(args) => analyze(args, config, &acquire).await?,
        Commands::Matrix(args) => print_json(&matrix(args, config)?)?,
        Commands::Recommend(args) => recommend_industries(args, config, &acquire).await?,
        Commands::Run(args) => run(args, config, &acquire).await?,
        Commands::Extract(args) => extract_response(args)?,
        Commands::Serve(args) => serve(args, config).await?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn competency_path(paths: &Paths, population: Population) -> PathBuf {
    match population {
        Population::Demand => paths.vacancy_competencies.clone(),
        Population::Supply => paths.project_competencies.clone(),
    }
}

/// Only the vacancy pass runs on an adapter unless one is given explicitly.
fn backend_spec(config: &Config, population: Population, adapter: Option<String>) -> BackendSpec {
    let adapter = adapter.or_else(|| match population {
        Population::Demand => config.vacancy_adapter.clone(),
        Population::Supply => None,
    });
    BackendSpec::from_config(config).with_adapter(adapter)
}

fn positive_top_n(top_n: Option<usize>, config: &Config) -> Result<usize, AppError> {
    match top_n.unwrap_or(config.top_n) {
        0 => Err(AppError::Validation("top_n must be positive".to_string())),
        n => Ok(n),
    }
}

async fn analyze<A>(args: AnalyzeArgs, config: &Config, acquire: &A) -> Result<(), AppError>
where
    A: Fn(BackendSpec) -> Result<BackendHandle, GenerationError>,
{
    let population = Population::from(args.population);
    let output = args
        .output
        .unwrap_or_else(|| competency_path(&config.paths(), population));
    let records: Vec<SourceRecord> = load_records(&args.input)?;
    let options = AnalyzeOptions::new(
        population,
        args.batch_size.unwrap_or(config.batch_size),
        config.raw_log_limit,
    );

    let backend = acquire(backend_spec(config, population, args.adapter))?;
    let result = analyze_population(&records, &backend, &options).await;
    backend.release().await;

    let competencies = result?;
    write_json(&output, &competencies)?;
    println!(
        "{}",
        json!({ "records": competencies.len(), "output": output.display().to_string() })
    );
    Ok(())
}

fn matrix(args: MatrixArgs, config: &Config) -> Result<RunReport, AppError> {
    let paths = config.paths();
    let top_n = positive_top_n(args.top_n, config)?;
    let inputs = MatrixInputs {
        vacancies: args.vacancies.unwrap_or(paths.vacancy_competencies.clone()),
        projects: args.projects.unwrap_or(paths.project_competencies.clone()),
        whitelist: args.whitelist.or_else(|| config.whitelist.clone()),
    };
    run_matrix(&inputs, &matrix_outputs(&paths), top_n)
}

fn matrix_outputs(paths: &Paths) -> MatrixOutputs {
    MatrixOutputs {
        matrix: paths.matrix.clone(),
        filtered_matrix: paths.filtered_matrix.clone(),
        gaps: paths.gaps.clone(),
        stats: paths.stats.clone(),
    }
}

async fn recommend_industries<A>(
    args: RecommendArgs,
    config: &Config,
    acquire: &A,
) -> Result<(), AppError>
where
    A: Fn(BackendSpec) -> Result<BackendHandle, GenerationError>,
{
    let paths = config.paths();
    let gaps = args.gaps.unwrap_or(paths.gaps);
    let stats = args.stats.unwrap_or(paths.stats);
    let output = args.output.unwrap_or(paths.recommendations);
    ensure_exists([gaps.as_path(), stats.as_path()])?;

    let summaries: Vec<IndustrySummary> = load_records(&gaps)?;
    let stats: CompetencyStats = load_document(&stats)?;

    let backend = acquire(BackendSpec::from_config(config))?;
    let result = recommend(&summaries, &stats, &backend).await;
    backend.release().await;

    let recommendations = result?;
    write_json(&output, &recommendations)?;
    println!(
        "{}",
        json!({ "industries": recommendations.len(), "output": output.display().to_string() })
    );
    Ok(())
}

/// Full pipeline. Every input is loaded and validated before the backend is
/// acquired; the same handle is switched from the vacancy adapter to the base
/// model and released on every exit path. Competency files are written only
/// after both analysis passes succeed.
async fn run<A>(args: RunArgs, config: &Config, acquire: &A) -> Result<(), AppError>
where
    A: Fn(BackendSpec) -> Result<BackendHandle, GenerationError>,
{
    let whitelist_path = args.whitelist.or_else(|| config.whitelist.clone());
    let top_n = positive_top_n(args.top_n, config)?;
    ensure_exists(
        [args.vacancies_source.as_path(), args.projects_source.as_path()]
            .into_iter()
            .chain(whitelist_path.as_deref()),
    )?;

    let vacancies: Vec<SourceRecord> = load_records(&args.vacancies_source)?;
    let projects: Vec<SourceRecord> = load_records(&args.projects_source)?;
    let whitelist = whitelist_path.as_deref().map(load_whitelist).transpose()?;

    let mut backend = Some(acquire(backend_spec(config, Population::Demand, None))?);
    let result = run_stages(
        &mut backend,
        &vacancies,
        &projects,
        whitelist.as_ref(),
        top_n,
        config,
        acquire,
    )
    .await;
    if let Some(backend) = backend {
        backend.release().await;
    }
    let report = result?;

    print_json(&report).map_err(AppError::Internal)
}

async fn run_stages<A>(
    backend: &mut Option<BackendHandle>,
    vacancies: &[SourceRecord],
    projects: &[SourceRecord],
    whitelist: Option<&Whitelist>,
    top_n: usize,
    config: &Config,
    acquire: &A,
) -> Result<RunReport, AppError>
where
    A: Fn(BackendSpec) -> Result<BackendHandle, GenerationError>,
{
    let paths = config.paths();
    let options =
        |population| AnalyzeOptions::new(population, config.batch_size, config.raw_log_limit);

    let handle = backend.as_ref().ok_or(GenerationError::Released)?;
    let vacancy_competencies =
        analyze_population(vacancies, handle, &options(Population::Demand)).await?;

    let current = backend.take().ok_or(GenerationError::Released)?;
    let base = backend_spec(config, Population::Supply, None);
    let handle = backend.insert(current.switch_with(base, acquire).await?);
    let project_competencies =
        analyze_population(projects, handle, &options(Population::Supply)).await?;

    write_json(&paths.vacancy_competencies, &vacancy_competencies)?;
    write_json(&paths.project_competencies, &project_competencies)?;

    let (report, artifacts) = write_artifacts(
        &vacancy_competencies,
        &project_competencies,
        whitelist,
        &matrix_outputs(&paths),
        top_n,
    )?;

    let recommendations = recommend(&artifacts.report.summaries, &artifacts.stats, handle).await?;
    write_json(&paths.recommendations, &recommendations)?;

    Ok(report)
}

fn extract_response(args: ExtractArgs) -> anyhow::Result<()> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    print_json(&render_extraction(&raw, &args))
}

fn render_extraction(raw: &str, args: &ExtractArgs) -> serde_json::Value {
    if args.object {
        return extract_object(raw);
    }
    let competencies = extract(raw);
    if args.raw {
        json!(competencies)
    } else {
        json!(normalize_strings(&competencies))
    }
}

async fn serve(args: ServeArgs, config: &Config) -> anyhow::Result<()> {
    let state = AppState {
        config: config.clone(),
    };
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port.unwrap_or(config.port)).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::tempdir;

    use super::*;
    use crate::cli::PopulationArg;
    use crate::llm_client::testing::ScriptedBackend;

    fn config(data_dir: &std::path::Path) -> Config {
        let mut config = AppState::for_tests().config;
        config.data_dir = data_dir.to_path_buf();
        config.vacancy_adapter = Some("vacancy-lora".to_string());
        config
    }

    fn read(path: &std::path::Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_run_switches_adapter_and_writes_every_artifact() {
        let dir = tempdir().unwrap();
        let vacancies = dir.path().join("vacancies.json");
        let projects = dir.path().join("projects.json");
        fs::write(
            &vacancies,
            r#"[{"id": 1, "industry": "AI", "title": "ML engineer", "description": "Models"}]"#,
        )
        .unwrap();
        fs::write(
            &projects,
            r#"[{"id": 10, "industry": "AI/EdTech", "title": "Tutor", "description": "Bots"}]"#,
        )
        .unwrap();

        let backend = Arc::new(ScriptedBackend::new([
            r#"["Python", "SQL"]"#,
            r#"["python"]"#,
            r#"{"add": ["SQL"], "summary": "Teach SQL"}"#,
        ]));
        let acquired = Mutex::new(Vec::new());
        let acquire = |spec: BackendSpec| {
            acquired.lock().unwrap().push(spec.served_model().to_string());
            Ok(BackendHandle::from_backend(spec, backend.clone()))
        };
        let config = config(dir.path());

        run(
            RunArgs {
                vacancies_source: vacancies,
                projects_source: projects,
                whitelist: None,
                top_n: None,
            },
            &config,
            &acquire,
        )
        .await
        .unwrap();

        assert_eq!(*acquired.lock().unwrap(), vec!["vacancy-lora", "test-model"]);
        assert!(backend.was_released());

        let paths = config.paths();
        assert_eq!(
            read(&paths.vacancy_competencies),
            serde_json::json!([{"id": 1, "industry": "AI", "title": "ML engineer", "competencies": ["Python", "SQL"]}])
        );
        assert_eq!(read(&paths.matrix).as_array().unwrap().len(), 3);
        let recommendations = read(&paths.recommendations);
        assert_eq!(recommendations["AI"]["add"], serde_json::json!(["SQL"]));
        assert_eq!(recommendations["EdTech"], serde_json::json!(crate::pipeline::recommend::NO_GAPS));
        assert!(!paths.filtered_matrix.exists());
    }

    #[tokio::test]
    async fn test_run_with_missing_source_never_acquires() {
        let dir = tempdir().unwrap();
        let vacancies = dir.path().join("vacancies.json");
        fs::write(&vacancies, "[]").unwrap();
        let acquire = |_spec: BackendSpec| -> Result<BackendHandle, GenerationError> {
            panic!("backend must not be acquired")
        };

        let err = run(
            RunArgs {
                vacancies_source: vacancies,
                projects_source: dir.path().join("absent.json"),
                whitelist: None,
                top_n: None,
            },
            &config(dir.path()),
            &acquire,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MissingResource { .. }));
    }

    fn seed_previous_run(config: &Config) -> String {
        let paths = config.paths();
        let good = r#"[{"id": 99, "industry": "Old", "competencies": ["Good"]}]"#;
        fs::create_dir_all(paths.vacancy_competencies.parent().unwrap()).unwrap();
        fs::write(&paths.vacancy_competencies, good).unwrap();
        fs::write(&paths.project_competencies, good).unwrap();
        good.to_string()
    }

    fn write_sources(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let vacancies = dir.join("vacancies.json");
        let projects = dir.join("projects.json");
        fs::write(&vacancies, r#"[{"id": 1, "industry": "AI"}]"#).unwrap();
        fs::write(&projects, r#"[{"id": 10, "industry": "AI"}]"#).unwrap();
        (vacancies, projects)
    }

    #[tokio::test]
    async fn test_run_with_malformed_whitelist_keeps_previous_artifacts() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let good = seed_previous_run(&config);
        let (vacancies, projects) = write_sources(dir.path());
        let whitelist = dir.path().join("whitelist.json");
        fs::write(&whitelist, r#"{"not": "a list"}"#).unwrap();
        let acquire = |_spec: BackendSpec| -> Result<BackendHandle, GenerationError> {
            panic!("backend must not be acquired")
        };

        let err = run(
            RunArgs {
                vacancies_source: vacancies,
                projects_source: projects,
                whitelist: Some(whitelist),
                top_n: None,
            },
            &config,
            &acquire,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MalformedInput { .. }));
        let paths = config.paths();
        assert_eq!(fs::read_to_string(&paths.vacancy_competencies).unwrap(), good);
        assert_eq!(fs::read_to_string(&paths.project_competencies).unwrap(), good);
        assert!(!paths.matrix.exists());
    }

    #[tokio::test]
    async fn test_run_failing_project_pass_writes_no_competency_file() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let good = seed_previous_run(&config);
        let (vacancies, projects) = write_sources(dir.path());
        let vacancy_backend = Arc::new(ScriptedBackend::new([r#"["Python"]"#]));
        let project_backend = Arc::new(ScriptedBackend::failing());
        let acquire = |spec: BackendSpec| -> Result<BackendHandle, GenerationError> {
            let backend = if spec.adapter.is_some() {
                vacancy_backend.clone()
            } else {
                project_backend.clone()
            };
            Ok(BackendHandle::from_backend(spec, backend))
        };

        let err = run(
            RunArgs {
                vacancies_source: vacancies,
                projects_source: projects,
                whitelist: None,
                top_n: None,
            },
            &config,
            &acquire,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Generation(_)));
        assert!(vacancy_backend.was_released());
        assert!(project_backend.was_released());
        let paths = config.paths();
        assert_eq!(fs::read_to_string(&paths.vacancy_competencies).unwrap(), good);
        assert_eq!(fs::read_to_string(&paths.project_competencies).unwrap(), good);
    }

    #[tokio::test]
    async fn test_failed_analysis_still_releases_backend() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("projects.json");
        fs::write(&input, r#"[{"id": 1, "industry": "AI"}]"#).unwrap();
        let backend = Arc::new(ScriptedBackend::failing());
        let acquire = |spec: BackendSpec| Ok(BackendHandle::from_backend(spec, backend.clone()));

        let err = analyze(
            AnalyzeArgs {
                population: PopulationArg::Projects,
                input,
                output: None,
                adapter: None,
                batch_size: None,
            },
            &config(dir.path()),
            &acquire,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Generation(_)));
        assert!(backend.was_released());
        assert!(!config(dir.path()).paths().project_competencies.exists());
    }

    #[test]
    fn test_matrix_rejects_zero_top_n() {
        let dir = tempdir().unwrap();
        let args = MatrixArgs {
            vacancies: None,
            projects: None,
            whitelist: None,
            top_n: Some(0),
        };
        assert!(matches!(
            matrix(args, &config(dir.path())).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_backend_spec_uses_adapter_for_vacancies_only() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        assert_eq!(
            backend_spec(&config, Population::Demand, None).served_model(),
            "vacancy-lora"
        );
        assert_eq!(
            backend_spec(&config, Population::Supply, None).served_model(),
            "test-model"
        );
        assert_eq!(
            backend_spec(&config, Population::Supply, Some("other".into())).served_model(),
            "other"
        );
    }

    #[test]
    fn test_render_extraction_modes() {
        let args = |object, raw| ExtractArgs {
            input: None,
            object,
            raw,
        };
        let text = r#"Answer: ["js", "-"]"#;
        assert_eq!(render_extraction(text, &args(false, false)), serde_json::json!(["JavaScript"]));
        assert_eq!(render_extraction(text, &args(false, true)), serde_json::json!(["js", "-"]));
        assert_eq!(
            render_extraction("No JSON here", &args(true, false)),
            serde_json::json!({"summary": "No JSON here"})
        );
    }
}
