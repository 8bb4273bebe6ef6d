// Prompt templates for the generation backend. Rendering is single-pass
// placeholder substitution. Competency prompts ask for a JSON array of
// strings; the extractor copes with whatever comes back.

use crate::engine::matrix::{GapEntry, RedundancyEntry};
use crate::engine::summarizer::CompetencyCount;
use crate::models::SourceRecord;

pub const VACANCY_DESCRIPTION_MAX_CHARS: usize = 4000;
pub const PROJECT_DESCRIPTION_MAX_CHARS: usize = 5000;

/// Output contract appended to every competency prompt.
pub const JSON_ARRAY_ONLY: &str = "\
    Respond with a JSON array of strings only, one competency per element, \
    for example [\"Python\", \"SQL\"]. \
    Do NOT add explanations, numbering, or markdown code fences. \
    If no competency can be identified, respond with [].";

pub const VACANCY_COMPETENCIES_PROMPT: &str = "\
You analyse job postings and list the professional competencies they require.

Industry: {industry}
Job title: {title}
Skills already tagged by the job board: {skills_extracted}

Posting:
{description}

List the concrete technologies, tools, and skills a candidate needs for this job.
{output_contract}";

pub const PROJECT_COMPETENCIES_PROMPT: &str = "\
You analyse student training projects and list the competencies a participant develops.

Project title: {title}
Industry: {industry}
Declared technologies: {tech}

Description:
{description}

List the concrete technologies, tools, and skills a participant practises in this project.
{output_contract}";

pub const RECOMMENDATIONS_PROMPT: &str = "\
You advise a training programme on how to align its projects with the job market.

Industry: {industry}
Most demanded competencies in job postings: {industry_stats}
Most practised competencies in training projects: {project_stats}
Demanded but never practised (gaps): {gaps}
Practised but never demanded (redundant): {redundancy}

Recommend which competencies new projects should cover and which are over-represented.
Respond with a JSON object with the keys \"add\", \"reduce\" and \"summary\".";

pub fn vacancy_prompt(record: &SourceRecord) -> String {
    let skills = record.skills_extracted.join(", ");
    render(
        VACANCY_COMPETENCIES_PROMPT,
        &[
            ("industry", record.industry.as_deref().unwrap_or("")),
            ("title", record.title.as_deref().unwrap_or("")),
            ("skills_extracted", &skills),
            (
                "description",
                truncate_chars(
                    record.description.as_deref().unwrap_or(""),
                    VACANCY_DESCRIPTION_MAX_CHARS,
                ),
            ),
            ("output_contract", JSON_ARRAY_ONLY),
        ],
    )
}

pub fn project_prompt(record: &SourceRecord) -> String {
    let tech = record.tech_text();
    render(
        PROJECT_COMPETENCIES_PROMPT,
        &[
            ("title", record.title.as_deref().unwrap_or("")),
            ("industry", record.industry.as_deref().unwrap_or("")),
            ("tech", &tech),
            (
                "description",
                truncate_chars(
                    record.description.as_deref().unwrap_or(""),
                    PROJECT_DESCRIPTION_MAX_CHARS,
                ),
            ),
            ("output_contract", JSON_ARRAY_ONLY),
        ],
    )
}

pub fn recommendation_prompt(
    industry: &str,
    top_demand: &[CompetencyCount],
    top_supply: &[CompetencyCount],
    gaps: &[GapEntry],
    redundancies: &[RedundancyEntry],
) -> String {
    let counts = |items: &[CompetencyCount]| {
        join_or_none(items.iter().map(|c| format!("{} ({})", c.competency, c.count)))
    };
    let industry_stats = counts(top_demand);
    let project_stats = counts(top_supply);
    let gaps = join_or_none(gaps.iter().map(|g| format!("{} ({})", g.competency, g.demand)));
    let redundancy = join_or_none(
        redundancies
            .iter()
            .map(|r| format!("{} ({})", r.competency, r.supply)),
    );
    render(
        RECOMMENDATIONS_PROMPT,
        &[
            ("industry", industry),
            ("industry_stats", &industry_stats),
            ("project_stats", &project_stats),
            ("gaps", &gaps),
            ("redundancy", &redundancy),
        ],
    )
}

/// Fills `{name}` placeholders in one pass over the template. Substituted
/// text is never rescanned, and unknown placeholders are left as they are.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let filled = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match filled {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn join_or_none(items: impl Iterator<Item = String>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
