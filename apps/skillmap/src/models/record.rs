use std::fmt;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Record identifier as it appears in the source files. Numeric ids stay
/// numeric when written back out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{n}"),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

/// Which side of the market a record set describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    /// Job postings.
    Demand,
    /// Training projects.
    Supply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Vacancy,
    Project,
}

impl Population {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Population::Demand => EntityKind::Vacancy,
            Population::Supply => EntityKind::Project,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Vacancy => f.write_str("vacancy"),
            EntityKind::Project => f.write_str("project"),
        }
    }
}

/// One competency as found in a record file. Older files carry
/// `{"name": ...}` objects instead of plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCompetency {
    Plain(String),
    Named { name: String },
    Other(Value),
}

impl RawCompetency {
    /// The competency name, if this entry carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            RawCompetency::Plain(s) => Some(s),
            RawCompetency::Named { name } => Some(name),
            RawCompetency::Other(_) => None,
        }
    }
}

impl From<String> for RawCompetency {
    fn from(value: String) -> Self {
        RawCompetency::Plain(value)
    }
}

impl From<&str> for RawCompetency {
    fn from(value: &str) -> Self {
        RawCompetency::Plain(value.to_string())
    }
}

/// A posting or project as collected, before competencies are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: EntityId,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free text or a list of technologies, depending on the collector.
    #[serde(default)]
    pub tech: Option<Value>,
    #[serde(default)]
    pub skills_extracted: Vec<String>,
}

impl SourceRecord {
    pub fn tech_text(&self) -> String {
        match &self.tech {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        }
    }
}

/// Row of a per-entity competency file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyRecord {
    #[serde(alias = "vacancy_id", alias = "project_id")]
    pub id: EntityId,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_competencies")]
    pub competencies: Vec<RawCompetency>,
}

impl CompetencyRecord {
    pub fn new(source: &SourceRecord, competencies: Vec<String>) -> Self {
        Self {
            id: source.id.clone(),
            industry: source.industry.clone(),
            title: source.title.clone(),
            competencies: competencies.into_iter().map(RawCompetency::Plain).collect(),
        }
    }
}

/// Accepts `null`, a single comma-joined string, or a list.
fn deserialize_competencies<'de, D>(deserializer: D) -> Result<Vec<RawCompetency>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![RawCompetency::Plain(s)]),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
            .collect(),
        Some(other) => Err(D::Error::custom(format!(
            "competencies must be a list or a string, got {other}"
        ))),
    }
}
