//! Aggregator: folds per-entity competency lists into per-industry
//! frequency tables for one population.

use std::collections::BTreeMap;

use crate::engine::normalizer::normalize;
use crate::models::{CompetencyRecord, Population};

/// Competency name -> number of entities that list it.
pub type FrequencyTable = BTreeMap<String, u32>;

/// Industry -> frequency table. Ordered so downstream output is sorted.
pub type IndustryTables = BTreeMap<String, FrequencyTable>;

pub const UNKNOWN_INDUSTRY: &str = "Unknown";

const INDUSTRY_SEPARATOR: char = '/';

/// Industry keys an entity contributes to.
///
/// Demand records belong to exactly one industry. Supply records may carry a
/// compound tag ("AI/EdTech") and fan out to every listed industry.
pub fn industry_keys(industry: Option<&str>, population: Population) -> Vec<String> {
    let raw = industry.map(str::trim).unwrap_or_default();
    let keys: Vec<String> = match population {
        Population::Demand if raw.is_empty() => Vec::new(),
        Population::Demand => vec![raw.to_string()],
        Population::Supply => raw
            .split(INDUSTRY_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    };

    if keys.is_empty() {
        vec![UNKNOWN_INDUSTRY.to_string()]
    } else {
        keys
    }
}

/// Counts every normalized competency once per entity and industry key.
/// Fan-out is a full increment per industry, never a fractional share.
pub fn aggregate(records: &[CompetencyRecord], population: Population) -> IndustryTables {
    let mut tables = IndustryTables::new();

    for record in records {
        let competencies = normalize(&record.competencies);
        if competencies.is_empty() {
            continue;
        }
        for industry in industry_keys(record.industry.as_deref(), population) {
            let table = tables.entry(industry).or_default();
            for competency in &competencies {
                *table.entry(competency.clone()).or_default() += 1;
            }
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::EntityId;
    use crate::models::RawCompetency;
    use pretty_assertions::assert_eq;

    fn record(industry: Option<&str>, competencies: &[&str]) -> CompetencyRecord {
        CompetencyRecord {
            id: EntityId::Number(1),
            industry: industry.map(String::from),
            title: None,
            competencies: competencies.iter().copied().map(RawCompetency::from).collect(),
        }
    }

    #[test]
    fn test_supply_fan_out_is_full_increment() {
        let tables = aggregate(&[record(Some("AI/EdTech"), &["Python"])], Population::Supply);
        assert_eq!(tables["AI"]["Python"], 1);
        assert_eq!(tables["EdTech"]["Python"], 1);
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn test_demand_does_not_fan_out() {
        let tables = aggregate(&[record(Some("AI/EdTech"), &["Python"])], Population::Demand);
        assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["AI/EdTech"]);
    }

    #[test]
    fn test_missing_industry_becomes_unknown() {
        let records = vec![
            record(None, &["SQL"]),
            record(Some(""), &["SQL"]),
            record(Some(" / "), &["SQL"]),
        ];
        let demand = aggregate(&records, Population::Demand);
        assert_eq!(demand[UNKNOWN_INDUSTRY]["SQL"], 2);
        assert_eq!(demand["/"]["SQL"], 1);
        assert_eq!(aggregate(&records, Population::Supply)[UNKNOWN_INDUSTRY]["SQL"], 3);
    }

    #[test]
    fn test_counts_across_entities_after_normalization() {
        let records = vec![
            record(Some("FinTech"), &["python", "sql", "Python"]),
            record(Some("FinTech"), &["Python, Docker"]),
            record(Some("FinTech"), &["-"]),
        ];
        let tables = aggregate(&records, Population::Demand);
        let expected: FrequencyTable = [("Docker", 1), ("Python", 2), ("SQL", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(tables["FinTech"], expected);
    }

    #[test]
    fn test_entities_without_competencies_add_no_industry() {
        let tables = aggregate(&[record(Some("GameDev"), &[])], Population::Supply);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_industry_keys_trim_segments() {
        assert_eq!(
            industry_keys(Some(" AI / EdTech //GameDev "), Population::Supply),
            vec!["AI", "EdTech", "GameDev"]
        );
        assert_eq!(industry_keys(Some("  Retail "), Population::Demand), vec!["Retail"]);
    }
}
