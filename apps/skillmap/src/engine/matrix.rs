//! Matrix Builder: cross-joins demand and supply tables per industry and
//! classifies every competency as match, gap or redundant.
//!
//! Row order is (industry, competency), both lexicographic. Snapshots of the
//! matrix file are diffed across runs, so this order is part of the contract.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::engine::aggregator::{FrequencyTable, IndustryTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Demanded and supplied.
    Match,
    /// Demanded, never supplied.
    Gap,
    /// Supplied, never demanded.
    Redundant,
}

impl MatchStatus {
    /// `None` when neither side mentions the competency.
    pub fn classify(demand: u32, supply: u32) -> Option<Self> {
        match (demand > 0, supply > 0) {
            (true, true) => Some(MatchStatus::Match),
            (true, false) => Some(MatchStatus::Gap),
            (false, true) => Some(MatchStatus::Redundant),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub industry: String,
    pub competency: String,
    pub demand: u32,
    pub supply: u32,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapEntry {
    pub competency: String,
    pub demand: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyEntry {
    pub competency: String,
    pub supply: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub competency: String,
    pub demand: u32,
    pub supply: u32,
}

/// Per-industry rollup written to the gaps/redundancy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustrySummary {
    pub industry: String,
    /// Distinct competencies with nonzero demand.
    pub total_demand_competencies: usize,
    /// Distinct competencies with nonzero supply.
    pub total_supply_competencies: usize,
    pub gaps: Vec<GapEntry>,
    pub redundancies: Vec<RedundancyEntry>,
    pub matches: Vec<MatchEntry>,
}

impl IndustrySummary {
    fn empty(industry: &str) -> Self {
        Self {
            industry: industry.to_string(),
            total_demand_competencies: 0,
            total_supply_competencies: 0,
            gaps: Vec::new(),
            redundancies: Vec::new(),
            matches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixReport {
    pub rows: Vec<MatrixRow>,
    pub summaries: Vec<IndustrySummary>,
}

/// Builds the full matrix and per-industry summaries.
pub fn build(demand: &IndustryTables, supply: &IndustryTables) -> MatrixReport {
    let industries: BTreeSet<&String> = demand.keys().chain(supply.keys()).collect();

    let mut rows = Vec::new();
    let mut summaries = Vec::with_capacity(industries.len());

    for industry in industries {
        let (industry_rows, summary) =
            build_industry(industry, demand.get(industry), supply.get(industry));
        rows.extend(industry_rows);
        summaries.push(summary);
    }

    MatrixReport { rows, summaries }
}

/// Classifies one industry. Independent of every other industry.
pub fn build_industry(
    industry: &str,
    demand: Option<&FrequencyTable>,
    supply: Option<&FrequencyTable>,
) -> (Vec<MatrixRow>, IndustrySummary) {
    let count = |table: Option<&FrequencyTable>, competency: &str| {
        table.and_then(|t| t.get(competency)).copied().unwrap_or(0)
    };
    let competencies: BTreeSet<&String> = demand
        .into_iter()
        .chain(supply)
        .flat_map(|table| table.keys())
        .collect();

    let mut rows = Vec::with_capacity(competencies.len());
    let mut summary = IndustrySummary::empty(industry);

    for competency in competencies {
        let d = count(demand, competency);
        let s = count(supply, competency);
        let Some(status) = MatchStatus::classify(d, s) else {
            continue;
        };

        if d > 0 {
            summary.total_demand_competencies += 1;
        }
        if s > 0 {
            summary.total_supply_competencies += 1;
        }
        match status {
            MatchStatus::Match => summary.matches.push(MatchEntry {
                competency: competency.clone(),
                demand: d,
                supply: s,
            }),
            MatchStatus::Gap => summary.gaps.push(GapEntry {
                competency: competency.clone(),
                demand: d,
            }),
            MatchStatus::Redundant => summary.redundancies.push(RedundancyEntry {
                competency: competency.clone(),
                supply: s,
            }),
        }

        rows.push(MatrixRow {
            industry: industry.to_string(),
            competency: competency.clone(),
            demand: d,
            supply: s,
            status,
        });
    }

    (rows, summary)
}

/// Allowed competency names. Filters visibility of rows only; classification
/// is done before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist(HashSet<String>);

impl Whitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, competency: &str) -> bool {
        self.0.contains(competency)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filter_rows(&self, rows: &[MatrixRow]) -> Vec<MatrixRow> {
        rows.iter()
            .filter(|row| self.contains(&row.competency))
            .cloned()
            .collect()
    }
}
