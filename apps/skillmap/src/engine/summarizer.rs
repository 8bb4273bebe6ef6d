//! Gap/Redundancy Summarizer: top-N projections over the frequency tables
//! for reporting and recommendation consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::aggregator::{FrequencyTable, IndustryTables};
use crate::engine::matrix::{GapEntry, IndustrySummary};

pub const DEFAULT_TOP_N: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyCount {
    pub competency: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryStats {
    pub top_demand: Vec<CompetencyCount>,
    pub top_supply: Vec<CompetencyCount>,
    pub gaps: Vec<GapEntry>,
}

impl IndustryStats {
    pub fn has_data(&self) -> bool {
        !self.top_demand.is_empty() || !self.top_supply.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyStats {
    pub top_n: usize,
    pub industries: BTreeMap<String, IndustryStats>,
    pub global_top_demand: Vec<CompetencyCount>,
    pub global_top_supply: Vec<CompetencyCount>,
}

/// The `n` most frequent competencies: count descending, then name ascending.
pub fn top_n(table: &FrequencyTable, n: usize) -> Vec<CompetencyCount> {
    let mut counts: Vec<(&String, u32)> = table
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(name, count)| (name, *count))
        .collect();
    // BTreeMap iteration is already name-ordered; a stable sort keeps it for ties.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(n)
        .map(|(competency, count)| CompetencyCount {
            competency: competency.clone(),
            count,
        })
        .collect()
}

/// Sums one population's tables across all industries.
pub fn combine(tables: &IndustryTables) -> FrequencyTable {
    let mut combined = FrequencyTable::new();
    for table in tables.values() {
        for (competency, count) in table {
            *combined.entry(competency.clone()).or_default() += count;
        }
    }
    combined
}

pub fn summarize(
    demand: &IndustryTables,
    supply: &IndustryTables,
    summaries: &[IndustrySummary],
    n: usize,
) -> CompetencyStats {
    let empty = FrequencyTable::new();
    let industries = summaries
        .iter()
        .map(|summary| {
            let industry = &summary.industry;
            let stats = IndustryStats {
                top_demand: top_n(demand.get(industry).unwrap_or(&empty), n),
                top_supply: top_n(supply.get(industry).unwrap_or(&empty), n),
                gaps: summary.gaps.clone(),
            };
            (industry.clone(), stats)
        })
        .collect();

    CompetencyStats {
        top_n: n,
        industries,
        global_top_demand: top_n(&combine(demand), n),
        global_top_supply: top_n(&combine(supply), n),
    }
}
