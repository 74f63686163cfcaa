//! Executive insight triggers evaluated over a finished run's aggregate counts.

use std::collections::BTreeMap;

use intel_core::{Category, Priority};
use serde::{Deserialize, Serialize};

use crate::config::InsightThresholds;

/// Per-category persisted totals plus the number of failed phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub persisted: BTreeMap<Category, usize>,
    pub by_priority: BTreeMap<Category, BTreeMap<Priority, usize>>,
    pub failed_phases: usize,
}

impl RunCounts {
    pub fn add(&mut self, category: Category, priority: Priority, count: usize) {
        *self.persisted.entry(category).or_default() += count;
        *self
            .by_priority
            .entry(category)
            .or_default()
            .entry(priority)
            .or_default() += count;
    }

    pub fn persisted(&self, category: Category) -> usize {
        self.persisted.get(&category).copied().unwrap_or(0)
    }

    /// Persisted records of `category` at `floor` or above.
    pub fn at_least(&self, category: Category, floor: Priority) -> usize {
        self.by_priority
            .get(&category)
            .map(|counts| counts.range(floor..).map(|(_, n)| n).sum())
            .unwrap_or(0)
    }

    pub fn exactly(&self, category: Category, priority: Priority) -> usize {
        self.by_priority
            .get(&category)
            .and_then(|counts| counts.get(&priority))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightTrigger {
    TalentSurge,
    CompetitorPatentActivity,
    CompetitorFunding,
    SupplierDistress,
    CompetitorHiringPush,
    ActionRequiredNews,
    TalentPipeline,
    SourceFailures,
}

impl InsightTrigger {
    pub const ALL: [InsightTrigger; 8] = [
        InsightTrigger::TalentSurge,
        InsightTrigger::CompetitorPatentActivity,
        InsightTrigger::CompetitorFunding,
        InsightTrigger::SupplierDistress,
        InsightTrigger::CompetitorHiringPush,
        InsightTrigger::ActionRequiredNews,
        InsightTrigger::TalentPipeline,
        InsightTrigger::SourceFailures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InsightTrigger::TalentSurge => "talent_surge",
            InsightTrigger::CompetitorPatentActivity => "competitor_patent_activity",
            InsightTrigger::CompetitorFunding => "competitor_funding",
            InsightTrigger::SupplierDistress => "supplier_distress",
            InsightTrigger::CompetitorHiringPush => "competitor_hiring_push",
            InsightTrigger::ActionRequiredNews => "action_required_news",
            InsightTrigger::TalentPipeline => "talent_pipeline",
            InsightTrigger::SourceFailures => "source_failures",
        }
    }

    pub fn recommended_action(self) -> &'static str {
        match self {
            InsightTrigger::TalentSurge => {
                "Schedule a recruiting push toward the affected talent pools this week"
            }
            InsightTrigger::CompetitorPatentActivity => {
                "Review new competitor patents for IP conflicts"
            }
            InsightTrigger::CompetitorFunding => {
                "Accelerate fundraising to keep pace with funded competitors"
            }
            InsightTrigger::SupplierDistress => "Qualify alternate suppliers for at-risk parts",
            InsightTrigger::CompetitorHiringPush => "Brief leadership on competitor hiring focus",
            InsightTrigger::ActionRequiredNews => "Triage flagged news items",
            InsightTrigger::TalentPipeline => "Reach out to new candidates before competitors do",
            InsightTrigger::SourceFailures => "Investigate failing source integrations",
        }
    }

    fn count(self, counts: &RunCounts) -> usize {
        match self {
            InsightTrigger::TalentSurge => counts.at_least(Category::Talent, Priority::High),
            InsightTrigger::CompetitorPatentActivity => {
                counts.at_least(Category::Patent, Priority::High)
            }
            InsightTrigger::CompetitorFunding => {
                counts.at_least(Category::CompetitorMove, Priority::High)
            }
            InsightTrigger::SupplierDistress => {
                counts.exactly(Category::SupplierHealth, Priority::Critical)
            }
            InsightTrigger::CompetitorHiringPush => {
                counts.at_least(Category::JobPosting, Priority::High)
            }
            InsightTrigger::ActionRequiredNews => counts.at_least(Category::News, Priority::High),
            InsightTrigger::TalentPipeline => counts.persisted(Category::Talent),
            InsightTrigger::SourceFailures => counts.failed_phases,
        }
    }

    fn threshold(self, thresholds: &InsightThresholds) -> usize {
        match self {
            InsightTrigger::TalentSurge => thresholds.talent_surge,
            InsightTrigger::CompetitorPatentActivity => thresholds.competitor_patent_activity,
            InsightTrigger::CompetitorFunding => thresholds.competitor_funding,
            InsightTrigger::SupplierDistress => thresholds.supplier_distress,
            InsightTrigger::CompetitorHiringPush => thresholds.competitor_hiring_push,
            InsightTrigger::ActionRequiredNews => thresholds.action_required_news,
            InsightTrigger::TalentPipeline => thresholds.talent_pipeline,
            InsightTrigger::SourceFailures => thresholds.source_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub trigger: InsightTrigger,
    pub count: usize,
    pub recommended_action: String,
}

/// Fired insights in fixed trigger order.
pub fn evaluate(counts: &RunCounts, thresholds: &InsightThresholds) -> Vec<Insight> {
    InsightTrigger::ALL
        .into_iter()
        .filter_map(|trigger| {
            let count = trigger.count(counts);
            (count > trigger.threshold(thresholds)).then(|| Insight {
                trigger,
                count,
                recommended_action: trigger.recommended_action().to_string(),
            })
        })
        .collect()
}
