//! Core domain model for the competitive intelligence pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const CRATE_NAME: &str = "intel-core";

/// Loosely-typed candidate record as emitted by a source adapter.
pub type RawRecord = serde_json::Map<String, JsonValue>;

/// Source category; one pipeline phase and one store table per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Talent,
    CompetitorMove,
    JobPosting,
    Patent,
    SupplierHealth,
    News,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Talent,
        Category::CompetitorMove,
        Category::JobPosting,
        Category::Patent,
        Category::SupplierHealth,
        Category::News,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Talent => "talent",
            Category::CompetitorMove => "competitor_move",
            Category::JobPosting => "job_posting",
            Category::Patent => "patent",
            Category::SupplierHealth => "supplier_health",
            Category::News => "news",
        }
    }

    /// Store table holding this category.
    pub fn table(self) -> &'static str {
        match self {
            Category::Talent => "talent_leads",
            Category::CompetitorMove => "competitor_moves",
            Category::JobPosting => "competitor_jobs",
            Category::Patent => "patents",
            Category::SupplierHealth => "supplier_monitoring",
            Category::News => "intelligence_feed",
        }
    }

    /// Column the store uses as the upsert conflict target.
    pub fn conflict_column(self) -> &'static str {
        match self {
            Category::Talent => "profile_url",
            Category::CompetitorMove => "move_key",
            Category::JobPosting => "job_id",
            Category::Patent => "patent_number",
            Category::SupplierHealth => "supplier_name",
            Category::News => "url",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Ordinal priority/risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which same-run source wins when two records disagree on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    FirstDeclaredWins,
    LastDeclaredWins,
}

macro_rules! record_variant {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$field_meta:meta])* $field:ident : $ty:ty),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// Field-by-field merge; `self` is the earlier-declared record.
            pub fn merge_from(&mut self, other: Self, policy: MergePolicy) {
                $(
                    match policy {
                        MergePolicy::FirstDeclaredWins => {
                            if self.$field.is_none() {
                                self.$field = other.$field;
                            }
                        }
                        MergePolicy::LastDeclaredWins => {
                            if other.$field.is_some() {
                                self.$field = other.$field;
                            }
                        }
                    }
                )*
            }

            pub fn populated_fields(&self) -> usize {
                0 $(+ usize::from(self.$field.is_some()))*
            }
        }
    };
}

record_variant!(
    /// A person worth recruiting.
    TalentLead {
        name: String,
        current_company: String,
        current_title: String,
        location: String,
        skills: Vec<String>,
        open_to_work: bool,
        years_experience: u32,
        github_login: String,
        notes: String,
    }
);

record_variant!(
    /// Contract award, funding event or other competitor activity.
    CompetitorMove {
        company: String,
        move_type: String,
        details: String,
        amount_usd: f64,
        date_detected: NaiveDate,
        source_url: String,
    }
);

record_variant!(
    JobPosting {
        company: String,
        title: String,
        location: String,
        department: String,
        url: String,
        posted_date: NaiveDate,
        strategic_signal: String,
    }
);

record_variant!(
    Patent {
        title: String,
        assignee: String,
        publication_date: NaiveDate,
        url: String,
        technology_area: String,
        #[serde(rename = "abstract")]
        abstract_text: String,
    }
);

record_variant!(
    /// Financial snapshot of a monitored supplier.
    SupplierHealth {
        ticker: String,
        stock_price: f64,
        price_change_percent: f64,
        market_cap: f64,
        profit_margin: f64,
        headline: String,
    }
);

record_variant!(
    NewsItem {
        headline: String,
        source: String,
        summary: String,
        published_at: DateTime<Utc>,
        entities: Vec<String>,
        topic: String,
        action_required: bool,
    }
);

/// Category-specific attributes of an intelligence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RecordFields {
    Talent(TalentLead),
    CompetitorMove(CompetitorMove),
    JobPosting(JobPosting),
    Patent(Patent),
    SupplierHealth(SupplierHealth),
    News(NewsItem),
}

#[derive(Debug, Error)]
#[error("cannot merge {right} fields into {left} record")]
pub struct CategoryMismatch {
    pub left: Category,
    pub right: Category,
}

impl RecordFields {
    pub fn category(&self) -> Category {
        match self {
            RecordFields::Talent(_) => Category::Talent,
            RecordFields::CompetitorMove(_) => Category::CompetitorMove,
            RecordFields::JobPosting(_) => Category::JobPosting,
            RecordFields::Patent(_) => Category::Patent,
            RecordFields::SupplierHealth(_) => Category::SupplierHealth,
            RecordFields::News(_) => Category::News,
        }
    }

    pub fn merge_from(
        &mut self,
        other: RecordFields,
        policy: MergePolicy,
    ) -> Result<(), CategoryMismatch> {
        match (self, other) {
            (RecordFields::Talent(a), RecordFields::Talent(b)) => a.merge_from(b, policy),
            (RecordFields::CompetitorMove(a), RecordFields::CompetitorMove(b)) => {
                a.merge_from(b, policy)
            }
            (RecordFields::JobPosting(a), RecordFields::JobPosting(b)) => a.merge_from(b, policy),
            (RecordFields::Patent(a), RecordFields::Patent(b)) => a.merge_from(b, policy),
            (RecordFields::SupplierHealth(a), RecordFields::SupplierHealth(b)) => {
                a.merge_from(b, policy)
            }
            (RecordFields::News(a), RecordFields::News(b)) => a.merge_from(b, policy),
            (left, right) => {
                return Err(CategoryMismatch {
                    left: left.category(),
                    right: right.category(),
                })
            }
        }
        Ok(())
    }

    pub fn populated_fields(&self) -> usize {
        match self {
            RecordFields::Talent(f) => f.populated_fields(),
            RecordFields::CompetitorMove(f) => f.populated_fields(),
            RecordFields::JobPosting(f) => f.populated_fields(),
            RecordFields::Patent(f) => f.populated_fields(),
            RecordFields::SupplierHealth(f) => f.populated_fields(),
            RecordFields::News(f) => f.populated_fields(),
        }
    }

    /// Populated fields as a JSON object, without the category tag. Absent fields are omitted.
    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(mut map)) => {
                map.remove("category");
                map.retain(|_, v| !v.is_null());
                map
            }
            _ => serde_json::Map::new(),
        }
    }
}

/// Normalized record, not yet scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelRecord {
    pub conflict_key: String,
    pub source_tag: String,
    pub discovered_at: DateTime<Utc>,
    pub fields: RecordFields,
}

impl IntelRecord {
    pub fn category(&self) -> Category {
        self.fields.category()
    }
}

/// A scoring rule that fired for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal")]
pub enum Signal {
    WatchListAffiliation,
    ExecutiveTitle,
    SeniorTitle,
    EngineerTitle,
    Availability,
    KeywordMatch { matches: u8 },
    StrategicAction,
    LargeAward,
    NotableAward,
    SeverePriceDrop,
    PriceDrop,
    Unprofitable,
    SmallCap,
    DistressKeyword,
    DistressedSupplierOverride,
}

/// Record after scoring; the only shape that carries a priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: IntelRecord,
    pub score: u8,
    pub priority: Priority,
    pub signals: Vec<Signal>,
}

impl ScoredRecord {
    pub fn category(&self) -> Category {
        self.record.category()
    }

    pub fn conflict_key(&self) -> &str {
        &self.record.conflict_key
    }
}
