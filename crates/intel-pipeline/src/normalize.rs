//! Raw adapter output to canonical [`IntelRecord`]s. Parsing is permissive: a malformed field
//! becomes `None`, and only a missing conflict key drops the record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use intel_core::{
    Category, CompetitorMove, IntelRecord, JobPosting, NewsItem, Patent, RawRecord, RecordFields,
    SupplierHealth, TalentLead,
};
use serde_json::Value as JsonValue;

use crate::terms::{self, any_term, classify};

pub fn parse_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric JSON, or a string carrying `$`, `,`, `%` or whitespace decoration.
pub fn parse_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | '%') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

pub fn parse_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "1" | "y" => Some(true),
            "no" | "false" | "0" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Array of scalars, or a comma-separated string.
pub fn parse_list(value: &JsonValue) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        JsonValue::Array(items) => items.iter().filter_map(parse_text).collect(),
        JsonValue::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    (!items.is_empty()).then_some(items)
}

/// RFC 3339, RFC 2822, `YYYY-MM-DD` or a naive ISO timestamp (taken as UTC).
pub fn parse_datetime(value: &JsonValue) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_date(value: &JsonValue) -> Option<NaiveDate> {
    if let Some(s) = value.as_str() {
        if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    parse_datetime(value).map(|dt| dt.date_naive())
}

/// Trimmed, lower-cased, without fragment or trailing slashes.
pub fn normalize_url(value: &str) -> Option<String> {
    let lowered = value.trim().to_lowercase();
    let without_fragment = lowered.split('#').next().unwrap_or_default();
    let url = without_fragment.trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

fn collapse_whitespace(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

struct Fields<'a>(&'a RawRecord);

impl Fields<'_> {
    /// First value among `keys`, in alias order, that `parse` accepts.
    fn first<T>(&self, keys: &[&str], parse: impl Fn(&JsonValue) -> Option<T>) -> Option<T> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(parse)
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        self.first(keys, parse_text)
    }

    fn number(&self, keys: &[&str]) -> Option<f64> {
        self.first(keys, parse_number)
    }

    fn flag(&self, keys: &[&str]) -> Option<bool> {
        self.first(keys, parse_bool)
    }

    fn list(&self, keys: &[&str]) -> Option<Vec<String>> {
        self.first(keys, parse_list)
    }

    fn date(&self, keys: &[&str]) -> Option<NaiveDate> {
        self.first(keys, parse_date)
    }

    fn datetime(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.first(keys, parse_datetime)
    }

    fn url(&self, keys: &[&str]) -> Option<String> {
        self.first(keys, |v| parse_text(v).and_then(|u| normalize_url(&u)))
    }
}

fn joined(parts: &[Option<&str>]) -> String {
    parts.iter().flatten().copied().collect::<Vec<_>>().join(" ")
}

/// Map one raw candidate into the canonical record for `category`. `None` when no conflict key
/// can be derived.
pub fn normalize(
    category: Category,
    raw: &RawRecord,
    source_tag: &str,
    now: DateTime<Utc>,
) -> Option<IntelRecord> {
    let f = Fields(raw);
    let (conflict_key, fields) = match category {
        Category::Talent => {
            let key = f.url(&["profile_url", "linkedin_url", "github_url", "url"])?;
            let fields = TalentLead {
                name: f.text(&["name"]),
                current_company: f.text(&["current_company", "company"]),
                current_title: f.text(&["current_title", "title", "role"]),
                location: f.text(&["location"]),
                skills: f.list(&["skills", "key_skills"]),
                open_to_work: f.flag(&["open_to_work", "is_open_to_work"]),
                years_experience: f
                    .number(&["years_experience"])
                    .filter(|n| *n >= 0.0)
                    .map(|n| n.round() as u32),
                github_login: f.text(&["github_login"]),
                notes: f.text(&["notes", "bio", "snippet"]),
            };
            (key, RecordFields::Talent(fields))
        }
        Category::CompetitorMove => {
            let fields = CompetitorMove {
                company: f.text(&["company", "recipient_name"]),
                move_type: f.text(&["move_type", "news_type"]),
                details: f.text(&["details", "description"]),
                amount_usd: f.number(&["amount_usd", "award_amount"]),
                date_detected: f.date(&["date_detected", "action_date"]),
                source_url: f.text(&["source_url"]),
            };
            let key = match f.text(&["move_id", "award_id"]) {
                Some(id) => id,
                None => {
                    let company = fields.company.as_deref()?;
                    let date = fields.date_detected.map(|d| d.to_string());
                    [
                        Some(company),
                        fields.move_type.as_deref(),
                        date.as_deref(),
                        fields.details.as_deref(),
                    ]
                    .iter()
                    .map(|part| part.unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join("|")
                    .to_lowercase()
                }
            };
            (key, RecordFields::CompetitorMove(fields))
        }
        Category::JobPosting => {
            let url = f.url(&["url"]);
            let key = f.text(&["job_id"]).or_else(|| url.clone())?;
            let title = f.text(&["title"]);
            let strategic_signal = f.text(&["strategic_signal"]).or_else(|| {
                title
                    .as_deref()
                    .map(|t| classify(t, terms::JOB_SIGNALS, "General Hiring").to_string())
            });
            let fields = JobPosting {
                company: f.text(&["company"]),
                title,
                location: f.text(&["location"]),
                department: f.text(&["department"]),
                url: f.text(&["url"]),
                posted_date: f.date(&["posted_date"]),
                strategic_signal,
            };
            (key, RecordFields::JobPosting(fields))
        }
        Category::Patent => {
            let key: String = f
                .text(&["patent_number", "publication_number"])?
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase();
            let title = f.text(&["title"]);
            let technology_area = f.text(&["technology_area"]).or_else(|| {
                let query = f.text(&["search_query"]);
                let text = joined(&[title.as_deref(), query.as_deref()]);
                (!text.is_empty()).then(|| {
                    classify(&text, terms::TECHNOLOGY_AREAS, "General Aerospace").to_string()
                })
            });
            let fields = Patent {
                title,
                assignee: f.text(&["assignee"]),
                publication_date: f.date(&["publication_date", "filing_date"]),
                url: f.text(&["url"]),
                technology_area,
                abstract_text: f.text(&["abstract", "summary"]),
            };
            (key, RecordFields::Patent(fields))
        }
        Category::SupplierHealth => {
            let key = f.text(&["supplier_name", "name"]).and_then(|n| collapse_whitespace(&n))?;
            let fields = SupplierHealth {
                ticker: f.text(&["ticker", "ticker_symbol", "symbol"]).map(|t| t.to_uppercase()),
                stock_price: f.number(&["stock_price", "price"]),
                price_change_percent: f.number(&["price_change_percent", "change_percent"]),
                market_cap: f.number(&["market_cap"]),
                profit_margin: f.number(&["profit_margin"]),
                headline: f.text(&["headline", "last_news_headline"]),
            };
            (key, RecordFields::SupplierHealth(fields))
        }
        Category::News => {
            let key = f.url(&["url", "link"])?;
            let headline = f.text(&["headline", "title"]);
            let summary = f.text(&["summary"]);
            let text = joined(&[headline.as_deref(), summary.as_deref()]);
            let topic = f.text(&["topic"]).or_else(|| {
                (!text.is_empty())
                    .then(|| classify(&text, terms::NEWS_TOPICS, "INDUSTRY").to_string())
            });
            let action_required = f.flag(&["action_required"]).or_else(|| {
                (!text.is_empty()).then(|| any_term(&text, terms::STRATEGIC_ACTIONS))
            });
            let fields = NewsItem {
                headline,
                source: f.text(&["source"]),
                summary,
                published_at: f.datetime(&["published_at", "published_date"]),
                entities: f.list(&["entities"]),
                topic,
                action_required,
            };
            (key, RecordFields::News(fields))
        }
    };

    if conflict_key.trim().is_empty() {
        return None;
    }

    Some(IntelRecord {
        conflict_key,
        source_tag: source_tag.to_string(),
        discovered_at: now,
        fields,
    })
}
