//! Deterministic priority scoring: a weighted sum of fired signals, clamped and bucketed.

use intel_core::{
    CompetitorMove, IntelRecord, JobPosting, NewsItem, Patent, Priority, RecordFields, ScoredRecord,
    Signal, SupplierHealth, TalentLead,
};

use crate::config::WatchLists;
use crate::terms::{self, any_term, count_terms};

pub const MAX_SCORE: u8 = 100;
pub const KEYWORD_WEIGHT: i32 = 15;
pub const KEYWORD_CAP: i32 = 30;

pub const LARGE_AWARD_USD: f64 = 100_000_000.0;
pub const NOTABLE_AWARD_USD: f64 = 1_000_000.0;
pub const SEVERE_DROP_PERCENT: f64 = -10.0;
pub const DROP_PERCENT: f64 = -5.0;
pub const SMALL_CAP_USD: f64 = 1_000_000_000.0;

pub fn weight(signal: Signal) -> i32 {
    match signal {
        Signal::WatchListAffiliation => 35,
        Signal::ExecutiveTitle => 25,
        Signal::SeniorTitle => 15,
        Signal::EngineerTitle => 5,
        Signal::Availability => 20,
        Signal::KeywordMatch { matches } => (i32::from(matches) * KEYWORD_WEIGHT).min(KEYWORD_CAP),
        Signal::StrategicAction => 20,
        Signal::LargeAward => 25,
        Signal::NotableAward => 10,
        Signal::SeverePriceDrop => 30,
        Signal::PriceDrop => 20,
        Signal::Unprofitable => 15,
        Signal::SmallCap => 10,
        Signal::DistressKeyword => 50,
        Signal::DistressedSupplierOverride => 60,
    }
}

pub fn bucket(score: u8) -> Priority {
    match score {
        0..=24 => Priority::Low,
        25..=49 => Priority::Medium,
        50..=74 => Priority::High,
        _ => Priority::Critical,
    }
}

pub fn total(signals: &[Signal]) -> u8 {
    let sum: i32 = signals.iter().map(|s| weight(*s)).sum();
    sum.clamp(0, i32::from(MAX_SCORE)) as u8
}

fn text(parts: &[Option<&str>]) -> String {
    parts.iter().flatten().copied().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    lists: WatchLists,
}

impl Scorer {
    pub fn new(lists: WatchLists) -> Self {
        Self { lists }
    }

    pub fn score(&self, record: IntelRecord) -> ScoredRecord {
        let signals = self.signals(&record);
        let score = total(&signals);
        ScoredRecord {
            record,
            score,
            priority: bucket(score),
            signals,
        }
    }

    pub fn signals(&self, record: &IntelRecord) -> Vec<Signal> {
        let mut out = Vec::new();
        match &record.fields {
            RecordFields::Talent(t) => self.talent(t, &mut out),
            RecordFields::JobPosting(j) => self.job(j, &mut out),
            RecordFields::Patent(p) => self.patent(p, &mut out),
            RecordFields::CompetitorMove(m) => self.competitor_move(m, &mut out),
            RecordFields::SupplierHealth(s) => self.supplier(&record.conflict_key, s, &mut out),
            RecordFields::News(n) => self.news(n, &mut out),
        }
        out
    }

    fn affiliated(&self, text: &str, lists: &[&[String]]) -> bool {
        !text.is_empty() && lists.iter().any(|list| any_term(text, *list))
    }

    fn title(title: Option<&str>, out: &mut Vec<Signal>) {
        let Some(title) = title else { return };
        if any_term(title, terms::EXECUTIVE_TITLES) {
            out.push(Signal::ExecutiveTitle);
        } else if any_term(title, terms::SENIOR_TITLES) {
            out.push(Signal::SeniorTitle);
        } else if any_term(title, terms::ENGINEER_TITLES) {
            out.push(Signal::EngineerTitle);
        }
    }

    fn keywords<S: AsRef<str>>(text: &str, vocabulary: &[S], out: &mut Vec<Signal>) {
        let matches = count_terms(text, vocabulary);
        if matches > 0 {
            out.push(Signal::KeywordMatch {
                matches: u8::try_from(matches).unwrap_or(u8::MAX),
            });
        }
    }

    fn talent(&self, t: &TalentLead, out: &mut Vec<Signal>) {
        let company = t.current_company.as_deref().unwrap_or_default();
        if self.affiliated(company, &[self.lists.target_companies.as_slice()]) {
            out.push(Signal::WatchListAffiliation);
        }
        Self::title(t.current_title.as_deref(), out);
        let available = t.open_to_work == Some(true)
            || t.notes.as_deref().is_some_and(|n| any_term(n, terms::AVAILABILITY_PHRASES));
        if available {
            out.push(Signal::Availability);
        }
        let skills = t.skills.as_ref().map(|s| s.join(", "));
        let haystack = text(&[skills.as_deref(), t.current_title.as_deref()]);
        Self::keywords(&haystack, self.lists.critical_skills.as_slice(), out);
    }

    fn job(&self, j: &JobPosting, out: &mut Vec<Signal>) {
        let company = j.company.as_deref().unwrap_or_default();
        if self.affiliated(company, &[self.lists.competitors.as_slice()]) {
            out.push(Signal::WatchListAffiliation);
        }
        Self::title(j.title.as_deref(), out);
        let haystack = text(&[j.title.as_deref(), j.department.as_deref()]);
        Self::keywords(&haystack, self.lists.critical_skills.as_slice(), out);
    }

    fn patent(&self, p: &Patent, out: &mut Vec<Signal>) {
        let assignee = p.assignee.as_deref().unwrap_or_default();
        let rivals = [self.lists.competitors.as_slice(), self.lists.target_companies.as_slice()];
        if self.affiliated(assignee, &rivals) {
            out.push(Signal::WatchListAffiliation);
        }
        let haystack = text(&[p.title.as_deref(), p.abstract_text.as_deref()]);
        Self::keywords(&haystack, self.lists.technology_terms.as_slice(), out);
    }

    fn competitor_move(&self, m: &CompetitorMove, out: &mut Vec<Signal>) {
        let company = m.company.as_deref().unwrap_or_default();
        let rivals = [self.lists.competitors.as_slice(), self.lists.target_companies.as_slice()];
        if self.affiliated(company, &rivals) {
            out.push(Signal::WatchListAffiliation);
        }
        match m.amount_usd {
            Some(amount) if amount >= LARGE_AWARD_USD => out.push(Signal::LargeAward),
            Some(amount) if amount >= NOTABLE_AWARD_USD => out.push(Signal::NotableAward),
            _ => {}
        }
        let haystack = text(&[m.move_type.as_deref(), m.details.as_deref()]);
        if any_term(&haystack, terms::STRATEGIC_ACTIONS) {
            out.push(Signal::StrategicAction);
        }
    }

    fn supplier(&self, name: &str, s: &SupplierHealth, out: &mut Vec<Signal>) {
        let identity = text(&[Some(name), s.ticker.as_deref()]);
        if self.affiliated(&identity, &[self.lists.suppliers.as_slice()]) {
            out.push(Signal::WatchListAffiliation);
        }
        match s.price_change_percent {
            Some(change) if change <= SEVERE_DROP_PERCENT => out.push(Signal::SeverePriceDrop),
            Some(change) if change <= DROP_PERCENT => out.push(Signal::PriceDrop),
            _ => {}
        }
        if s.profit_margin.is_some_and(|m| m < 0.0) {
            out.push(Signal::Unprofitable);
        }
        if s.market_cap.is_some_and(|cap| cap < SMALL_CAP_USD) {
            out.push(Signal::SmallCap);
        }
        if s.headline.as_deref().is_some_and(|h| any_term(h, terms::DISTRESS_TERMS)) {
            out.push(Signal::DistressKeyword);
        }
        if self.affiliated(name, &[self.lists.distressed_suppliers.as_slice()]) {
            out.push(Signal::DistressedSupplierOverride);
        }
    }

    fn news(&self, n: &NewsItem, out: &mut Vec<Signal>) {
        let entities = n.entities.as_ref().map(|e| e.join(", "));
        let identity = text(&[entities.as_deref(), n.headline.as_deref()]);
        if self.affiliated(&identity, &[self.lists.tracked_entities.as_slice()]) {
            out.push(Signal::WatchListAffiliation);
        }
        let haystack = text(&[n.headline.as_deref(), n.summary.as_deref()]);
        if n.action_required == Some(true) || any_term(&haystack, terms::STRATEGIC_ACTIONS) {
            out.push(Signal::StrategicAction);
        }
        if any_term(&haystack, terms::DISTRESS_TERMS) {
            out.push(Signal::DistressKeyword);
        }
    }
}
