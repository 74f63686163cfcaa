//! Case-insensitive term matching anchored at word starts, plus the fixed vocabularies used by the
//! normalizer and scorer.

/// `true` when `term` occurs in `haystack` starting at a word boundary. Both sides are compared
/// lower-cased; the match may continue into a longer word ("composite" matches "composites").
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    haystack.match_indices(term.as_str()).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |prev| !prev.is_alphanumeric())
    })
}

pub fn any_term<S: AsRef<str>>(haystack: &str, terms: &[S]) -> bool {
    terms.iter().any(|t| contains_term(haystack, t.as_ref()))
}

pub fn count_terms<S: AsRef<str>>(haystack: &str, terms: &[S]) -> usize {
    terms.iter().filter(|t| contains_term(haystack, t.as_ref())).count()
}

pub const EXECUTIVE_TITLES: &[&str] = &[
    "director",
    "vp",
    "vice president",
    "chief",
    "head of",
    "cto",
    "ceo",
    "cfo",
];
pub const SENIOR_TITLES: &[&str] = &["senior", "principal", "lead", "staff", "manager"];
pub const ENGINEER_TITLES: &[&str] = &["engineer", "specialist", "architect", "designer"];
pub const AVAILABILITY_PHRASES: &[&str] = &["open to work", "seeking", "looking for"];
pub const STRATEGIC_ACTIONS: &[&str] = &[
    "funding",
    "raises",
    "contract",
    "acquisition",
    "bankruptcy",
    "patent",
    "hires",
    "ceo",
    "partnership",
    "merger",
];
pub const DISTRESS_TERMS: &[&str] = &["bankruptcy", "chapter 11", "insolvent", "default"];

/// Ordered `(label, terms)` table; the first row with a matching term wins.
pub type Classifier = &'static [(&'static str, &'static [&'static str])];

pub const JOB_SIGNALS: Classifier = &[
    ("Manufacturing Scale-up", &["manufacturing", "production", "factory", "plant", "assembly"]),
    ("Engineering Expansion", &["engineer", "design", "architect", "technical", "software"]),
    ("Certification Push", &["certification", "regulatory", "compliance", "faa", "quality"]),
    ("Supply Chain Build", &["supply chain", "procurement", "logistics", "sourcing"]),
    ("Go-to-Market Prep", &["sales", "business development", "commercial", "account"]),
    ("Financial Scaling", &["finance", "accounting", "controller", "cfo"]),
];

pub const TECHNOLOGY_AREAS: Classifier = &[
    ("BWB Design", &["blended wing", "bwb", "flying wing"]),
    ("Cargo Systems", &["cargo"]),
    ("Materials/Structures", &["composite", "material", "structure"]),
    ("Propulsion", &["propulsion", "engine", "thrust"]),
    ("Fuel Efficiency", &["fuel", "efficiency", "consumption"]),
];

pub const NEWS_TOPICS: Classifier = &[
    ("COMPETITOR", &["jetzero", "boom", "boeing", "airbus", "natilus"]),
    ("SUPPLIER", &["spirit aerosystems", "triumph", "supplier", "supply chain"]),
    ("REGULATORY", &["faa", "certification", "regulatory", "compliance"]),
    ("INVESTOR", &["investment", "funding", "venture capital", "series"]),
];

pub fn classify(text: &str, table: Classifier, fallback: &'static str) -> &'static str {
    table
        .iter()
        .find(|row| any_term(text, row.1))
        .map(|row| row.0)
        .unwrap_or(fallback)
}
