//! Same-run deduplication: at most one record per conflict key, fields merged per the policy.

use std::collections::HashMap;

use intel_core::{IntelRecord, MergePolicy};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    policy: MergePolicy,
}

impl Deduplicator {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Collapse records sharing a conflict key. `records` must be in adapter declaration order;
    /// output keeps the first-seen order of each key.
    pub fn merge(&self, records: Vec<IntelRecord>) -> Vec<IntelRecord> {
        let mut out: Vec<IntelRecord> = Vec::with_capacity(records.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let Some(&slot) = index.get(&record.conflict_key) else {
                index.insert(record.conflict_key.clone(), out.len());
                out.push(record);
                continue;
            };

            let merged = &mut out[slot];
            if let Err(err) = merged.fields.merge_from(record.fields, self.policy) {
                warn!(
                    key = merged.conflict_key.as_str(),
                    error = %err,
                    "skipping cross-category duplicate"
                );
                continue;
            }
            if !merged.source_tag.split('+').any(|tag| tag == record.source_tag) {
                merged.source_tag.push('+');
                merged.source_tag.push_str(&record.source_tag);
            }
            merged.discovered_at = merged.discovered_at.min(record.discovered_at);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use intel_core::{RecordFields, TalentLead};

    fn talent(key: &str, tag: &str, company: Option<&str>, skills: Option<&[&str]>) -> IntelRecord {
        IntelRecord {
            conflict_key: key.into(),
            source_tag: tag.into(),
            discovered_at: Utc::now(),
            fields: RecordFields::Talent(TalentLead {
                current_company: company.map(str::to_string),
                skills: skills.map(|s| s.iter().map(|x| x.to_string()).collect()),
                ..Default::default()
            }),
        }
    }

    fn company(record: &IntelRecord) -> Option<&str> {
        match &record.fields {
            RecordFields::Talent(t) => t.current_company.as_deref(),
            _ => None,
        }
    }

    #[test]
    fn merges_fields_and_keeps_first_seen_order() {
        let records = vec![
            talent("b", "github", Some("Boeing"), None),
            talent("a", "github", None, None),
            talent("b", "serper:linkedin", None, Some(&["composites"])),
        ];
        let merged = Deduplicator::default().merge(records);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].conflict_key, "b");
        assert_eq!(merged[1].conflict_key, "a");
        assert_eq!(merged[0].source_tag, "github+serper:linkedin");
        let RecordFields::Talent(t) = &merged[0].fields else {
            panic!("talent variant expected");
        };
        assert_eq!(t.current_company.as_deref(), Some("Boeing"));
        assert_eq!(t.skills.as_deref(), Some(&["composites".to_string()][..]));
    }

    #[test]
    fn precedence_follows_policy() {
        let records = || {
            vec![
                talent("k", "github", Some("Boeing"), None),
                talent("k", "serper:linkedin", Some("Airbus"), None),
            ]
        };
        let first = Deduplicator::new(MergePolicy::FirstDeclaredWins).merge(records());
        assert_eq!(company(&first[0]), Some("Boeing"));
        let last = Deduplicator::new(MergePolicy::LastDeclaredWins).merge(records());
        assert_eq!(company(&last[0]), Some("Airbus"));
    }

    #[test]
    fn keeps_earliest_discovery_and_tags_once() {
        let mut early = talent("k", "github", None, None);
        early.discovered_at -= Duration::hours(1);
        let expected = early.discovered_at;
        let merged = Deduplicator::default().merge(vec![
            talent("k", "github", None, None),
            early,
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].discovered_at, expected);
        assert_eq!(merged[0].source_tag, "github");
    }
}
