use std::sync::Arc;

use async_trait::async_trait;
use intel_adapters::{AdapterError, SourceAdapter};
use intel_core::{Category, MergePolicy, Priority, RawRecord};
use intel_pipeline::{
    Deduplicator, InsightTrigger, Orchestrator, Phase, PhaseStatus, RunStatus,
};
use intel_storage::{FailureKind, InMemoryGateway};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const PROFILE: &str = "https://www.linkedin.com/in/jane-doe";

struct Canned {
    tag: &'static str,
    category: Category,
    rows: Vec<Value>,
    cancel_after: Option<CancellationToken>,
}

impl Canned {
    fn new(tag: &'static str, category: Category, rows: Vec<Value>) -> Box<dyn SourceAdapter> {
        Box::new(Self {
            tag,
            category,
            rows,
            cancel_after: None,
        })
    }
}

#[async_trait]
impl SourceAdapter for Canned {
    fn source_tag(&self) -> &str {
        self.tag
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        if let Some(token) = &self.cancel_after {
            token.cancel();
        }
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect())
    }
}

struct Broken;

#[async_trait]
impl SourceAdapter for Broken {
    fn source_tag(&self) -> &str {
        "google_patents"
    }

    fn category(&self) -> Category {
        Category::Patent
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        Err(AdapterError::parse("google_patents", "results page layout changed"))
    }
}

fn talent_phase() -> Phase {
    Phase::new(
        "talent",
        Category::Talent,
        vec![
            Canned::new(
                "github",
                Category::Talent,
                vec![json!({"profile_url": PROFILE, "company": "Boeing", "skills": null})],
            ),
            Canned::new(
                "serper:linkedin",
                Category::Talent,
                vec![json!({"linkedin_url": PROFILE, "company": null, "skills": "composites"})],
            ),
        ],
    )
}

fn supplier_phase() -> Phase {
    Phase::new(
        "supplier health",
        Category::SupplierHealth,
        vec![Canned::new(
            "alpha_vantage",
            Category::SupplierHealth,
            vec![json!({
                "supplier_name": "Spirit AeroSystems",
                "ticker": "SPR",
                "stock_price": "38.10",
                "headline": "Spirit AeroSystems reports quarterly deliveries"
            })],
        )],
    )
}

#[tokio::test]
async fn github_and_linkedin_views_merge_into_one_high_priority_lead() {
    let gateway = Arc::new(InMemoryGateway::new());
    let summary = Orchestrator::new(vec![talent_phase()], gateway.clone()).run().await;

    let talent = summary.phase(Category::Talent).expect("talent phase");
    assert_eq!(talent.status, PhaseStatus::Completed);
    assert_eq!(talent.records_in, 2);
    assert_eq!(talent.unique, 1);
    assert_eq!(talent.persisted, 1);
    assert_eq!(talent.priority_counts.get(&Priority::High), Some(&1));

    let rows = gateway.rows(Category::Talent).await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.priority, Priority::High);
    assert_eq!(row.fields["current_company"], "Boeing");
    assert_eq!(row.fields["skills"], json!(["composites"]));
    assert_eq!(row.source_tag, "github+serper:linkedin");
}

#[tokio::test]
async fn distressed_supplier_with_neutral_headline_is_at_least_high() {
    let gateway = Arc::new(InMemoryGateway::new());
    Orchestrator::new(vec![supplier_phase()], gateway.clone()).run().await;

    let row = gateway
        .row(Category::SupplierHealth, "Spirit AeroSystems")
        .await
        .expect("supplier row");
    assert!(row.priority >= Priority::High, "got {:?}", row.priority);
}

#[tokio::test]
async fn a_failing_source_only_fails_its_own_phase() {
    let gateway = Arc::new(InMemoryGateway::new());
    let phases = vec![
        talent_phase(),
        Phase::new("patents", Category::Patent, vec![Box::new(Broken)]),
        supplier_phase(),
    ];
    let summary = Orchestrator::new(phases, gateway.clone()).run().await;

    assert_eq!(summary.status, RunStatus::Completed);
    let statuses: Vec<_> = summary.phases.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![PhaseStatus::Completed, PhaseStatus::Failed, PhaseStatus::Completed]
    );
    let patents = summary.phase(Category::Patent).unwrap();
    assert!(patents.error.as_deref().unwrap().contains("layout changed"));
    assert_eq!(gateway.len(Category::Patent).await, 0);
    assert_eq!(gateway.len(Category::SupplierHealth).await, 1);

    let triggers: Vec<_> = summary.insights.iter().map(|i| i.trigger).collect();
    assert!(triggers.contains(&InsightTrigger::SourceFailures));
    assert!(triggers.contains(&InsightTrigger::TalentPipeline));
}

#[tokio::test]
async fn first_declared_source_wins_across_repeated_runs() {
    let gateway = Arc::new(InMemoryGateway::new());
    let phase = || {
        Phase::new(
            "talent",
            Category::Talent,
            vec![
                Canned::new(
                    "github",
                    Category::Talent,
                    vec![json!({"url": PROFILE, "company": "Boeing"})],
                ),
                Canned::new(
                    "serper:linkedin",
                    Category::Talent,
                    vec![json!({"url": PROFILE, "company": "Airbus"})],
                ),
            ],
        )
    };

    for _ in 0..2 {
        Orchestrator::new(vec![phase()], gateway.clone())
            .with_dedup(Deduplicator::new(MergePolicy::FirstDeclaredWins))
            .run()
            .await;
        let row = gateway.row(Category::Talent, PROFILE).await.expect("row");
        assert_eq!(row.fields["current_company"], "Boeing");
    }
}

#[tokio::test]
async fn rerunning_the_same_records_updates_in_place() {
    let gateway = Arc::new(InMemoryGateway::new());
    let orchestrator = Orchestrator::new(vec![talent_phase(), supplier_phase()], gateway.clone());

    orchestrator.run().await;
    let first = gateway.row(Category::Talent, PROFILE).await.expect("first row");
    let summary = orchestrator.run().await;
    let second = gateway.row(Category::Talent, PROFILE).await.expect("second row");

    assert_eq!(gateway.len(Category::Talent).await, 1);
    assert_eq!(gateway.len(Category::SupplierHealth).await, 1);
    assert_eq!(second.discovered_at, first.discovered_at);
    assert!(second.last_updated > first.last_updated);
    assert_eq!(second.fields, first.fields);
    assert_eq!(summary.total_persisted(), 2);
}

#[tokio::test]
async fn rejected_rows_are_reported_without_failing_the_phase() {
    let gateway = Arc::new(InMemoryGateway::new().with_rejected_key(Category::Talent, PROFILE));
    let summary = Orchestrator::new(vec![talent_phase()], gateway).run().await;

    let talent = &summary.phases[0];
    assert_eq!(talent.status, PhaseStatus::Completed);
    assert_eq!(talent.persisted, 0);
    assert_eq!(talent.failures.len(), 1);
    assert_eq!(talent.failures[0].conflict_key, PROFILE);
    assert_eq!(talent.failures[0].kind, FailureKind::Constraint);
}

#[tokio::test]
async fn cancellation_leaves_later_phases_pending() {
    let cancel = CancellationToken::new();
    let first = Phase::new(
        "talent",
        Category::Talent,
        vec![Box::new(Canned {
            tag: "github",
            category: Category::Talent,
            rows: vec![json!({"url": PROFILE})],
            cancel_after: Some(cancel.clone()),
        })],
    );
    let gateway = Arc::new(InMemoryGateway::new());
    let summary = Orchestrator::new(vec![first, supplier_phase()], gateway.clone())
        .with_cancellation(cancel)
        .run()
        .await;

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(summary.phases[0].status, PhaseStatus::Completed);
    assert_eq!(summary.phases[1].status, PhaseStatus::Pending);
    assert_eq!(gateway.len(Category::Talent).await, 1);
    assert_eq!(gateway.len(Category::SupplierHealth).await, 0);
}
