//! Pipeline configuration: YAML file for phases and tuning, environment for credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use intel_adapters::{AdapterConfig, TickerEntry};
use intel_core::{Category, MergePolicy};
use intel_storage::{BackoffPolicy, HttpClientConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "intel.yaml";
/// Seconds-first cron, as the scheduler expects: every 6 hours on the hour.
pub const DEFAULT_SCHEDULE: &str = "0 0 */6 * * *";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no store configured: set DATABASE_URL, or SUPABASE_URL and SUPABASE_KEY")]
    MissingStore,
    #[error("phase {phase}: {detail}")]
    InvalidPhase { phase: String, detail: String },
    #[error("schedule {schedule:?}: {detail}")]
    InvalidSchedule { schedule: String, detail: String },
}

/// One pipeline phase: a category plus the adapters feeding it, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub category: Category,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub adapters: Vec<AdapterConfig>,
}

fn enabled() -> bool {
    true
}

impl PhaseConfig {
    pub fn new(category: Category, adapters: Vec<AdapterConfig>) -> Self {
        Self {
            category,
            name: None,
            enabled: true,
            adapters,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.category.as_str().to_string())
    }
}

/// Entity and term lists the scorer matches against. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchLists {
    /// Employers whose people are worth recruiting.
    pub target_companies: Vec<String>,
    pub competitors: Vec<String>,
    pub suppliers: Vec<String>,
    /// Companies, agencies and investors followed in the news.
    pub tracked_entities: Vec<String>,
    /// Suppliers known to be in trouble regardless of what today's numbers say.
    pub distressed_suppliers: Vec<String>,
    pub critical_skills: Vec<String>,
    pub technology_terms: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for WatchLists {
    fn default() -> Self {
        Self {
            target_companies: strings(&[
                "Boeing",
                "Airbus",
                "Lockheed Martin",
                "Northrop Grumman",
                "Spirit AeroSystems",
                "SpaceX",
                "Blue Origin",
            ]),
            competitors: strings(&[
                "JetZero",
                "Boom Supersonic",
                "Aurora Flight Sciences",
                "Archer",
                "Joby",
            ]),
            suppliers: strings(&[
                "Spirit AeroSystems",
                "TransDigm",
                "Howmet Aerospace",
                "HEICO",
                "Astronics",
                "Triumph Group",
            ]),
            tracked_entities: strings(&[
                "Natilus",
                "JetZero",
                "Boom Supersonic",
                "Boeing",
                "Airbus",
                "Spirit AeroSystems",
                "Triumph Group",
                "FAA",
                "NASA",
                "Lux Capital",
                "Founders Fund",
                "Khosla Ventures",
            ]),
            distressed_suppliers: strings(&["Spirit AeroSystems"]),
            critical_skills: strings(&[
                "composite",
                "aerodynamic",
                "cfd",
                "catia",
                "fea",
                "propulsion",
                "faa certification",
                "part 25",
                "flight test",
                "blended wing",
            ]),
            technology_terms: strings(&[
                "blended wing",
                "bwb",
                "flying wing",
                "cargo",
                "composite",
                "propulsion",
                "fuel efficiency",
            ]),
        }
    }
}

/// Minimum counts (exclusive) above which each insight fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    pub talent_surge: usize,
    pub competitor_patent_activity: usize,
    pub competitor_funding: usize,
    pub supplier_distress: usize,
    pub competitor_hiring_push: usize,
    pub action_required_news: usize,
    pub talent_pipeline: usize,
    pub source_failures: usize,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            talent_surge: 10,
            competitor_patent_activity: 0,
            competitor_funding: 0,
            supplier_distress: 0,
            competitor_hiring_push: 5,
            action_required_news: 0,
            talent_pipeline: 0,
            source_failures: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub max_retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: None,
            max_retries: BackoffPolicy::default().max_retries,
        }
    }
}

impl HttpSettings {
    pub fn client_config(&self) -> HttpClientConfig {
        let defaults = HttpClientConfig::default();
        HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            backoff: BackoffPolicy {
                max_retries: self.max_retries,
                ..defaults.backoff
            },
            rate_limit: defaults.rate_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub phases: Vec<PhaseConfig>,
    pub watch_lists: WatchLists,
    pub merge_policy: MergePolicy,
    pub insights: InsightThresholds,
    pub http: HttpSettings,
    pub reports_dir: PathBuf,
    pub schedule: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            phases: default_phases(),
            watch_lists: WatchLists::default(),
            merge_policy: MergePolicy::default(),
            insights: InsightThresholds::default(),
            http: HttpSettings::default(),
            reports_dir: PathBuf::from("reports"),
            schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to the built-in phase line-up when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml_str(&text, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "config file not found; using built-in phases"
                );
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `INTEL_CONFIG` if set, else `intel.yaml` in the working directory.
    pub fn path_from_env() -> PathBuf {
        std::env::var("INTEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn enabled_phases(&self) -> impl Iterator<Item = &PhaseConfig> {
        self.phases.iter().filter(|p| p.enabled)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        tokio_cron_scheduler::Job::new(self.schedule.as_str(), |_uuid, _l| {}).map_err(|err| {
            ConfigError::InvalidSchedule {
                schedule: self.schedule.clone(),
                detail: err.to_string(),
            }
        })?;
        for phase in &self.phases {
            if phase.adapters.is_empty() {
                return Err(ConfigError::InvalidPhase {
                    phase: phase.display_name(),
                    detail: "no adapters configured".into(),
                });
            }
            for adapter in &phase.adapters {
                if let Some(native) = adapter.native_category() {
                    if native != phase.category {
                        return Err(ConfigError::InvalidPhase {
                            phase: phase.display_name(),
                            detail: format!("{} adapter produces {native} records", adapter.kind()),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Where persisted records go, chosen from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Postgres { url: String },
    Rest { url: String, key: String },
    Memory,
}

impl StoreTarget {
    pub fn from_env(dry_run: bool) -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self::select(dry_run, var("DATABASE_URL"), var("SUPABASE_URL"), var("SUPABASE_KEY"))
    }

    pub fn select(
        dry_run: bool,
        database_url: Option<String>,
        supabase_url: Option<String>,
        supabase_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        if dry_run {
            return Ok(StoreTarget::Memory);
        }
        if let Some(url) = database_url {
            return Ok(StoreTarget::Postgres { url });
        }
        match (supabase_url, supabase_key) {
            (Some(url), Some(key)) => Ok(StoreTarget::Rest { url, key }),
            _ => Err(ConfigError::MissingStore),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            StoreTarget::Postgres { .. } => "postgres",
            StoreTarget::Rest { .. } => "postgrest",
            StoreTarget::Memory => "memory",
        }
    }
}

/// Phase line-up used when no config file is present.
pub fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new(
            Category::Talent,
            vec![
                AdapterConfig::GithubSearch {
                    queries: strings(&[
                        "Boeing aerodynamic engineer",
                        "Spirit Aerosystems composite engineer",
                        "Airbus aero structures",
                        "electric aircraft aerospace engineer",
                    ]),
                    per_page: 5,
                },
                AdapterConfig::SerperLinkedin {
                    queries: strings(&[
                        r#"site:linkedin.com "aerospace engineer" "open to work""#,
                        r#"site:linkedin.com "composite engineer" Airbus"#,
                        r#"site:linkedin.com "FAA certification specialist""#,
                        r#"site:linkedin.com "manufacturing engineer" Spirit AeroSystems"#,
                    ]),
                    results_per_query: 10,
                },
            ],
        ),
        PhaseConfig::new(
            Category::JobPosting,
            vec![
                AdapterConfig::LeverBoard {
                    company: "JetZero".into(),
                    url: "https://jobs.lever.co/jetzero".into(),
                },
                AdapterConfig::GreenhouseBoard {
                    company: "Boom Supersonic".into(),
                    url: "https://boards.greenhouse.io/boomsupersonic".into(),
                },
            ],
        ),
        PhaseConfig::new(
            Category::Patent,
            vec![AdapterConfig::GooglePatents {
                queries: strings(&["blended wing body aircraft", "cargo aircraft door", "JetZero"]),
                max_results: 10,
            }],
        ),
        PhaseConfig::new(
            Category::SupplierHealth,
            vec![AdapterConfig::AlphaVantage {
                tickers: [
                    ("SPR", "Spirit AeroSystems"),
                    ("TDG", "TransDigm Group"),
                    ("HWM", "Howmet Aerospace"),
                    ("HEI", "HEICO Corporation"),
                    ("ATRO", "Astronics Corporation"),
                ]
                .into_iter()
                .map(|(ticker, name)| TickerEntry {
                    ticker: ticker.into(),
                    name: name.into(),
                })
                .collect(),
                min_interval_secs: 12,
            }],
        ),
        PhaseConfig::new(
            Category::News,
            vec![AdapterConfig::GoogleNewsRss {
                topics: strings(&[
                    "Natilus aircraft",
                    "JetZero BWB",
                    "Boom Supersonic",
                    "Spirit AeroSystems bankruptcy",
                    "cargo aircraft innovation",
                    "FAA aircraft certification",
                ]),
                results_per_topic: 5,
            }],
        ),
        PhaseConfig::new(
            Category::CompetitorMove,
            vec![AdapterConfig::UsaSpending {
                keywords: strings(&["aircraft", "aerospace", "UAV", "blended wing"]),
                recipients: strings(&["JetZero", "Boeing", "Lockheed", "Northrop"]),
                lookback_days: 90,
                min_award_usd: 1_000_000.0,
            }],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_category_once() {
        let config = PipelineConfig::default();
        let mut categories: Vec<_> = config.phases.iter().map(|p| p.category).collect();
        categories.sort();
        assert_eq!(categories, Category::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let yaml = r#"
merge_policy: last_declared_wins
insights:
  talent_surge: 3
phases:
  - category: talent
    name: warn-layoffs
    adapters:
      - kind: fixture
        path: fixtures/talent.json
"#;
        let config = PipelineConfig::from_yaml_str(yaml, Path::new("intel.yaml")).unwrap();
        assert_eq!(config.merge_policy, MergePolicy::LastDeclaredWins);
        assert_eq!(config.insights.talent_surge, 3);
        assert_eq!(config.insights.competitor_hiring_push, 5);
        assert_eq!(config.phases.len(), 1);
        assert_eq!(config.phases[0].display_name(), "warn-layoffs");
        assert_eq!(config.schedule, DEFAULT_SCHEDULE);
    }

    #[test]
    fn adapter_in_the_wrong_phase_is_rejected() {
        let yaml = r#"
phases:
  - category: news
    adapters:
      - kind: google_patents
        queries: [bwb]
"#;
        let err = PipelineConfig::from_yaml_str(yaml, Path::new("intel.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPhase { .. }));
    }

    #[test]
    fn five_field_cron_is_rejected() {
        let yaml = "schedule: \"0 */6 * * *\"\n";
        let err = PipelineConfig::from_yaml_str(yaml, Path::new("intel.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchedule { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn store_selection_prefers_database_url() {
        let pg = StoreTarget::select(
            false,
            Some("postgres://x".into()),
            Some("u".into()),
            Some("k".into()),
        );
        assert_eq!(pg.unwrap().describe(), "postgres");
        let rest = StoreTarget::select(
            false,
            None,
            Some("https://x.supabase.co".into()),
            Some("k".into()),
        );
        assert_eq!(rest.unwrap().describe(), "postgrest");
        assert!(matches!(
            StoreTarget::select(false, None, Some("u".into()), None),
            Err(ConfigError::MissingStore)
        ));
        assert_eq!(StoreTarget::select(true, None, None, None).unwrap(), StoreTarget::Memory);
    }
}
