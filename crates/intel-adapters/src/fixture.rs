//! Reads raw records from a JSON file. Used for manually curated sources such as WARN layoff
//! notices and for offline runs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{AdapterError, SourceAdapter};

#[derive(Debug, Clone)]
pub struct FixtureAdapter {
    category: Category,
    path: PathBuf,
    source_tag: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Bare(Vec<JsonValue>),
    Wrapped { records: Vec<JsonValue> },
}

impl FixtureAdapter {
    pub fn new(category: Category, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("records")
            .to_string();
        Self {
            category,
            path,
            source_tag: format!("fixture:{stem}"),
        }
    }

    pub fn with_source_tag(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Accepts a bare JSON array or an object with a `records` array. Non-object entries are skipped.
pub fn parse_fixture(source_tag: &str, text: &str) -> Result<Vec<RawRecord>, AdapterError> {
    let file: FixtureFile =
        serde_json::from_str(text).map_err(|err| AdapterError::parse(source_tag, err.to_string()))?;
    let values = match file {
        FixtureFile::Bare(values) => values,
        FixtureFile::Wrapped { records } => records,
    };
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl SourceAdapter for FixtureAdapter {
    fn source_tag(&self) -> &str {
        &self.source_tag
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading fixture {}", self.path.display()))?;
        parse_fixture(&self.source_tag, &text)
    }
}
