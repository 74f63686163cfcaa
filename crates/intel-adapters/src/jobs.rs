//! Competitor career pages hosted on Lever or Greenhouse.

use std::sync::Arc;

use async_trait::async_trait;
use intel_core::{Category, RawRecord};
use intel_storage::HttpFetcher;
use scraper::Html;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::html::{first_attr, first_text, selector};
use crate::{opt_str, raw_record, AdapterError, SourceAdapter};

const MAX_POSTINGS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardFlavor {
    Lever,
    Greenhouse,
}

impl BoardFlavor {
    fn tag_prefix(self) -> &'static str {
        match self {
            BoardFlavor::Lever => "lever",
            BoardFlavor::Greenhouse => "greenhouse",
        }
    }
}

pub struct JobBoardAdapter {
    http: Arc<HttpFetcher>,
    flavor: BoardFlavor,
    company: String,
    url: String,
    source_tag: String,
}

impl JobBoardAdapter {
    pub fn new(http: Arc<HttpFetcher>, flavor: BoardFlavor, company: String, url: String) -> Self {
        let source_tag = format!("{}:{}", flavor.tag_prefix(), slug(&company));
        Self {
            http,
            flavor,
            company,
            url,
            source_tag,
        }
    }
}

fn slug(company: &str) -> String {
    company
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Stable identifier for postings whose board exposes no id of its own.
fn synthetic_job_id(company: &str, title: &str, location: Option<&str>) -> String {
    let name = format!("{company}|{title}|{}", location.unwrap_or_default());
    format!("{}-{}", slug(company), Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
}

fn absolutize(href: &str, origin: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

fn posting(
    company: &str,
    job_id: String,
    title: String,
    location: Option<String>,
    department: Option<String>,
    url: String,
) -> RawRecord {
    raw_record([
        ("job_id", JsonValue::from(job_id)),
        ("company", JsonValue::from(company)),
        ("title", JsonValue::from(title)),
        ("location", opt_str(location)),
        ("department", opt_str(department)),
        ("url", JsonValue::from(url)),
    ])
}

pub fn parse_lever(
    source_tag: &str,
    company: &str,
    page_url: &str,
    html: &str,
) -> Result<Vec<RawRecord>, AdapterError> {
    let document = Html::parse_document(html);
    let postings = selector(source_tag, "div.posting")?;
    let title_sel = selector(source_tag, "h5")?;
    let location_sel = selector(source_tag, "span.sort-by-location")?;
    let team_sel = selector(source_tag, "span.sort-by-team")?;
    let link_sel = selector(source_tag, "a.posting-title")?;

    let mut out = Vec::new();
    for node in document.select(&postings).take(MAX_POSTINGS) {
        let Some(title) = first_text(node, &title_sel) else {
            continue;
        };
        let location = first_text(node, &location_sel);
        let job_id = node
            .value()
            .attr("data-qa-posting-id")
            .map(|id| format!("{}-{id}", slug(company)))
            .unwrap_or_else(|| synthetic_job_id(company, &title, location.as_deref()));
        let url = first_attr(node, &link_sel, "href").unwrap_or_else(|| page_url.to_string());
        out.push(posting(company, job_id, title, location, first_text(node, &team_sel), url));
    }
    Ok(out)
}

pub fn parse_greenhouse(
    source_tag: &str,
    company: &str,
    page_url: &str,
    html: &str,
) -> Result<Vec<RawRecord>, AdapterError> {
    let document = Html::parse_document(html);
    let openings = selector(source_tag, "div.opening")?;
    let link_sel = selector(source_tag, "a")?;
    let location_sel = selector(source_tag, "span.location")?;

    let mut out = Vec::new();
    for node in document.select(&openings).take(MAX_POSTINGS) {
        let Some(title) = first_text(node, &link_sel) else {
            continue;
        };
        let location = first_text(node, &location_sel);
        let url = first_attr(node, &link_sel, "href")
            .map(|href| absolutize(&href, "https://boards.greenhouse.io"))
            .unwrap_or_else(|| page_url.to_string());
        let department = node.value().attr("department_id").map(str::to_string);
        let job_id = url
            .rsplit('/')
            .next()
            .filter(|tail| !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()))
            .map(|id| format!("{}-{id}", slug(company)))
            .unwrap_or_else(|| synthetic_job_id(company, &title, location.as_deref()));
        out.push(posting(company, job_id, title, location, department, url));
    }
    Ok(out)
}

#[async_trait]
impl SourceAdapter for JobBoardAdapter {
    fn source_tag(&self) -> &str {
        &self.source_tag
    }

    fn category(&self) -> Category {
        Category::JobPosting
    }

    async fn produce(&self) -> Result<Vec<RawRecord>, AdapterError> {
        let resp = self
            .http
            .get_bytes(&self.source_tag, &self.url)
            .await
            .map_err(|err| AdapterError::fetch(&self.source_tag, err))?;
        let html = String::from_utf8_lossy(&resp.body);
        match self.flavor {
            BoardFlavor::Lever => parse_lever(&self.source_tag, &self.company, &self.url, &html),
            BoardFlavor::Greenhouse => {
                parse_greenhouse(&self.source_tag, &self.company, &self.url, &html)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVER: &str = r#"
        <div class="postings-group">
          <div class="posting" data-qa-posting-id="abc-123">
            <a class="posting-title" href="https://jobs.lever.co/jetzero/abc-123">
              <h5>Lead Aerodynamics Engineer</h5>
              <span class="sort-by-location">Long Beach, CA</span>
              <span class="sort-by-team">Engineering</span>
            </a>
          </div>
          <div class="posting"><a class="posting-title" href="/x"><h5>  </h5></a></div>
          <div class="posting">
            <a class="posting-title"><h5>Composites Technician</h5></a>
          </div>
        </div>"#;

    const GREENHOUSE: &str = r#"
        <section>
          <div class="opening" department_id="4012">
            <a href="/boomsupersonic/jobs/5551234">Senior Propulsion Engineer</a>
            <span class="location">Denver, CO</span>
          </div>
          <div class="opening">
            <a href="https://boards.greenhouse.io/boom/jobs/apply">Buyer</a>
          </div>
        </section>"#;

    #[test]
    fn lever_postings_are_parsed_and_untitled_ones_skipped() {
        let page_url = "https://jobs.lever.co/jetzero";
        let records = parse_lever("lever:jetzero", "JetZero", page_url, LEVER).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["job_id"], "jetzero-abc-123");
        assert_eq!(records[0]["title"], "Lead Aerodynamics Engineer");
        assert_eq!(records[0]["location"], "Long Beach, CA");
        assert_eq!(records[0]["department"], "Engineering");
        assert_eq!(records[1]["url"], "https://jobs.lever.co/jetzero");
        assert!(records[1]["job_id"].as_str().unwrap().starts_with("jetzero-"));
    }

    #[test]
    fn synthetic_ids_are_stable() {
        let a = synthetic_job_id("Boom Supersonic", "Buyer", None);
        let b = synthetic_job_id("Boom Supersonic", "Buyer", None);
        assert_eq!(a, b);
        assert!(a.starts_with("boom-supersonic-"));
        assert_ne!(a, synthetic_job_id("Boom Supersonic", "Buyer", Some("Denver")));
    }

    #[test]
    fn greenhouse_links_are_absolutized_and_numeric_ids_used() {
        let records = parse_greenhouse(
            "greenhouse:boom-supersonic",
            "Boom Supersonic",
            "https://boards.greenhouse.io/boomsupersonic",
            GREENHOUSE,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["url"], "https://boards.greenhouse.io/boomsupersonic/jobs/5551234");
        assert_eq!(records[0]["job_id"], "boom-supersonic-5551234");
        assert_eq!(records[0]["department"], "4012");
        assert!(records[1].get("location").is_none());
        assert_ne!(records[1]["job_id"], "boom-supersonic-apply");
    }
}
