use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::HuntError;
use crate::models::{JobPosting, SourceQuery};
use crate::source::{JobSource, TIER1_API};

const SEARCH_URL: &str = "https://api.adzuna.com/v1/api/jobs/in/search/1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);
const DESCRIPTION_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct AdzunaCompany {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaLocation {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    id: Option<String>,
    title: Option<String>,
    company: Option<AdzunaCompany>,
    location: Option<AdzunaLocation>,
    description: Option<String>,
    redirect_url: Option<String>,
    created: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

/// Structured job API, the first and cheapest tier.
pub struct AdzunaSource {
    app_id: String,
    app_key: String,
    client: reqwest::Client,
}

impl AdzunaSource {
    pub fn from_env() -> Result<Self, HuntError> {
        let app_id = env::var("ADZUNA_APP_ID").map_err(|_| {
            HuntError::Config("ADZUNA_APP_ID environment variable not set".to_string())
        })?;
        let app_key = env::var("ADZUNA_APP_KEY").map_err(|_| {
            HuntError::Config("ADZUNA_APP_KEY environment variable not set".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HuntError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            app_id,
            app_key,
            client,
        })
    }

    async fn request(&self, query: &SourceQuery) -> Result<reqwest::Response, HuntError> {
        self.client
            .get(SEARCH_URL)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("what", query.what.as_str()),
                ("where", query.location.as_str()),
                ("max_days_old", &query.max_days_old.to_string()),
                ("results_per_page", &query.results_per_page.to_string()),
                ("sort_by", "date"),
                ("content-type", "application/json"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HuntError::SourceUnavailable(format!(
                        "adzuna timed out for '{}' in '{}'",
                        query.what, query.location
                    ))
                } else {
                    HuntError::SourceUnavailable(format!("adzuna request failed: {e}"))
                }
            })
    }

    fn normalize(job: AdzunaJob) -> Option<JobPosting> {
        let title = job.title.unwrap_or_default().trim().to_string();
        let apply_link = job.redirect_url.unwrap_or_default();
        if title.is_empty() || apply_link.is_empty() {
            return None;
        }

        let company = job
            .company
            .and_then(|c| c.display_name)
            .unwrap_or_else(|| "Unknown Company".to_string())
            .trim()
            .to_string();
        let location = job
            .location
            .and_then(|l| l.display_name)
            .unwrap_or_else(|| "Not specified".to_string());
        let description: String = job
            .description
            .unwrap_or_default()
            .chars()
            .take(DESCRIPTION_LIMIT)
            .collect();
        let posted_date = job
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mut posting = JobPosting::new(&title, &company, &apply_link, "adzuna");
        posting.location = location;
        posting.description = description;
        posting.posted_date = posted_date;
        posting.salary_min = job.salary_min.map(|s| s as i64);
        posting.salary_max = job.salary_max.map(|s| s as i64);
        posting.source_id = job.id;
        Some(posting)
    }
}

#[async_trait]
impl JobSource for AdzunaSource {
    fn tier(&self) -> &'static str {
        TIER1_API
    }

    fn name(&self) -> &str {
        "adzuna"
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobPosting>, HuntError> {
        let mut response = self.request(query).await?;

        // Rate limited: back off once, then give up on this query.
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            response = self.request(query).await?;
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(HuntError::SourceUnavailable(format!(
                    "adzuna rate limit persisted for '{}' in '{}'",
                    query.what, query.location
                )));
            }
        }

        if !response.status().is_success() {
            return Err(HuntError::SourceUnavailable(format!(
                "adzuna returned {} for '{}' in '{}'",
                response.status(),
                query.what,
                query.location
            )));
        }

        let body: AdzunaResponse = response
            .json()
            .await
            .map_err(|e| HuntError::Parse(format!("adzuna response: {e}")))?;

        Ok(body.results.into_iter().filter_map(Self::normalize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> AdzunaJob {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn normalize_maps_the_api_shape() {
        let job = raw(
            r#"{
                "id": "12345",
                "title": " React Developer ",
                "company": {"display_name": "Acme Corp"},
                "location": {"display_name": "Bangalore, Karnataka"},
                "description": "Build UIs with React.",
                "redirect_url": "https://adzuna.in/land/ad/12345",
                "created": "2026-08-20T10:30:00Z",
                "salary_min": 900000.0,
                "salary_max": 1500000.0
            }"#,
        );
        let posting = AdzunaSource::normalize(job).expect("valid posting");
        assert_eq!(posting.title, "React Developer");
        assert_eq!(posting.company, "Acme Corp");
        assert_eq!(posting.salary_min, Some(900000));
        assert_eq!(posting.source, "adzuna");
        assert_eq!(posting.source_id.as_deref(), Some("12345"));
        assert!(posting.posted_date.is_some());
    }

    #[test]
    fn normalize_rejects_missing_title_or_link() {
        assert!(AdzunaSource::normalize(raw(r#"{"title": "Dev"}"#)).is_none());
        assert!(AdzunaSource::normalize(raw(r#"{"redirect_url": "https://x"}"#)).is_none());
    }

    #[test]
    fn normalize_truncates_long_descriptions() {
        let long = "x".repeat(2000);
        let job = raw(&format!(
            r#"{{"title": "Dev", "redirect_url": "https://x", "description": "{long}"}}"#
        ));
        let posting = AdzunaSource::normalize(job).unwrap();
        assert_eq!(posting.description.chars().count(), 500);
    }

    #[test]
    fn normalize_defaults_missing_company_and_location() {
        let job = raw(r#"{"title": "Dev", "redirect_url": "https://x"}"#);
        let posting = AdzunaSource::normalize(job).unwrap();
        assert_eq!(posting.company, "Unknown Company");
        assert_eq!(posting.location, "Not specified");
        assert!(posting.posted_date.is_none());
    }

    #[test]
    fn normalize_ignores_unparseable_dates() {
        let job = raw(r#"{"title": "Dev", "redirect_url": "https://x", "created": "yesterday"}"#);
        let posting = AdzunaSource::normalize(job).unwrap();
        assert!(posting.posted_date.is_none());
    }
}
