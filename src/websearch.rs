use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::HuntError;
use crate::models::{JobPosting, SourceQuery};
use crate::source::{JobSource, TIER2_WEBSEARCH};

const SEARCH_URL: &str = "https://api.tavily.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DESCRIPTION_LIMIT: usize = 500;

const TARGET_DOMAINS: &[&str] = &[
    "linkedin.com",
    "naukri.com",
    "indeed.com",
    "greenhouse.io",
    "lever.co",
    "workday.com",
    "myworkdayjobs.com",
    "breezy.hr",
    "careers.google.com",
    "jobs.apple.com",
];

/// Title suffixes that mark a category page, not a posting.
const AGGREGATOR_TITLE_SUFFIXES: &[&str] = &[" jobs", " vacancies", " careers"];

const AGGREGATOR_TITLE_PHRASES: &[&str] = &[
    "apply to",
    "register for",
    "login to",
    "upload resume",
    "create alert",
    "similar jobs",
    "recommended jobs",
    "current job openings",
    "view all",
    "browse jobs",
    "job search",
];

const SEO_TITLE_PATTERNS: &[&str] = &[
    "jobs in ",
    "vacancies in ",
    "openings in ",
    "hiring now in ",
    "salary in ",
    "career in ",
    "recruitment in ",
    "employment in ",
    "job vacancies",
];

const AGGREGATOR_CONTENT_PREFIXES: &[&str] = &[
    "apply to",
    "listed on",
    "available on",
    "browse",
    "view all",
    "jobs available",
    "job vacancies",
    "search results",
    "matching jobs",
    "jobs in",
];

const BAD_URL_PATTERNS: &[&str] = &[
    "search?",
    "q=",
    "query=",
    "keywords=",
    "sort=",
    "filter=",
    "page=",
    "jobs-in-",
    "jobs_in_",
    "/directory/",
    "/browse/",
    "/categories/",
];

const JOB_INDICATORS: &[&str] = &[
    "job", "career", "position", "role", "hiring", "apply", "opening", "vacancy", "develop",
    "engin",
];

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: String,
    search_depth: &'a str,
    max_results: u32,
    include_domains: Vec<&'a str>,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// Web search over job boards and ATS domains; the fallback tier when the
/// structured API comes back thin. Result pages need aggressive filtering
/// since most hits are category or search pages rather than postings.
pub struct WebSearchSource {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WebSearchSource {
    pub fn from_env() -> Result<Self, HuntError> {
        let api_key = env::var("TAVILY_API_KEY")
            .ok()
            .filter(|k| !k.is_empty() && k != "YOUR_TAVILY_API_KEY_HERE");
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HuntError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { api_key, client })
    }

    fn build_query(query: &SourceQuery) -> String {
        let location = if query.location.is_empty() || query.location.eq_ignore_ascii_case("anywhere")
        {
            String::new()
        } else {
            format!(" in {}", query.location)
        };
        format!(
            "{}{location} jobs (site:linkedin.com OR site:naukri.com OR site:indeed.com OR \
             site:greenhouse.io OR site:lever.co OR site:workday.com OR \
             site:myworkdayjobs.com OR site:breezy.hr)",
            query.what
        )
    }

    fn normalize(result: TavilyResult, role: &str) -> Option<JobPosting> {
        let TavilyResult {
            url,
            title,
            content,
        } = result;
        if url.is_empty() || title.is_empty() {
            return None;
        }

        let title_lower = title.to_lowercase();
        let content_lower = content.to_lowercase();
        let url_lower = url.to_lowercase();

        if AGGREGATOR_TITLE_SUFFIXES
            .iter()
            .any(|s| title_lower.ends_with(s))
        {
            return None;
        }
        if title.starts_with(|c: char| c.is_ascii_digit()) || title_lower.starts_with("apply to") {
            return None;
        }
        if AGGREGATOR_CONTENT_PREFIXES
            .iter()
            .any(|p| content_lower.starts_with(p))
        {
            return None;
        }
        if SEO_TITLE_PATTERNS.iter().any(|p| title_lower.contains(p)) {
            return None;
        }
        if AGGREGATOR_TITLE_PHRASES
            .iter()
            .any(|p| title_lower.contains(p))
        {
            return None;
        }
        if BAD_URL_PATTERNS.iter().any(|p| url_lower.contains(p)) {
            return None;
        }
        if !JOB_INDICATORS
            .iter()
            .any(|ind| title_lower.contains(ind) || url_lower.contains(ind))
        {
            return None;
        }

        let company = extract_company(&url, &title);
        let description: String = content.chars().take(DESCRIPTION_LIMIT).collect();

        let mut posting = JobPosting::new(&clean_title(&title, role), &company, &url, "web_search");
        posting.location = "See job posting".to_string();
        posting.description = description;
        Some(posting)
    }
}

/// Company from the ATS URL structure where possible, title heuristics
/// otherwise.
fn extract_company(url: &str, title: &str) -> String {
    if url.contains("linkedin.com") {
        return "LinkedIn Job Posting".to_string();
    }
    if url.contains("naukri.com") {
        return "Naukri.com Posting".to_string();
    }
    if url.contains("indeed.com") {
        return "Indeed Posting".to_string();
    }
    if url.contains("greenhouse.io") {
        // Subdomain is the company slug: https://acme-corp.greenhouse.io/...
        if let Some(rest) = url.strip_prefix("https://").or(url.strip_prefix("http://")) {
            if let Some(subdomain) = rest.split('.').next() {
                if !subdomain.is_empty() && subdomain != "greenhouse" && subdomain != "boards" {
                    return slug_to_name(subdomain);
                }
            }
        }
    }
    if url.contains("lever.co") {
        // Path segment after the host: https://jobs.lever.co/acme-corp/...
        let mut segments = url.split('/').skip_while(|s| !s.contains("lever.co"));
        segments.next();
        if let Some(slug) = segments.next() {
            if !slug.is_empty() {
                return slug_to_name(slug);
            }
        }
    }

    if let Some(idx) = title.rfind(" at ") {
        let company = title[idx + 4..].trim();
        if !company.is_empty() {
            return company.to_string();
        }
    }
    if let Some(idx) = title.rfind(" - ") {
        let company = title[idx + 3..].trim();
        if !company.is_empty() {
            return company.to_string();
        }
    }

    "See job posting".to_string()
}

fn slug_to_name(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_title(title: &str, role: &str) -> String {
    let mut cleaned = title;
    for pattern in [" - ", " | ", " at "] {
        if let Some(idx) = cleaned.find(pattern) {
            cleaned = &cleaned[..idx];
            break;
        }
    }
    let cleaned = cleaned.trim();
    if cleaned.len() < 3 {
        role.to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl JobSource for WebSearchSource {
    fn tier(&self) -> &'static str {
        TIER2_WEBSEARCH
    }

    fn name(&self) -> &str {
        "tavily"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobPosting>, HuntError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(HuntError::Config(
                "TAVILY_API_KEY not configured".to_string(),
            ));
        };

        let request = TavilyRequest {
            api_key,
            query: Self::build_query(query),
            search_depth: "advanced",
            max_results: query.results_per_page,
            include_domains: TARGET_DOMAINS.to_vec(),
            include_answer: false,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(SEARCH_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| HuntError::SourceUnavailable(format!("tavily request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(HuntError::SourceUnavailable(format!(
                "tavily returned {} for '{}'",
                response.status(),
                query.what
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| HuntError::Parse(format!("tavily response: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .filter_map(|r| Self::normalize(r, &query.what))
            .collect())
    }
}
