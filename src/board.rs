use async_trait::async_trait;
use scraper::{Html, Selector};
use std::env;
use std::time::Duration;

use crate::error::HuntError;
use crate::models::{JobPosting, SourceQuery};
use crate::source::{JobSource, TIER3_SCRAPE};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Last-resort tier: scrape a single configured job board listing page.
/// Disabled unless SCRAPE_BOARD_URL is set; every failure degrades to an
/// empty contribution since the waterfall must never depend on this tier.
pub struct BoardSource {
    board_url: Option<String>,
    client: reqwest::Client,
}

impl BoardSource {
    pub fn from_env() -> Result<Self, HuntError> {
        let board_url = env::var("SCRAPE_BOARD_URL").ok().filter(|u| !u.is_empty());
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .map_err(|e| HuntError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { board_url, client })
    }

    fn parse_listing(html: &str, query: &SourceQuery, base_url: &str) -> Vec<JobPosting> {
        let document = Html::parse_document(html);

        // Common job board markup: cards with a title link and a company
        // element. Selectors are static, parse failures just mean no rows.
        let card_sel = match Selector::parse(
            "[class*=job-card], [class*=job-listing], [class*=jobTuple], article",
        ) {
            Ok(sel) => sel,
            Err(_) => return Vec::new(),
        };
        let title_sel = match Selector::parse("a[href]") {
            Ok(sel) => sel,
            Err(_) => return Vec::new(),
        };
        let company_sel =
            Selector::parse("[class*=company], [class*=employer], [class*=org]").ok();

        let keyword = query.what.to_lowercase();
        let mut postings = Vec::new();

        for card in document.select(&card_sel) {
            let Some(link) = card.select(&title_sel).next() else {
                continue;
            };
            let title = link.text().collect::<String>().trim().to_string();
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if title.is_empty() || href.is_empty() {
                continue;
            }
            // Keep only cards that mention the search keyword.
            if !title.to_lowercase().contains(&keyword) {
                continue;
            }

            let apply_link = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
            };

            let company = company_sel
                .as_ref()
                .and_then(|sel| card.select(sel).next())
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "See job posting".to_string());

            let mut posting = JobPosting::new(&title, &company, &apply_link, "board_scrape");
            posting.location = query.location.clone();
            postings.push(posting);
        }

        postings
    }
}

#[async_trait]
impl JobSource for BoardSource {
    fn tier(&self) -> &'static str {
        TIER3_SCRAPE
    }

    fn name(&self) -> &str {
        "board"
    }

    fn available(&self) -> bool {
        self.board_url.is_some()
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobPosting>, HuntError> {
        let Some(board_url) = self.board_url.as_deref() else {
            return Ok(Vec::new());
        };

        let response = match self.client.get(board_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("board scrape failed: {e}");
                return Ok(Vec::new());
            }
        };
        if !response.status().is_success() {
            tracing::warn!("board scrape returned {}", response.status());
            return Ok(Vec::new());
        }

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("board scrape body read failed: {e}");
                return Ok(Vec::new());
            }
        };

        Ok(Self::parse_listing(&html, query, board_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SourceQuery {
        SourceQuery {
            what: "React".to_string(),
            location: "Bangalore".to_string(),
            max_days_old: 21,
            results_per_page: 20,
        }
    }

    const LISTING: &str = r#"
        <html><body>
            <article class="job-card">
                <a href="/jobs/react-developer-123">React Developer</a>
                <span class="company-name">Acme Corp</span>
            </article>
            <article class="job-card">
                <a href="https://board.example.com/jobs/456">Senior React Engineer</a>
                <span class="company-name">Globex</span>
            </article>
            <article class="job-card">
                <a href="/jobs/789">Java Developer</a>
                <span class="company-name">Initech</span>
            </article>
        </body></html>
    "#;

    #[test]
    fn parses_matching_cards() {
        let postings = BoardSource::parse_listing(LISTING, &query(), "https://board.example.com");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].title, "React Developer");
        assert_eq!(postings[0].company, "Acme Corp");
        assert_eq!(
            postings[0].apply_link,
            "https://board.example.com/jobs/react-developer-123"
        );
        assert_eq!(postings[1].company, "Globex");
        assert_eq!(postings[0].source, "board_scrape");
    }

    #[test]
    fn relative_links_are_resolved_against_the_board() {
        let postings = BoardSource::parse_listing(LISTING, &query(), "https://board.example.com/");
        assert!(postings[0].apply_link.starts_with("https://board.example.com/jobs/"));
    }

    #[test]
    fn empty_page_yields_nothing() {
        let postings =
            BoardSource::parse_listing("<html><body></body></html>", &query(), "https://b.example");
        assert!(postings.is_empty());
    }

    #[test]
    fn source_without_url_is_unavailable() {
        let source = BoardSource {
            board_url: None,
            client: reqwest::Client::new(),
        };
        assert!(!source.available());
    }
}
