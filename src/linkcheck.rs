use std::time::Duration;

use crate::models::JobPosting;
use crate::session::HuntSession;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_SPACING: Duration = Duration::from_secs(2);
const BATCH_CAP: usize = 30;

/// Phrases on a live page that mean the posting itself is dead.
const CLOSED_PHRASES: &[&str] = &[
    "job closed",
    "position filled",
    "no longer accepting",
    "application closed",
    "position is no longer available",
    "this job is no longer available",
    "expired",
    "removed",
    "404",
    "not found",
];

#[derive(Debug, PartialEq, Eq)]
pub enum LinkVerdict {
    Alive,
    Dead(String),
}

/// Weeds out postings whose links already 404 or announce the position
/// is filled. HEAD first; GET only when HEAD is blocked or ambiguous.
pub struct LinkChecker {
    client: reqwest::Client,
    spacing: Duration,
}

impl LinkChecker {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self {
            client,
            spacing: REQUEST_SPACING,
        })
    }

    #[cfg(test)]
    fn without_pacing(mut self) -> Self {
        self.spacing = Duration::ZERO;
        self
    }

    pub async fn check(&self, url: &str) -> LinkVerdict {
        let head = self.client.head(url).send().await;
        match head {
            Ok(response) => {
                let status = response.status();
                match status.as_u16() {
                    404 => LinkVerdict::Dead("404 Not Found".to_string()),
                    410 => LinkVerdict::Dead("410 Gone".to_string()),
                    code if code >= 500 => LinkVerdict::Dead(format!("server error ({code})")),
                    200..=299 => LinkVerdict::Alive,
                    // HEAD blocked or inconclusive: a GET settles it.
                    _ => self.check_with_get(url).await,
                }
            }
            Err(e) if e.is_timeout() => LinkVerdict::Dead("timeout".to_string()),
            Err(_) => self.check_with_get(url).await,
        }
    }

    async fn check_with_get(&self, url: &str) -> LinkVerdict {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return LinkVerdict::Dead(format!("request error: {e}")),
        };
        let status = response.status();
        match status.as_u16() {
            404 => return LinkVerdict::Dead("404 Not Found".to_string()),
            410 => return LinkVerdict::Dead("410 Gone".to_string()),
            code if code >= 500 => return LinkVerdict::Dead(format!("server error ({code})")),
            code if code >= 400 => return LinkVerdict::Dead(format!("client error ({code})")),
            _ => {}
        }

        let body = match response.text().await {
            Ok(text) => text.to_lowercase(),
            Err(_) => return LinkVerdict::Alive,
        };
        match scan_for_closed_phrases(&body) {
            Some(phrase) => LinkVerdict::Dead(format!("page says '{phrase}'")),
            None => LinkVerdict::Alive,
        }
    }

    /// Validates up to 30 postings, pacing requests; anything beyond the
    /// cap is passed through unvalidated rather than held up.
    pub async fn validate_batch(
        &self,
        session: &HuntSession,
        jobs: Vec<JobPosting>,
    ) -> Vec<JobPosting> {
        let mut queue = jobs;
        let overflow = queue.split_off(queue.len().min(BATCH_CAP));

        let mut alive = Vec::with_capacity(queue.len());
        let total = queue.len();
        for (idx, job) in queue.into_iter().enumerate() {
            if job.apply_link.is_empty() {
                session.warn(format!("Skipping job with no link: {}", job.title));
                continue;
            }
            match self.check(&job.apply_link).await {
                LinkVerdict::Alive => alive.push(job),
                LinkVerdict::Dead(reason) => {
                    session.warn(format!("Dead link for '{}': {reason}", job.title));
                }
            }
            if idx + 1 < total && !self.spacing.is_zero() {
                tokio::time::sleep(self.spacing).await;
            }
        }

        session.info(format!(
            "Link check: {}/{} links alive",
            alive.len(),
            total
        ));
        alive.extend(overflow);
        alive
    }
}

fn scan_for_closed_phrases(body: &str) -> Option<&'static str> {
    CLOSED_PHRASES
        .iter()
        .find(|phrase| body.contains(*phrase))
        .copied()
}
