use serde::Serialize;
use std::sync::Arc;

use crate::models::{JobPosting, SearchCriteria};
use crate::provider::{CompletionProvider, extract_json_array, extract_json_object};
use crate::session::HuntSession;

const BATCH_SIZE: usize = 20;
const MAX_REVIEWED: usize = 80;
const SUMMARY_DESCRIPTION_CHARS: usize = 400;

#[derive(Serialize)]
struct JobSummary<'a> {
    id: usize,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary_min: Option<i64>,
    description: String,
}

/// Strict relevance pass over the middle of the ranking. Fails open: any
/// provider or parse failure keeps the whole batch, losing a real match
/// costs more than carrying a weak one.
pub struct PrecisionFilter {
    provider: Arc<dyn CompletionProvider>,
}

impl PrecisionFilter {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Reviews at most 80 postings in batches of 20 and returns the
    /// auto-accepted slice followed by the survivors, in rank order.
    pub async fn filter(
        &self,
        session: &HuntSession,
        auto_accepted: Vec<JobPosting>,
        for_review: Vec<JobPosting>,
        criteria: &SearchCriteria,
    ) -> Vec<JobPosting> {
        if for_review.is_empty() {
            return auto_accepted;
        }

        let total = for_review.len();
        let mut queue = for_review;
        // Anything past the review cap is the lowest-ranked tail; drop it.
        let overflow = queue.split_off(queue.len().min(MAX_REVIEWED));
        if !overflow.is_empty() {
            session.info(format!(
                "Dropping {} lowest-ranked jobs beyond review cap",
                overflow.len()
            ));
        }

        let mut survivors: Vec<JobPosting> = Vec::new();
        for batch in queue.chunks(BATCH_SIZE) {
            match self.review_batch(batch, criteria).await {
                Ok(relevant_ids) => {
                    for id in relevant_ids {
                        if let Some(job) = batch.get(id) {
                            survivors.push(job.clone());
                        }
                    }
                }
                Err(e) => {
                    session.warn(format!("Review batch failed, keeping all {}: {e}", batch.len()));
                    survivors.extend(batch.iter().cloned());
                }
            }
        }

        session.info(format!(
            "Precision filter: {}/{} reviewed jobs retained",
            survivors.len(),
            total.min(MAX_REVIEWED)
        ));

        let mut combined = auto_accepted;
        combined.extend(survivors);
        combined
    }

    async fn review_batch(
        &self,
        batch: &[JobPosting],
        criteria: &SearchCriteria,
    ) -> anyhow::Result<Vec<usize>> {
        let summaries: Vec<JobSummary> = batch
            .iter()
            .enumerate()
            .map(|(id, job)| JobSummary {
                id,
                title: &job.title,
                company: &job.company,
                location: &job.location,
                salary_min: job.salary_min,
                description: job
                    .description
                    .chars()
                    .take(SUMMARY_DESCRIPTION_CHARS)
                    .collect(),
            })
            .collect();

        let roles = if criteria.job_titles.is_empty() {
            "Any software role".to_string()
        } else {
            criteria.job_titles.join(", ")
        };
        let locations = if criteria.locations.is_empty() {
            "Any location".to_string()
        } else {
            criteria.locations.join(", ")
        };
        let salary = match (criteria.salary_min, criteria.salary_max) {
            (Some(min), Some(max)) => format!("{min} - {max} INR/year (if disclosed)"),
            (Some(min), None) => format!("at least {min} INR/year (if disclosed)"),
            _ => "Any salary".to_string(),
        };
        let employment = if criteria.employment_types.is_empty() {
            "Any type".to_string()
        } else {
            criteria.employment_types.join(", ")
        };

        let prompt = format!(
            "You are a strict job relevance filter. Review these jobs against the user's search \
             criteria and ONLY keep jobs that match.\n\n\
             User's Search Criteria:\n\
             - Desired Roles: {roles}\n\
             - Target Locations: {locations}\n\
             - Salary Range: {salary}\n\
             - Employment Types: {employment}\n\n\
             Jobs to Review:\n{}\n\n\
             STRICT FILTERING RULES:\n\
             1. Role Match: the title MUST relate to one of the desired roles. REJECT different \
             fields (sales, marketing, HR, support, BPO, telecaller) and badly mismatched seniority.\n\
             2. Location Match: the location MUST match a target location or be remote.\n\
             3. Salary Check: if salary is disclosed and below minimum, REJECT. If not disclosed, KEEP.\n\
             4. Relevance: the description MUST align with the desired roles.\n\n\
             Return ONLY a JSON object with IDs of jobs that PASS all criteria:\n\
             {{\"relevant_ids\": [0, 2, 5]}}\n\n\
             Be VERY strict - when in doubt, REJECT.",
            serde_json::to_string_pretty(&summaries)?
        );

        let response = self.provider.complete(&prompt, 500).await?;
        parse_relevant_ids(&response)
    }
}

/// `{"relevant_ids": [...]}` with a bare-array fallback for completions
/// that skip the wrapper object.
fn parse_relevant_ids(response: &str) -> anyhow::Result<Vec<usize>> {
    if let Some(json) = extract_json_object(response) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(json) {
            if let Some(ids) = value.get("relevant_ids").and_then(|v| v.as_array()) {
                return Ok(ids
                    .iter()
                    .filter_map(|v| v.as_u64().map(|n| n as usize))
                    .collect());
            }
        }
    }
    if let Some(json) = extract_json_array(response) {
        if let Ok(ids) = serde_json::from_str::<Vec<usize>>(json) {
            return Ok(ids);
        }
    }
    Err(anyhow::anyhow!("no relevant_ids in review response"))
}
