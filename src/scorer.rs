use std::fmt::Write as _;
use std::sync::Arc;

use crate::models::{JobPosting, ResumeFingerprint};
use crate::provider::{CompletionProvider, extract_json_object};
use crate::session::HuntSession;

const SCORE_CAP: usize = 30;
const BATCH_SIZE: usize = 5;
const FALLBACK_SCORE: i64 = 50;
const SUMMARY_DESCRIPTION_CHARS: usize = 300;

/// Scores the shortlist against the candidate fingerprint, 0-100. Every
/// failure degrades to a neutral 50 so a flaky provider cannot empty the
/// results.
pub struct MatchScorer {
    provider: Arc<dyn CompletionProvider>,
}

impl MatchScorer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Scores at most the top 30 postings (the rest never reach the
    /// finalizer anyway) and returns them sorted by match score.
    pub async fn score(
        &self,
        session: &HuntSession,
        mut jobs: Vec<JobPosting>,
        fingerprint: &ResumeFingerprint,
    ) -> Vec<JobPosting> {
        jobs.truncate(SCORE_CAP);
        if jobs.is_empty() {
            return jobs;
        }

        if !fingerprint.is_useful() {
            session.warn("No usable fingerprint, assigning neutral match scores");
            for job in &mut jobs {
                job.match_score = FALLBACK_SCORE;
            }
            return jobs;
        }

        let mut scored: Vec<JobPosting> = Vec::with_capacity(jobs.len());
        for batch in jobs.chunks(BATCH_SIZE) {
            let scores = match self.score_batch(batch, fingerprint).await {
                Ok(scores) => scores,
                Err(e) => {
                    session.warn(format!("Scoring batch failed, using neutral scores: {e}"));
                    Vec::new()
                }
            };
            for (idx, job) in batch.iter().enumerate() {
                let mut job = job.clone();
                job.match_score = scores
                    .get(idx)
                    .copied()
                    .unwrap_or(FALLBACK_SCORE)
                    .clamp(0, 100);
                scored.push(job);
            }
        }

        scored.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        if let Some(top) = scored.first() {
            session.info(format!(
                "Scored {} jobs (top: {})",
                scored.len(),
                top.match_score
            ));
        }
        scored
    }

    async fn score_batch(
        &self,
        batch: &[JobPosting],
        fingerprint: &ResumeFingerprint,
    ) -> anyhow::Result<Vec<i64>> {
        let mut summaries = String::new();
        for (idx, job) in batch.iter().enumerate() {
            let description: String = job
                .description
                .chars()
                .take(SUMMARY_DESCRIPTION_CHARS)
                .collect();
            let _ = writeln!(
                summaries,
                "{}. Title: {}\n   Company: {}\n   Description: {}...",
                idx + 1,
                job.title,
                job.company,
                description
            );
        }

        let prompt = format!(
            "Score these {} jobs against the candidate profile (0-100).\n\n\
             Candidate Profile (Fingerprint):\n{}\n\n\
             Jobs to Score:\n{summaries}\n\
             Scoring Criteria:\n\
             - Expert Skills Match (30%): how many expert_skills match the job?\n\
             - Proficient Skills Match (20%): how many proficient_skills match?\n\
             - Stack Alignment (20%): does the job match primary_stack?\n\
             - YoE Fit (15%): does the job's experience requirement match the candidate?\n\
             - Domain Relevance (10%): does the job domain match the candidate's domains?\n\
             - No Poison Keywords (5%): the job should NOT mention poison_keywords\n\n\
             Return ONLY a JSON object of scores: {{\"scores\": [85, 72, 91]}}\n\
             Be strict but fair. Return ONLY the JSON, no explanations.",
            batch.len(),
            serde_json::to_string_pretty(fingerprint)?
        );

        let response = self.provider.complete(&prompt, 300).await?;
        let json = extract_json_object(&response)
            .ok_or_else(|| anyhow::anyhow!("no JSON object in scoring response"))?;
        let value: serde_json::Value = serde_json::from_str(json)?;
        let scores = value
            .get("scores")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("no scores array in scoring response"))?
            .iter()
            .filter_map(|v| v.as_i64())
            .collect();
        Ok(scores)
    }
}
