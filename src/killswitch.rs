use regex::Regex;

use crate::models::JobPosting;

const DESCRIPTION_SCAN_CHARS: usize = 500;
/// Short keywords ("hr", "field") only match titles; inside a description
/// they fire on too many innocent sentences.
const MIN_DESCRIPTION_KEYWORD_LEN: usize = 5;

/// Drop postings that trip a negative keyword or disclose a salary under
/// the floor. Undisclosed salaries always pass; the salary data is too
/// sparse to filter on absence.
pub fn apply(
    jobs: Vec<JobPosting>,
    negative_keywords: &[String],
    salary_floor: Option<i64>,
) -> Vec<JobPosting> {
    let title_patterns: Vec<(Regex, &String)> = negative_keywords
        .iter()
        .filter_map(|kw| {
            Regex::new(&format!(r"\b{}\b", regex::escape(&kw.to_lowercase())))
                .ok()
                .map(|re| (re, kw))
        })
        .collect();

    jobs.into_iter()
        .filter(|job| {
            let title = job.title.to_lowercase();
            let description: String = job
                .description
                .to_lowercase()
                .chars()
                .take(DESCRIPTION_SCAN_CHARS)
                .collect();

            for (pattern, keyword) in &title_patterns {
                if pattern.is_match(&title) {
                    return false;
                }
                if keyword.len() > MIN_DESCRIPTION_KEYWORD_LEN
                    && description.contains(&keyword.to_lowercase())
                {
                    return false;
                }
            }

            if let (Some(disclosed), Some(floor)) = (job.salary_min, salary_floor) {
                if disclosed < floor {
                    return false;
                }
            }

            true
        })
        .collect()
}
