use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::{JobPosting, ResumeFingerprint};

const TITLE_EXACT_BONUS: i64 = 45;
const TITLE_PARTIAL_BONUS: i64 = 25;
const EXPERT_DENSITY_BASE: i64 = 10;
const EXPERT_DENSITY_EXTRA_CAP: i64 = 5;
const PROFICIENT_DENSITY_BASE: i64 = 4;
const PROFICIENT_DENSITY_EXTRA_CAP: i64 = 3;
const POISON_PENALTY: i64 = 60;
const POISON_MIN_OCCURRENCES: usize = 2;
const YOE_FIT_BONUS: i64 = 15;
const OVERQUALIFIED_PENALTY: i64 = 15;
const UNDERQUALIFIED_PENALTY_PER_YEAR: i64 = 25;
const FRESH_BONUS: i64 = 15;
const RECENT_BONUS: i64 = 8;
const DISCARD_THRESHOLD: i64 = 10;
const AUTO_ACCEPT_COUNT: usize = 5;

/// Output of the deterministic ranking pass: the highest scorers bypass
/// the precision filter entirely, the rest go on for review.
#[derive(Debug, Default)]
pub struct RankOutcome {
    pub auto_accepted: Vec<JobPosting>,
    pub for_review: Vec<JobPosting>,
    pub discarded: usize,
}

/// "React.js" / "Node.js" / "Vue.JS" collapse to their bare names.
fn normalize_skill(skill: &str) -> String {
    skill
        .to_lowercase()
        .replace(".js", "")
        .replace('.', "")
        .trim()
        .to_string()
}

fn whole_word_count(haystack: &str, needle: &str) -> usize {
    Regex::new(&format!(r"\b{}\b", regex::escape(needle)))
        .map(|re| re.find_iter(haystack).count())
        .unwrap_or(0)
}

fn substring_count(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Patterns like "3-5 years experience", "4+ years", "minimum 3 years".
/// Returns the lower bound, 0 when the description names none.
pub fn extract_required_yoe(description: &str) -> u32 {
    let patterns = [
        r"(\d+)\+?\s*-?\s*\d*\s*years?\s+(?:of\s+)?experience",
        r"minimum\s+(\d+)\s+years?",
        r"at\s+least\s+(\d+)\s+years?",
        r"(\d+)\s*\+\s*years?",
    ];
    let lower = description.to_lowercase();
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(&lower) {
            if let Some(m) = caps.get(1) {
                if let Ok(years) = m.as_str().parse::<u32>() {
                    return years;
                }
            }
        }
    }
    0
}

fn score_job(job: &JobPosting, fingerprint: &ResumeFingerprint, now: DateTime<Utc>) -> i64 {
    let title = job.title.to_lowercase();
    let text = format!("{} {}", job.description, job.title).to_lowercase();

    let expert: Vec<String> = fingerprint
        .expert_skills
        .iter()
        .map(|s| normalize_skill(s))
        .filter(|s| !s.is_empty())
        .collect();
    let proficient: Vec<String> = fingerprint
        .proficient_skills
        .iter()
        .map(|s| normalize_skill(s))
        .filter(|s| !s.is_empty())
        .collect();

    let mut score = 0i64;

    // Title match: an expert skill in the title dominates everything else.
    if expert.iter().any(|skill| title.contains(skill.as_str())) {
        score += TITLE_EXACT_BONUS;
    } else if expert
        .iter()
        .chain(proficient.iter())
        .any(|skill| title.contains(skill.as_str()))
    {
        score += TITLE_PARTIAL_BONUS;
    }

    // Skill density over title+description.
    for skill in &expert {
        let count = whole_word_count(&text, skill);
        if count > 0 {
            score += EXPERT_DENSITY_BASE;
            score += ((count - 1) as i64).min(EXPERT_DENSITY_EXTRA_CAP);
        }
    }
    for skill in &proficient {
        let count = whole_word_count(&text, skill);
        if count > 0 {
            score += PROFICIENT_DENSITY_BASE;
            score += ((count - 1) as i64).min(PROFICIENT_DENSITY_EXTRA_CAP);
        }
    }

    // A poison keyword appearing twice means it IS the stack being hired
    // for. One mention is often just a "nice to have".
    for poison in &fingerprint.poison_keywords {
        let normalized = normalize_skill(poison);
        if !normalized.is_empty() && substring_count(&text, &normalized) >= POISON_MIN_OCCURRENCES {
            score -= POISON_PENALTY;
            break;
        }
    }

    // Experience fit against the posting's stated requirement.
    let required = extract_required_yoe(&text) as i64;
    if required > 0 {
        let delta = fingerprint.years_of_experience as i64 - required;
        if (-1..=1).contains(&delta) {
            score += YOE_FIT_BONUS;
        } else if delta > 2 {
            score -= OVERQUALIFIED_PENALTY;
        } else if delta < -1 {
            score -= delta.abs() * UNDERQUALIFIED_PENALTY_PER_YEAR;
        }
    }

    // Freshness.
    if let Some(posted) = job.posted_date {
        let days_old = (now - posted).num_days();
        if days_old < 2 {
            score += FRESH_BONUS;
        } else if days_old < 7 {
            score += RECENT_BONUS;
        }
    }

    score
}

/// Deterministic scoring pass. Pure: `now` is a parameter so freshness
/// is reproducible in tests.
pub fn rank(
    mut jobs: Vec<JobPosting>,
    fingerprint: &ResumeFingerprint,
    now: DateTime<Utc>,
) -> RankOutcome {
    for job in &mut jobs {
        job.relevance_score = score_job(job, fingerprint, now);
    }
    jobs.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    let total = jobs.len();
    let mut survivors: Vec<JobPosting> = jobs
        .into_iter()
        .filter(|j| j.relevance_score >= DISCARD_THRESHOLD)
        .collect();
    let discarded = total - survivors.len();

    let for_review = survivors.split_off(survivors.len().min(AUTO_ACCEPT_COUNT));
    RankOutcome {
        auto_accepted: survivors,
        for_review,
        discarded,
    }
}
