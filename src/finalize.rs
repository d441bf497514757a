use chrono::{DateTime, Utc};
use strsim::jaro_winkler;

use crate::models::{DisplayJob, JobPosting, ResumeFingerprint};
use crate::ranker::extract_required_yoe;

const SHORTLIST_SIZE: usize = 15;
/// Fuzzy threshold for employer-name matching against the tier lists;
/// catches "Flipkart Internet" style legal names.
const NAME_SIMILARITY_THRESHOLD: f64 = 0.92;

const S_TIER_SALARY: i64 = 3_000_000;
const A_PLUS_SALARY: i64 = 2_000_000;
const A_TIER_SALARY: i64 = 1_200_000;
const B_PLUS_SALARY: i64 = 800_000;
const HIGH_SALARY_BADGE: i64 = 2_500_000;
const TOP_PICK_SCORE: i64 = 90;
const PERFECT_MATCH_SCORE: i64 = 95;

const ELITE_COMPANIES: &[&str] = &[
    "google",
    "microsoft",
    "amazon",
    "meta",
    "facebook",
    "apple",
    "netflix",
    "uber",
    "airbnb",
    "stripe",
    "openai",
    "anthropic",
    "databricks",
    "cred",
    "zepto",
    "razorpay",
    "swiggy",
    "zomato",
    "flipkart",
    "phonepe",
    "nvidia",
    "tesla",
    "spacex",
];

const PREMIER_COMPANIES: &[&str] = &[
    "paytm",
    "ola",
    "meesho",
    "sharechat",
    "dream11",
    "byju",
    "unacademy",
    "policybazaar",
    "oyo",
    "lenskart",
    "urban company",
    "nykaa",
    "salesforce",
    "adobe",
    "oracle",
    "sap",
    "atlassian",
    "servicenow",
    "workday",
    "snowflake",
    "confluent",
    "visa",
    "mastercard",
    "paypal",
    "square",
    "coinbase",
    "instacart",
    "doordash",
    "shopify",
];

fn normalize_company(name: &str) -> String {
    let mut normalized = name.to_lowercase().trim().to_string();
    for suffix in [" india", " pvt ltd", " private limited", " ltd"] {
        normalized = normalized.replace(suffix, "");
    }
    normalized.trim().to_string()
}

fn in_list(company: &str, list: &[&str]) -> bool {
    let normalized = normalize_company(company);
    if normalized.is_empty() {
        return false;
    }
    list.iter().any(|entry| {
        normalized.contains(entry)
            || entry.contains(normalized.as_str())
            || jaro_winkler(entry, &normalized) > NAME_SIMILARITY_THRESHOLD
    })
}

/// S/A+/A/B+/B employer bands: the named elite/premier sets outrank the
/// salary bands, salary fills in for everyone else.
pub fn classify_tier(company: &str, salary_min: Option<i64>) -> &'static str {
    let salary = salary_min.unwrap_or(0);
    if salary > S_TIER_SALARY || in_list(company, ELITE_COMPANIES) {
        return "S";
    }
    if salary > A_PLUS_SALARY || in_list(company, PREMIER_COMPANIES) {
        return "A+";
    }
    if salary > A_TIER_SALARY {
        return "A";
    }
    if salary > B_PLUS_SALARY {
        return "B+";
    }
    "B"
}

fn assign_badges(job: &JobPosting, rank: usize, tier: &str, now: DateTime<Utc>) -> Vec<String> {
    let mut badges = Vec::new();

    if in_list(&job.company, ELITE_COMPANIES) {
        badges.push("🏆 Elite Company".to_string());
    }

    if rank == 1 {
        badges.push("⭐ Best Match".to_string());
    } else if job.match_score >= TOP_PICK_SCORE {
        badges.push("🔥 Top Pick".to_string());
    }

    if let Some(posted) = job.posted_date {
        if (now - posted).num_days() < 2 {
            badges.push("⚡ Recently Posted".to_string());
        }
    }

    if tier == "S" || tier == "A+" {
        badges.push(format!("🎯 {tier}-Tier"));
    }

    if job.salary_min.unwrap_or(0) > HIGH_SALARY_BADGE {
        badges.push("💰 High Salary".to_string());
    }

    badges
}

/// Why the score is below 100: missing headline skills, an experience
/// shortfall worth mentioning, or pay under expectation.
fn gap_analysis(job: &JobPosting, fingerprint: &ResumeFingerprint) -> String {
    if job.match_score >= PERFECT_MATCH_SCORE {
        return "Perfect match!".to_string();
    }

    let mut gaps = Vec::new();
    let description = job.description.to_lowercase();

    let missing: Vec<&str> = fingerprint
        .expert_skills
        .iter()
        .take(5)
        .filter(|skill| !description.contains(&skill.to_lowercase()))
        .map(|s| s.as_str())
        .collect();
    // More than 3 missing usually means the description is just terse.
    if !missing.is_empty() && missing.len() <= 3 {
        gaps.push(format!(
            "Missing: {}",
            missing[..missing.len().min(2)].join(", ")
        ));
    }

    let required = extract_required_yoe(&description);
    let user_yoe = fingerprint.years_of_experience;
    if required > 0 && user_yoe < required && required - user_yoe >= 2 {
        gaps.push(format!(
            "Requires {required}y exp (you have {user_yoe}y)"
        ));
    }

    let expected = fingerprint.expected_salary_min;
    if let Some(offered) = job.salary_min {
        if expected > 0 && offered > 0 && (offered as f64) < (expected as f64) * 0.8 {
            gaps.push("Salary below expectation".to_string());
        }
    }

    if gaps.is_empty() {
        "Good match".to_string()
    } else {
        gaps.join(" | ")
    }
}

pub fn format_salary(salary_min: Option<i64>, salary_max: Option<i64>) -> String {
    let Some(min) = salary_min.filter(|&s| s > 0) else {
        return "Not disclosed".to_string();
    };
    let min_lpa = (min as f64 / 100_000.0).round() as i64;
    match salary_max.filter(|&max| max > min) {
        Some(max) => {
            let max_lpa = (max as f64 / 100_000.0).round() as i64;
            format!("₹{min_lpa}-{max_lpa} LPA")
        }
        None => format!("₹{min_lpa}+ LPA"),
    }
}

/// Turn the scored shortlist into the user-facing payload: top 15, 1-based
/// rank, employer tier, badges, gap line and formatted salary.
pub fn finalize(
    jobs: Vec<JobPosting>,
    fingerprint: &ResumeFingerprint,
    now: DateTime<Utc>,
) -> Vec<DisplayJob> {
    jobs.into_iter()
        .take(SHORTLIST_SIZE)
        .enumerate()
        .map(|(idx, job)| {
            let rank = idx + 1;
            let tier = classify_tier(&job.company, job.salary_min);
            let badges = assign_badges(&job, rank, tier, now);
            let gap = gap_analysis(&job, fingerprint);
            let salary = format_salary(job.salary_min, job.salary_max);

            DisplayJob {
                title: job.title,
                company: job.company,
                location: job.location,
                description: job.description,
                apply_link: job.apply_link,
                source: job.source,
                posted_date: job.posted_date,
                salary_min: job.salary_min,
                salary_max: job.salary_max,
                match_score: job.match_score,
                relevance_score: job.relevance_score,
                tier: tier.to_string(),
                tier_label: format!("{tier}-Tier"),
                badges,
                gap_analysis: gap,
                salary,
                rank,
            }
        })
        .collect()
}
