use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable input for one hunt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub job_titles: Vec<String>,
    pub locations: Vec<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub employment_types: Vec<String>,
}

impl SearchCriteria {
    pub fn primary_role(&self) -> &str {
        self.job_titles
            .first()
            .map(|s| s.as_str())
            .unwrap_or("Developer")
    }
}

/// Derived, cached profile of a candidate. Created once per
/// (user, resume-hash, role) and read-only for the rest of the hunt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeFingerprint {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub seniority_level: String,
    #[serde(default, rename = "yoe")]
    pub years_of_experience: u32,
    #[serde(default)]
    pub expert_skills: Vec<String>,
    #[serde(default)]
    pub proficient_skills: Vec<String>,
    #[serde(default)]
    pub familiar_skills: Vec<String>,
    #[serde(default)]
    pub primary_stack: String,
    #[serde(default)]
    pub poison_keywords: Vec<String>,
    #[serde(default)]
    pub dealbreakers: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub expected_salary_min: i64,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
}

impl ResumeFingerprint {
    /// Fill the fields the extractor is allowed to omit.
    pub fn with_defaults(mut self) -> Self {
        if self.role.is_empty() {
            self.role = "Developer".to_string();
        }
        if self.seniority_level.is_empty() {
            self.seniority_level = "Mid-Level".to_string();
        }
        if self.primary_stack.is_empty() {
            self.primary_stack = "General".to_string();
        }
        self
    }

    /// An extraction with no skills and the placeholder role carries no signal.
    pub fn is_useful(&self) -> bool {
        !self.expert_skills.is_empty() || (!self.role.is_empty() && self.role != "Developer")
    }
}

/// One query sent to an external source: a keyword crossed with a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceQuery {
    pub what: String,
    #[serde(rename = "where")]
    pub location: String,
    pub max_days_old: u32,
    pub results_per_page: u32,
}

/// Normalized posting, regardless of which source produced it.
/// Identity is `apply_link`; normalized title+company is the secondary
/// dedup key since some sources hand out unstable links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub apply_link: String,
    pub source: String,
    pub posted_date: Option<DateTime<Utc>>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[serde(default)]
    pub source_id: Option<String>,

    // Annotations accumulated as the posting flows through the pipeline.
    // relevance_score is a free-form heuristic (may be negative);
    // match_score is a bounded 0-100 percentage. The two are independent.
    #[serde(default)]
    pub relevance_score: i64,
    #[serde(default)]
    pub match_score: i64,
}

impl JobPosting {
    pub fn new(title: &str, company: &str, apply_link: &str, source: &str) -> Self {
        Self {
            title: title.to_string(),
            company: company.to_string(),
            location: String::new(),
            description: String::new(),
            apply_link: apply_link.to_string(),
            source: source.to_string(),
            posted_date: None,
            salary_min: None,
            salary_max: None,
            source_id: None,
            relevance_score: 0,
            match_score: 0,
        }
    }
}

/// Final user-facing record: the posting plus display annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    #[serde(rename = "applyLink")]
    pub apply_link: String,
    pub source: String,
    #[serde(rename = "postedDate")]
    pub posted_date: Option<DateTime<Utc>>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[serde(rename = "matchScore")]
    pub match_score: i64,
    pub relevance_score: i64,
    pub tier: String,
    #[serde(rename = "tierLabel")]
    pub tier_label: String,
    pub badges: Vec<String>,
    #[serde(rename = "gapAnalysis")]
    pub gap_analysis: String,
    pub salary: String,
    pub rank: usize,
}

/// Payload handed back to the caller, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntResult {
    pub success: bool,
    #[serde(rename = "totalJobs")]
    pub total_jobs: usize,
    pub jobs: Vec<DisplayJob>,
    #[serde(rename = "tierUsed")]
    pub tier_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HuntResult {
    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            total_jobs: 0,
            jobs: Vec::new(),
            tier_used: Vec::new(),
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_defaults_fill_placeholders() {
        let fp = ResumeFingerprint::default().with_defaults();
        assert_eq!(fp.role, "Developer");
        assert_eq!(fp.seniority_level, "Mid-Level");
        assert_eq!(fp.primary_stack, "General");
        assert!(!fp.is_useful());
    }

    #[test]
    fn fingerprint_with_skills_is_useful() {
        let fp = ResumeFingerprint {
            expert_skills: vec!["react".to_string()],
            ..Default::default()
        }
        .with_defaults();
        assert!(fp.is_useful());
    }

    #[test]
    fn fingerprint_parses_partial_json() {
        let fp: ResumeFingerprint =
            serde_json::from_str(r#"{"role": "Backend Engineer", "yoe": 3}"#).unwrap();
        assert_eq!(fp.role, "Backend Engineer");
        assert_eq!(fp.years_of_experience, 3);
        assert!(fp.expert_skills.is_empty());
    }

    #[test]
    fn primary_role_falls_back() {
        let criteria = SearchCriteria::default();
        assert_eq!(criteria.primary_role(), "Developer");
    }
}
