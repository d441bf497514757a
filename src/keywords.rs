use std::sync::Arc;

use crate::models::{ResumeFingerprint, SearchCriteria};
use crate::provider::{CompletionProvider, extract_json_array};
use crate::session::HuntSession;

const MAX_KEYWORDS: usize = 8;

/// Known role -> search keywords. Dictionary first, provider only for
/// roles the map does not cover.
static KEYWORD_MAP: &[(&str, &[&str])] = &[
    (
        "mern",
        &[
            "MERN",
            "React",
            "Node.js",
            "MongoDB",
            "Express",
            "Full Stack",
            "Fullstack",
            "JavaScript",
        ],
    ),
    (
        "mean",
        &[
            "MEAN",
            "Angular",
            "Node.js",
            "MongoDB",
            "Express",
            "Full Stack",
            "JavaScript",
        ],
    ),
    (
        "java full stack",
        &[
            "Java",
            "Spring Boot",
            "Hibernate",
            "Microservices",
            "Full Stack",
            "Backend",
        ],
    ),
    (
        "java",
        &["Java", "Spring", "Spring Boot", "Backend", "Developer", "Engineer"],
    ),
    (
        "python",
        &["Python", "Django", "Flask", "FastAPI", "Python Developer", "Backend"],
    ),
    (
        "frontend",
        &[
            "React",
            "Vue",
            "Angular",
            "JavaScript",
            "TypeScript",
            "Frontend",
            "UI Developer",
        ],
    ),
    (
        "backend",
        &["Backend", "API", "Server", "Microservices", "Node.js", "Python", "Java"],
    ),
    (
        "data scientist",
        &[
            "Data Science",
            "Machine Learning",
            "Python",
            "SQL",
            "Pandas",
            "ML Engineer",
        ],
    ),
    (
        "devops",
        &["DevOps", "Kubernetes", "Docker", "CI/CD", "AWS", "Azure", "Cloud"],
    ),
    (
        "react",
        &["React", "React.js", "ReactJS", "Frontend", "JavaScript", "TypeScript"],
    ),
    (
        "node",
        &["Node.js", "Node", "Backend", "JavaScript", "Express", "API"],
    ),
    (
        "angular",
        &["Angular", "Frontend", "TypeScript", "JavaScript", "UI Developer"],
    ),
    ("vue", &["Vue", "Vue.js", "Frontend", "JavaScript", "UI Developer"]),
    ("full stack", &["Full Stack", "Fullstack", "Developer", "Engineer"]),
    ("django", &["Django", "Python", "Backend", "Web Developer"]),
    ("flask", &["Flask", "Python", "Backend", "API Developer"]),
    (
        "spring boot",
        &["Spring Boot", "Java", "Backend", "Microservices"],
    ),
    (".net", &[".NET", "C#", "Backend", "ASP.NET", "Developer"]),
    (
        "golang",
        &["Go", "Golang", "Backend", "Microservices", "Developer"],
    ),
    ("rust", &["Rust", "Systems", "Backend", "Developer"]),
    (
        "mobile",
        &["React Native", "Flutter", "iOS", "Android", "Mobile Developer"],
    ),
    ("ios", &["iOS", "Swift", "Mobile", "Developer"]),
    ("android", &["Android", "Kotlin", "Java", "Mobile", "Developer"]),
];

/// Keys whose keywords name a whole stack. When one of these matches, it
/// replaces everything else gathered so far.
const STACK_KEYS: &[&str] = &["mern", "mean", "java full stack", "python"];

fn lookup(key: &str) -> Option<&'static [&'static str]> {
    KEYWORD_MAP
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

const SENIORITY_TOKENS: &[&str] = &[
    "senior",
    "junior",
    "lead",
    "principal",
    "staff",
    "mid-level",
    "sr",
    "sr.",
    "jr",
    "jr.",
];

/// Strip seniority tokens so "Senior React Developer" hits the "react" entry.
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|token| !SENIORITY_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order-preserving push; the map lists keywords best-first and the cap
/// keeps only the front.
fn push_unique(keywords: &mut Vec<String>, candidates: impl IntoIterator<Item = String>) {
    for candidate in candidates {
        if !keywords.iter().any(|k| k == &candidate) {
            keywords.push(candidate);
        }
    }
}

/// Keywords that clash with a MERN/MEAN candidate's stack.
fn prune_conflicts(keywords: Vec<String>, expert_skills: &[String]) -> Vec<String> {
    let skills: Vec<String> = expert_skills.iter().map(|s| s.to_lowercase()).collect();
    let has = |names: &[&str]| names.iter().any(|n| skills.iter().any(|s| s == n));

    let conflicting: &[&str] = if has(&["react", "node", "mongodb", "express"]) {
        &[
            "python",
            "java",
            ".net",
            "php",
            "django",
            "flask",
            "spring",
            "spring boot",
        ]
    } else if has(&["angular", "node", "mongodb"]) {
        &[
            "python",
            "java",
            ".net",
            "php",
            "django",
            "flask",
            "spring",
            "spring boot",
            "react",
            "vue",
        ]
    } else {
        return keywords;
    };

    keywords
        .into_iter()
        .filter(|kw| !conflicting.contains(&kw.to_lowercase().as_str()))
        .collect()
}

pub struct KeywordGenerator {
    provider: Arc<dyn CompletionProvider>,
}

impl KeywordGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate(
        &self,
        session: &HuntSession,
        criteria: &SearchCriteria,
        fingerprint: &ResumeFingerprint,
    ) -> Vec<String> {
        let roles = &criteria.job_titles;
        if roles.is_empty() {
            return Vec::new();
        }

        let mut keywords: Vec<String> = Vec::new();
        let mut stack_keywords: Vec<String> = Vec::new();
        let mut unknown_roles: Vec<String> = Vec::new();

        for title in roles {
            let normalized = normalize_title(title);

            // "MERN Stack Developer" still counts as the "mern" stack.
            if let Some(stack_key) = STACK_KEYS.iter().find(|k| normalized.contains(*k)) {
                if let Some(kws) = lookup(stack_key) {
                    push_unique(&mut stack_keywords, kws.iter().map(|s| s.to_string()));
                }
                continue;
            }

            if let Some(kws) = lookup(&normalized) {
                push_unique(&mut keywords, kws.iter().map(|s| s.to_string()));
                continue;
            }

            // Partial match: "react native developer" hits the "react" entry.
            if let Some((_, kws)) = KEYWORD_MAP.iter().find(|(k, _)| normalized.contains(k)) {
                push_unique(&mut keywords, kws.iter().map(|s| s.to_string()));
                continue;
            }

            unknown_roles.push(title.clone());
        }

        // A recognized stack overrides the scattered per-title keywords,
        // minus anything that clashes with the candidate's expertise.
        if !stack_keywords.is_empty() {
            keywords = prune_conflicts(stack_keywords, &fingerprint.expert_skills);
        }

        if !unknown_roles.is_empty() {
            match self.ask_provider(&unknown_roles, fingerprint).await {
                Ok(ai_keywords) => {
                    session.info(format!(
                        "Generated {} keywords for custom roles",
                        ai_keywords.len()
                    ));
                    push_unique(&mut keywords, ai_keywords);
                }
                Err(e) => {
                    session.warn(format!("Keyword generation failed: {e}"));
                    push_unique(&mut keywords, [unknown_roles[0].clone()]);
                }
            }
        }

        let keywords: Vec<String> = keywords.into_iter().take(MAX_KEYWORDS).collect();
        session.info(format!(
            "Search keywords ({}): {}",
            keywords.len(),
            keywords.join(", ")
        ));
        keywords
    }

    async fn ask_provider(
        &self,
        roles: &[String],
        fingerprint: &ResumeFingerprint,
    ) -> anyhow::Result<Vec<String>> {
        let expert = if fingerprint.expert_skills.is_empty() {
            "Not specified".to_string()
        } else {
            fingerprint
                .expert_skills
                .iter()
                .take(7)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        let prompt = format!(
            "Generate optimal job search keywords by combining the candidate's expertise with their target roles.\n\n\
             Candidate's Expertise:\n\
             - Expert Skills: {expert}\n\
             - Primary Stack: {}\n\
             - Years of Experience: {}\n\n\
             Target Roles: {}\n\n\
             Strategy: start with core keywords from the job titles, add the expert skills that are\n\
             relevant to those roles, add role synonyms (Developer, Engineer, SDE), limit to 6-8 keywords.\n\n\
             Return ONLY a JSON array: [\"keyword1\", \"keyword2\"]",
            fingerprint.primary_stack,
            fingerprint.years_of_experience,
            roles.join(", ")
        );

        let response = self.provider.complete(&prompt, 300).await?;
        let json = extract_json_array(&response)
            .ok_or_else(|| anyhow::anyhow!("no JSON array in keyword response"))?;
        let keywords: Vec<String> = serde_json::from_str(json)?;
        if keywords.is_empty() {
            return Err(anyhow::anyhow!("keyword response was empty"));
        }
        Ok(keywords)
    }
}
