use anyhow::Result;
use std::sync::Arc;

use crate::cache::{CachedConfig, FingerprintCache, resume_hash};
use crate::models::{ResumeFingerprint, SearchCriteria};
use crate::provider::{CompletionProvider, extract_json_object};
use crate::session::HuntSession;

/// Defaults when keyword generation fails on both attempts.
const FALLBACK_NEGATIVE_KEYWORDS: &[&str] = &[
    "sales",
    "marketing",
    "telecaller",
    "bpo",
    "call center",
    "customer support",
    "hr",
    "recruiter",
    "account manager",
    "business development",
    "insurance",
    "loan",
    "credit",
];

/// Everything the downstream stages need to know about the candidate.
#[derive(Debug, Clone, Default)]
pub struct HuntContext {
    pub fingerprint: ResumeFingerprint,
    pub negative_keywords: Vec<String>,
}

/// Builds the hunt context: cache lookup first, provider calls on a miss,
/// static fallbacks when the provider misbehaves. Nothing here is allowed
/// to abort the hunt.
pub struct ContextLoader {
    provider: Arc<dyn CompletionProvider>,
    cache: Arc<dyn FingerprintCache>,
}

impl ContextLoader {
    pub fn new(provider: Arc<dyn CompletionProvider>, cache: Arc<dyn FingerprintCache>) -> Self {
        Self { provider, cache }
    }

    pub async fn load(
        &self,
        session: &HuntSession,
        criteria: &SearchCriteria,
        resume_text: &str,
    ) -> HuntContext {
        let role = criteria.primary_role();
        let hash = resume_hash(resume_text);

        match self.cache.get(&session.user_id, role, &hash) {
            Ok(Some(cached)) => {
                session.info(format!(
                    "Cache hit: {} ({} expert skills, {} negative keywords)",
                    cached.fingerprint.role,
                    cached.fingerprint.expert_skills.len(),
                    cached.negative_keywords.len()
                ));
                return HuntContext {
                    fingerprint: cached.fingerprint,
                    negative_keywords: cached.negative_keywords,
                };
            }
            Ok(None) => {
                session.info("Cache miss, generating fresh fingerprint and keywords");
            }
            Err(e) => {
                tracing::warn!("config cache unavailable: {e}");
                session.warn("Config cache unavailable, proceeding without it");
            }
        }

        let fingerprint = self.extract_fingerprint(session, resume_text).await;
        let negative_keywords = self.generate_negative_keywords(session, criteria).await;

        let config = CachedConfig {
            fingerprint: fingerprint.clone(),
            negative_keywords: negative_keywords.clone(),
        };
        // Best-effort: a write failure only costs the next run some tokens.
        if let Err(e) = self.cache.put(&session.user_id, role, &hash, &config) {
            tracing::warn!("config cache write failed: {e}");
        }

        HuntContext {
            fingerprint,
            negative_keywords,
        }
    }

    async fn extract_fingerprint(
        &self,
        session: &HuntSession,
        resume_text: &str,
    ) -> ResumeFingerprint {
        if resume_text.is_empty() {
            session.info("No resume text, skipping fingerprint extraction");
            return ResumeFingerprint::default().with_defaults();
        }

        let prompt = fingerprint_prompt(resume_text);
        let fingerprint = match self.provider.complete(&prompt, 1500).await {
            Ok(response) => match parse_fingerprint(&response) {
                Ok(fp) => fp,
                Err(e) => {
                    session.warn(format!("Fingerprint extraction failed: {e}"));
                    ResumeFingerprint::default()
                }
            },
            Err(e) => {
                session.warn(format!("Fingerprint extraction failed: {e}"));
                ResumeFingerprint::default()
            }
        };

        let fingerprint = fingerprint.with_defaults();
        if fingerprint.is_useful() {
            session.info(format!(
                "Fingerprint: {}, {}y exp, {} expert skills",
                fingerprint.role,
                fingerprint.years_of_experience,
                fingerprint.expert_skills.len()
            ));
            fingerprint
        } else {
            session.warn("Fingerprint carried no useful data, using defaults");
            ResumeFingerprint::default().with_defaults()
        }
    }

    async fn generate_negative_keywords(
        &self,
        session: &HuntSession,
        criteria: &SearchCriteria,
    ) -> Vec<String> {
        let roles = if criteria.job_titles.is_empty() {
            "Software Developer".to_string()
        } else {
            criteria.job_titles.join(", ")
        };

        let prompt = format!(
            "Generate 25 negative keywords for filtering irrelevant jobs.\n\n\
             Target Roles: {roles}\n\n\
             Include:\n\
             - Different job types: sales, marketing, HR, support, BPO, telecaller\n\
             - Unrelated domains: insurance, loan, credit, collection\n\
             - Wrong seniority: intern, principal (if not applicable)\n\n\
             Return ONLY this JSON structure:\n\
             {{\"negative_keywords\": [\"sales\", \"marketing\", \"hr\", \"support\", \"bpo\"]}}\n\n\
             No text before or after the JSON."
        );

        if let Ok(keywords) = self.request_keywords(&prompt).await {
            session.info(format!("Generated {} negative keywords", keywords.len()));
            return keywords;
        }

        // One retry with a stripped-down prompt before giving up.
        let retry_prompt = format!(
            "List 25 job types to avoid for: {roles}\n\n\
             Return ONLY this JSON: {{\"negative_keywords\": [\"sales\", \"marketing\"]}}"
        );
        if let Ok(keywords) = self.request_keywords(&retry_prompt).await {
            session.info(format!(
                "Retry generated {} negative keywords",
                keywords.len()
            ));
            return keywords;
        }

        session.warn("Keyword generation failed twice, using defaults");
        FALLBACK_NEGATIVE_KEYWORDS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn request_keywords(&self, prompt: &str) -> Result<Vec<String>> {
        let response = self.provider.complete(prompt, 500).await?;
        let json = extract_json_object(&response)
            .ok_or_else(|| anyhow::anyhow!("no JSON object in keyword response"))?;
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        let keywords: Vec<String> = parsed
            .get("negative_keywords")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        if keywords.is_empty() {
            return Err(anyhow::anyhow!("keyword response held no keywords"));
        }
        Ok(keywords)
    }
}

fn fingerprint_prompt(resume_text: &str) -> String {
    let excerpt: String = resume_text.chars().take(3500).collect();
    format!(
        "Analyze this resume and extract a DETAILED JSON fingerprint for job matching.\n\n\
         RESUME:\n{excerpt}\n\n\
         Extract with high precision:\n\
         - role: exact role from the resume (e.g. \"Backend Engineer\")\n\
         - seniority_level: \"Junior\" | \"Mid-Level\" | \"Senior\" | \"Lead\" | \"Principal\"\n\
         - yoe: integer years of total professional experience, never null\n\
         - expert_skills: top 5-7 technologies, normalized and lowercase (\"React.js\" -> \"react\")\n\
         - proficient_skills: 5-10 technologies, normalized and lowercase\n\
         - familiar_skills: technologies mentioned once, normalized and lowercase\n\
         - primary_stack: main ecosystem (e.g. \"MERN\", \"Java Spring\", \"Python Django\")\n\
         - poison_keywords: 15-20 technologies they do NOT work with, inferred from the stack\n\
         - dealbreakers: explicit constraints (e.g. [\"No BPO\"])\n\
         - domains: industries worked in\n\
         - expected_salary_min: inferred minimum expectation as an integer\n\
         - preferred_locations: cities mentioned\n\n\
         Return ONLY this JSON (no markdown, no explanation):\n\
         {{\"role\": \"Backend Engineer\", \"seniority_level\": \"Mid-Level\", \"yoe\": 3,\n\
          \"expert_skills\": [\"node\", \"react\"], \"proficient_skills\": [\"express\"],\n\
          \"familiar_skills\": [\"graphql\"], \"primary_stack\": \"MERN\",\n\
          \"poison_keywords\": [\"spring boot\", \"django\"], \"dealbreakers\": [],\n\
          \"domains\": [\"SaaS\"], \"expected_salary_min\": 1200000,\n\
          \"preferred_locations\": [\"Bangalore\"]}}"
    )
}

fn parse_fingerprint(response: &str) -> Result<ResumeFingerprint> {
    let json = extract_json_object(response)
        .ok_or_else(|| anyhow::anyhow!("no JSON object in fingerprint response"))?;
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteCache;
    use crate::session::MemoryLog;
    use crate::testutil::CannedProvider;

    fn session() -> HuntSession {
        HuntSession::new("s1", "u1", Arc::new(MemoryLog::new()))
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            job_titles: vec!["React Developer".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn cache_miss_runs_extraction_and_populates_cache() {
        let provider = Arc::new(CannedProvider::new(vec![
            r#"{"role": "React Developer", "yoe": 4, "expert_skills": ["react", "node"]}"#,
            r#"{"negative_keywords": ["sales", "bpo"]}"#,
        ]));
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let loader = ContextLoader::new(provider, cache.clone());

        let ctx = loader.load(&session(), &criteria(), "resume body").await;
        assert_eq!(ctx.fingerprint.role, "React Developer");
        assert_eq!(ctx.negative_keywords, vec!["sales", "bpo"]);

        let hash = resume_hash("resume body");
        let cached = cache.get("u1", "React Developer", &hash).unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn cache_hit_skips_the_provider() {
        // No canned responses: any provider call would error out.
        let provider = Arc::new(CannedProvider::new(vec![]));
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let hash = resume_hash("resume body");
        cache
            .put(
                "u1",
                "React Developer",
                &hash,
                &CachedConfig {
                    fingerprint: ResumeFingerprint {
                        role: "React Developer".to_string(),
                        expert_skills: vec!["react".to_string()],
                        ..Default::default()
                    }
                    .with_defaults(),
                    negative_keywords: vec!["sales".to_string()],
                },
            )
            .unwrap();

        let loader = ContextLoader::new(provider, cache);
        let ctx = loader.load(&session(), &criteria(), "resume body").await;
        assert_eq!(ctx.fingerprint.expert_skills, vec!["react"]);
        assert_eq!(ctx.negative_keywords, vec!["sales"]);
    }

    #[tokio::test]
    async fn keyword_failure_falls_back_to_defaults() {
        let provider = Arc::new(CannedProvider::new(vec![
            r#"{"role": "React Developer", "yoe": 4, "expert_skills": ["react"]}"#,
            "not json at all",
            "still not json",
        ]));
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let loader = ContextLoader::new(provider, cache);

        let ctx = loader.load(&session(), &criteria(), "resume body").await;
        assert!(ctx.negative_keywords.contains(&"sales".to_string()));
        assert_eq!(
            ctx.negative_keywords.len(),
            FALLBACK_NEGATIVE_KEYWORDS.len()
        );
    }

    #[tokio::test]
    async fn empty_resume_skips_fingerprint_call() {
        let provider = Arc::new(CannedProvider::new(vec![
            r#"{"negative_keywords": ["sales", "bpo"]}"#,
        ]));
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let loader = ContextLoader::new(provider, cache);

        let ctx = loader.load(&session(), &criteria(), "").await;
        assert_eq!(ctx.fingerprint.role, "Developer");
        assert!(!ctx.fingerprint.is_useful());
        assert_eq!(ctx.negative_keywords, vec!["sales", "bpo"]);
    }

    #[tokio::test]
    async fn useless_fingerprint_is_discarded() {
        let provider = Arc::new(CannedProvider::new(vec![
            r#"{"role": "Developer"}"#,
            r#"{"negative_keywords": ["sales"]}"#,
        ]));
        let cache = Arc::new(SqliteCache::open_in_memory().unwrap());
        let loader = ContextLoader::new(provider, cache);

        let ctx = loader.load(&session(), &criteria(), "resume body").await;
        assert!(!ctx.fingerprint.is_useful());
        assert_eq!(ctx.fingerprint.seniority_level, "Mid-Level");
    }
}
