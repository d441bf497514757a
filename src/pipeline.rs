use chrono::Utc;
use std::sync::Arc;

use crate::cache::{FingerprintCache, SqliteCache};
use crate::context::ContextLoader;
use crate::error::HuntError;
use crate::keywords::KeywordGenerator;
use crate::linkcheck::LinkChecker;
use crate::models::{HuntResult, SearchCriteria};
use crate::provider::{CompletionProvider, GroqProvider};
use crate::query::build_queries;
use crate::review::PrecisionFilter;
use crate::scorer::MatchScorer;
use crate::session::{HuntSession, SessionStatus};
use crate::source::JobSource;
use crate::waterfall::Waterfall;
use crate::{adzuna, board, finalize, killswitch, ranker, websearch};

/// One hunt request: who is searching, for what, with which resume.
#[derive(Debug, Clone, Default)]
pub struct HuntRequest {
    pub session_id: String,
    pub user_id: String,
    pub criteria: SearchCriteria,
    pub resume_text: String,
    pub validate_links: bool,
}

/// Terminal path for configuration-fatal errors: the session ends
/// `failed` and the caller still gets a structured result.
pub fn fail(session: &HuntSession, error: HuntError) -> HuntResult {
    session.error(format!("Hunt failed: {error}"));
    session.finish(SessionStatus::Failed);
    HuntResult::failed(error.to_string())
}

/// The whole pipeline with its collaborators injected, so tests can swap
/// in canned sources and providers.
pub struct Hunter {
    provider: Arc<dyn CompletionProvider>,
    cache: Arc<dyn FingerprintCache>,
    waterfall: Waterfall,
}

impl Hunter {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: Arc<dyn FingerprintCache>,
        waterfall: Waterfall,
    ) -> Self {
        Self {
            provider,
            cache,
            waterfall,
        }
    }

    /// Production wiring. Missing credentials for the provider or the
    /// required tier-1 source are fatal here; optional tiers just end up
    /// unavailable.
    pub fn from_env() -> Result<Self, HuntError> {
        let provider: Arc<dyn CompletionProvider> = Arc::new(GroqProvider::from_env()?);
        let cache: Arc<dyn FingerprintCache> = Arc::new(
            SqliteCache::open().map_err(|e| HuntError::Config(format!("cache open failed: {e}")))?,
        );

        let tier1: Vec<Arc<dyn JobSource>> = vec![Arc::new(adzuna::AdzunaSource::from_env()?)];
        let tier2: Vec<Arc<dyn JobSource>> = vec![Arc::new(websearch::WebSearchSource::from_env()?)];
        let tier3: Vec<Arc<dyn JobSource>> = vec![Arc::new(board::BoardSource::from_env()?)];

        Ok(Self::new(
            provider,
            cache,
            Waterfall::new(tier1, tier2, tier3),
        ))
    }

    pub async fn run(&self, session: &HuntSession, request: &HuntRequest) -> HuntResult {
        session.info(format!(
            "Hunt started (model: {})",
            self.provider.model_name()
        ));

        // Stage 0: candidate context (cache-first).
        let loader = ContextLoader::new(self.provider.clone(), self.cache.clone());
        let context = loader
            .load(session, &request.criteria, &request.resume_text)
            .await;

        // Stage 1+2: keywords crossed with locations.
        let generator = KeywordGenerator::new(self.provider.clone());
        let keywords = generator
            .generate(session, &request.criteria, &context.fingerprint)
            .await;
        if keywords.is_empty() {
            session.warn("No search keywords could be derived, nothing to fetch");
            session.finish(SessionStatus::Completed);
            return HuntResult {
                success: true,
                total_jobs: 0,
                jobs: Vec::new(),
                tier_used: Vec::new(),
                error: None,
            };
        }
        let queries = build_queries(&keywords, &request.criteria);
        session.info(format!("Built {} source queries", queries.len()));

        // Stage 3: escalating fetch.
        let fetched = self.waterfall.run(session, &queries).await;
        session.info(format!("Fetched {} unique jobs", fetched.len()));

        // Stage 4: negative keywords and salary floor.
        let before = fetched.len();
        let filtered = killswitch::apply(
            fetched,
            &context.negative_keywords,
            request.criteria.salary_min,
        );
        session.info(format!(
            "Soft killswitch: {}/{} jobs retained",
            filtered.len(),
            before
        ));

        // Stage 5: deterministic ranking.
        let now = Utc::now();
        let outcome = ranker::rank(filtered, &context.fingerprint, now);
        session.info(format!(
            "Ranked jobs: {} auto-accepted, {} for review, {} discarded",
            outcome.auto_accepted.len(),
            outcome.for_review.len(),
            outcome.discarded
        ));

        // Stage 6: strict relevance review of the middle of the field.
        let filter = PrecisionFilter::new(self.provider.clone());
        let reviewed = filter
            .filter(
                session,
                outcome.auto_accepted,
                outcome.for_review,
                &request.criteria,
            )
            .await;

        // Stage 7: fingerprint match scoring; final order is score order.
        let scorer = MatchScorer::new(self.provider.clone());
        let scored = scorer.score(session, reviewed, &context.fingerprint).await;

        // Stage 8 (optional): weed out dead links.
        let validated = if request.validate_links {
            match LinkChecker::new() {
                Ok(checker) => checker.validate_batch(session, scored).await,
                Err(e) => {
                    session.warn(format!("Link checker unavailable: {e}"));
                    scored
                }
            }
        } else {
            session.info("Skipping link validation for speed");
            scored
        };

        // Stage 9: shortlist with tiers, badges and gap analysis.
        let jobs = finalize::finalize(validated, &context.fingerprint, now);

        if jobs.is_empty() {
            session.success("Hunt complete: no matching jobs found");
        } else {
            session.success(format!(
                "Hunt complete: {} jobs, top match score {}%",
                jobs.len(),
                jobs[0].match_score
            ));
        }
        session.finish(SessionStatus::Completed);

        HuntResult {
            success: true,
            total_jobs: jobs.len(),
            jobs,
            tier_used: session.tiers_used(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HuntError;
    use crate::models::{JobPosting, SourceQuery};
    use crate::session::MemoryLog;
    use crate::source::{JobSource, TIER1_API, TIER2_WEBSEARCH};
    use crate::testutil::CannedProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        tier: &'static str,
        postings: Vec<JobPosting>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobSource for StaticSource {
        fn tier(&self) -> &'static str {
            self.tier
        }

        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, _query: &SourceQuery) -> Result<Vec<JobPosting>, HuntError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.postings.clone())
        }
    }

    fn react_job(i: usize) -> JobPosting {
        let mut j = JobPosting::new(
            &format!("React Developer {i}"),
            &format!("Company {i}"),
            &format!("https://example.com/{i}"),
            "adzuna",
        );
        j.description = "Looking for React and Node engineers. React experience required.".into();
        j
    }

    fn request() -> HuntRequest {
        HuntRequest {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            criteria: SearchCriteria {
                job_titles: vec!["React Developer".to_string()],
                locations: vec!["Bangalore".to_string()],
                ..Default::default()
            },
            resume_text: "Five years of React and Node".to_string(),
            validate_links: false,
        }
    }

    fn fingerprint_response() -> &'static str {
        r#"{"role": "React Developer", "yoe": 3, "expert_skills": ["react", "node"],
            "proficient_skills": ["typescript"], "primary_stack": "MERN"}"#
    }

    #[tokio::test]
    async fn full_hunt_with_an_abundant_tier1() {
        // 18 tier-1 postings: over the tier-1 threshold, so tier 2 never
        // runs. Provider answers: fingerprint, negative keywords, then one
        // review batch and four scoring batches (18 survive ranking; 5
        // auto-accept + 13 reviewed; 18 scored in batches of 5).
        let mut responses = vec![
            fingerprint_response(),
            r#"{"negative_keywords": ["sales", "telecaller"]}"#,
            r#"{"relevant_ids": [0,1,2,3,4,5,6,7,8,9,10,11,12]}"#,
        ];
        responses.extend(vec![r#"{"scores": [90, 80, 70, 60, 55]}"#; 4]);

        let tier1 = Arc::new(StaticSource {
            tier: TIER1_API,
            postings: (0..18).map(react_job).collect(),
            calls: AtomicUsize::new(0),
        });
        let tier2 = Arc::new(StaticSource {
            tier: TIER2_WEBSEARCH,
            postings: vec![react_job(99)],
            calls: AtomicUsize::new(0),
        });

        let hunter = Hunter::new(
            Arc::new(CannedProvider::new(responses)),
            Arc::new(SqliteCache::open_in_memory().unwrap()),
            Waterfall::new(vec![tier1], vec![tier2.clone()], vec![]).without_pacing(),
        );

        let sink = Arc::new(MemoryLog::new());
        let session = HuntSession::new("s1", "u1", sink.clone());
        let result = hunter.run(&session, &request()).await;

        assert!(result.success);
        assert_eq!(result.tier_used, vec![TIER1_API]);
        assert_eq!(tier2.calls.load(Ordering::SeqCst), 0);
        // 18 postings survive to scoring; the shortlist caps at 15.
        assert_eq!(result.total_jobs, 15);
        assert_eq!(result.jobs[0].rank, 1);
        // Final order follows match score.
        assert!(result.jobs[0].match_score >= result.jobs[14].match_score);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn zero_results_is_a_normal_completion() {
        let tier1 = Arc::new(StaticSource {
            tier: TIER1_API,
            postings: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let responses = vec![
            fingerprint_response(),
            r#"{"negative_keywords": ["sales"]}"#,
        ];
        let hunter = Hunter::new(
            Arc::new(CannedProvider::new(responses)),
            Arc::new(SqliteCache::open_in_memory().unwrap()),
            Waterfall::new(vec![tier1], vec![], vec![]).without_pacing(),
        );

        let sink = Arc::new(MemoryLog::new());
        let session = HuntSession::new("s1", "u1", sink.clone());
        let result = hunter.run(&session, &request()).await;

        assert!(result.success);
        assert_eq!(result.total_jobs, 0);
        assert!(result.jobs.is_empty());
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(
            sink.entries()
                .iter()
                .any(|e| e.message.contains("no matching jobs found"))
        );
        // The start line names the provider's model.
        assert!(sink.entries().iter().any(|e| e.message.contains("canned")));
    }

    #[test]
    fn config_error_fails_the_session_with_a_structured_result() {
        let sink = Arc::new(MemoryLog::new());
        let session = HuntSession::new("s1", "u1", sink.clone());

        let result = fail(
            &session,
            HuntError::Config("GROQ_API_KEY environment variable not set".to_string()),
        );

        assert!(!result.success);
        assert_eq!(result.total_jobs, 0);
        assert!(result.jobs.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("configuration error: GROQ_API_KEY environment variable not set")
        );
        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(
            sink.entries()
                .iter()
                .any(|e| e.level == crate::session::LogLevel::Error
                    && e.message.contains("GROQ_API_KEY"))
        );
    }

    #[tokio::test]
    async fn auto_accepted_jobs_can_be_outscored() {
        // 7 postings all pass ranking: 5 auto-accept, 2 reviewed. Scoring
        // gives a reviewed job the top score, so it leads the shortlist.
        let responses = vec![
            fingerprint_response(),
            r#"{"negative_keywords": ["sales"]}"#,
            r#"{"relevant_ids": [0, 1]}"#,
            r#"{"scores": [50, 55, 60, 65, 70]}"#,
            r#"{"scores": [98, 40]}"#,
        ];
        let tier1 = Arc::new(StaticSource {
            tier: TIER1_API,
            postings: (0..7).map(react_job).collect(),
            calls: AtomicUsize::new(0),
        });
        let hunter = Hunter::new(
            Arc::new(CannedProvider::new(responses)),
            Arc::new(SqliteCache::open_in_memory().unwrap()),
            Waterfall::new(vec![tier1], vec![], vec![]).without_pacing(),
        );

        let session = HuntSession::new("s1", "u1", Arc::new(MemoryLog::new()));
        let result = hunter.run(&session, &request()).await;

        assert_eq!(result.total_jobs, 7);
        assert_eq!(result.jobs[0].match_score, 98);
    }
}
