use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::models::{JobPosting, SourceQuery};
use crate::session::HuntSession;
use crate::source::JobSource;

/// Stop after tier 1 when it alone produced more than this many unique jobs.
const TIER1_EXIT_THRESHOLD: usize = 15;
/// Stop after tier 2 when the running total exceeds this.
const TIER2_EXIT_THRESHOLD: usize = 20;

const MAX_CONCURRENT_REQUESTS: usize = 3;
const REQUEST_SPACING: Duration = Duration::from_millis(2500);
const SPACING_JITTER_MS: u64 = 250;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Explicit escalation state so the exit conditions stay auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TierState {
    Tier1Pending,
    Tier2Pending,
    Tier3Pending,
    Done,
}

impl TierState {
    /// Transition on the unique-job total after the tier just run.
    fn advance(self, unique_total: usize) -> TierState {
        match self {
            TierState::Tier1Pending if unique_total > TIER1_EXIT_THRESHOLD => TierState::Done,
            TierState::Tier1Pending => TierState::Tier2Pending,
            TierState::Tier2Pending if unique_total > TIER2_EXIT_THRESHOLD => TierState::Done,
            TierState::Tier2Pending => TierState::Tier3Pending,
            TierState::Tier3Pending => TierState::Done,
            TierState::Done => TierState::Done,
        }
    }
}

/// Order-preserving three-key dedup: normalized title+company first, then
/// apply link, then source id. First posting seen wins.
#[derive(Default)]
struct DedupSet {
    combos: HashSet<String>,
    urls: HashSet<String>,
    ids: HashSet<String>,
}

impl DedupSet {
    /// True when the posting is new; records all of its keys.
    fn insert(&mut self, posting: &JobPosting) -> bool {
        let combo = format!(
            "{}|{}",
            posting.title.trim().to_lowercase(),
            posting.company.trim().to_lowercase()
        );
        if combo != "|" && self.combos.contains(&combo) {
            return false;
        }
        if !posting.apply_link.is_empty() && self.urls.contains(&posting.apply_link) {
            return false;
        }
        if let Some(id) = &posting.source_id {
            if !id.is_empty() && self.ids.contains(id) {
                return false;
            }
        }

        if combo != "|" {
            self.combos.insert(combo);
        }
        if !posting.apply_link.is_empty() {
            self.urls.insert(posting.apply_link.clone());
        }
        if let Some(id) = &posting.source_id {
            if !id.is_empty() {
                self.ids.insert(id.clone());
            }
        }
        true
    }
}

/// Escalating fetch across source tiers. Each tier fans its queries out
/// under bounded concurrency; the next tier only runs when the unique-job
/// total is still under that tier's exit threshold.
pub struct Waterfall {
    tier1: Vec<Arc<dyn JobSource>>,
    tier2: Vec<Arc<dyn JobSource>>,
    tier3: Vec<Arc<dyn JobSource>>,
    spacing: Duration,
}

impl Waterfall {
    pub fn new(
        tier1: Vec<Arc<dyn JobSource>>,
        tier2: Vec<Arc<dyn JobSource>>,
        tier3: Vec<Arc<dyn JobSource>>,
    ) -> Self {
        Self {
            tier1,
            tier2,
            tier3,
            spacing: REQUEST_SPACING,
        }
    }

    #[cfg(test)]
    pub(crate) fn without_pacing(mut self) -> Self {
        self.spacing = Duration::ZERO;
        self
    }

    pub async fn run(&self, session: &HuntSession, queries: &[SourceQuery]) -> Vec<JobPosting> {
        let mut state = TierState::Tier1Pending;
        let mut dedup = DedupSet::default();
        let mut unique: Vec<JobPosting> = Vec::new();

        while state != TierState::Done {
            let sources = match state {
                TierState::Tier1Pending => &self.tier1,
                TierState::Tier2Pending => &self.tier2,
                TierState::Tier3Pending => &self.tier3,
                TierState::Done => break,
            };

            let fetched = self.run_tier(session, sources, queries).await;
            for posting in fetched {
                if dedup.insert(&posting) {
                    unique.push(posting);
                }
            }
            // A consulted tier counts as used even when everything it
            // returned was a duplicate or an error.
            if let Some(source) = sources.iter().find(|s| s.available()) {
                session.record_tier(source.tier());
                session.info(format!(
                    "{} unique jobs after {}",
                    unique.len(),
                    source.tier()
                ));
            }

            state = state.advance(unique.len());
        }

        unique
    }

    /// Fan one tier's queries out across its sources: at most 3 in flight,
    /// request starts spaced apart with jitter, each wrapped in a timeout.
    async fn run_tier(
        &self,
        session: &HuntSession,
        sources: &[Arc<dyn JobSource>],
        queries: &[SourceQuery],
    ) -> Vec<JobPosting> {
        let available: Vec<Arc<dyn JobSource>> = sources
            .iter()
            .filter(|s| s.available())
            .cloned()
            .collect();
        if available.is_empty() {
            for source in sources {
                session.warn(format!("{} skipped: not configured", source.name()));
            }
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
        let mut tasks: JoinSet<(String, String, anyhow::Result<Vec<JobPosting>>)> = JoinSet::new();

        let total = available.len() * queries.len();
        let mut started = 0usize;
        for source in &available {
            for query in queries {
                let source = source.clone();
                let query = query.clone();
                let permit = semaphore.clone();
                tasks.spawn(async move {
                    let name = source.name().to_string();
                    let label = format!("'{}' in '{}'", query.what, query.location);
                    let Ok(_permit) = permit.acquire_owned().await else {
                        return (name, label, Err(anyhow::anyhow!("semaphore closed")));
                    };
                    let result =
                        match tokio::time::timeout(REQUEST_TIMEOUT, source.fetch(&query)).await {
                            Ok(Ok(postings)) => Ok(postings),
                            Ok(Err(e)) => Err(e.into()),
                            Err(_) => Err(anyhow::anyhow!("request timed out")),
                        };
                    (name, label, result)
                });

                started += 1;
                if started < total && !self.spacing.is_zero() {
                    let jitter = rand::thread_rng().gen_range(0..SPACING_JITTER_MS);
                    tokio::time::sleep(self.spacing + Duration::from_millis(jitter)).await;
                }
            }
        }

        let mut postings = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(batch))) => postings.extend(batch),
                Ok((name, label, Err(e))) => {
                    session.warn(format!("{name} failed for {label}: {e}"));
                }
                Err(e) => {
                    tracing::warn!("fetch task panicked: {e}");
                }
            }
        }
        postings
    }
}
