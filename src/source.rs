use async_trait::async_trait;

use crate::error::HuntError;
use crate::models::{JobPosting, SourceQuery};

pub const TIER1_API: &str = "tier1_api";
pub const TIER2_WEBSEARCH: &str = "tier2_websearch";
pub const TIER3_SCRAPE: &str = "tier3_scrape";

/// One upstream job source. The waterfall treats every source the same
/// way: hand it a query, collect the postings, log the failures.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Which waterfall tier this source belongs to.
    fn tier(&self) -> &'static str;

    fn name(&self) -> &str;

    /// Sources with missing credentials report unavailable and the
    /// waterfall skips them instead of erroring per query.
    fn available(&self) -> bool {
        true
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobPosting>, HuntError>;
}
