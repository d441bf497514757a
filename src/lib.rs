pub mod adzuna;
pub mod board;
pub mod cache;
pub mod context;
pub mod error;
pub mod finalize;
pub mod keywords;
pub mod killswitch;
pub mod linkcheck;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod ranker;
pub mod review;
pub mod scorer;
pub mod session;
pub mod source;
pub mod waterfall;
pub mod websearch;

#[cfg(test)]
pub(crate) mod testutil;
