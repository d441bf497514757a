//! Shared helpers for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::provider::CompletionProvider;

/// Hands back canned completions in order; errors once exhausted.
pub struct CannedProvider {
    responses: Mutex<Vec<String>>,
}

impl CannedProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        self.responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop())
            .ok_or_else(|| anyhow::anyhow!("no canned response left"))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}
