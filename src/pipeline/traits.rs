//! Collaborator seams. Everything that suspends on I/O lives behind one of
//! these traits; the core never blocks on the network itself.
//!
//! All traits are dyn-safe via manually boxed futures, and every call is
//! fallible with `anyhow::Result` so the orchestrator can convert failures
//! into outcome codes instead of propagating them.

use crate::factpack::{RssItem, SearchResult};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text-generation collaborator. Calls must be idempotent-safe to retry.
pub trait Generator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        max_tokens: usize,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// A post the publisher can attach a comment to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPost {
    pub id: String,
    pub title: String,
}

/// Publish collaborator for the target platform.
pub trait Publisher: Send + Sync {
    /// Fetch one candidate post from the configured community pools.
    fn fetch_target<'a>(
        &'a self,
        pools: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<Option<TargetPost>>>;

    fn post_comment<'a>(
        &'a self,
        target_id: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// RSS signal collaborator. Errors degrade to "no signal" upstream.
pub trait RssSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        feed_url: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<RssItem>>>;
}

/// Search verification collaborator. Errors degrade to "no signal" upstream.
pub trait SearchSource: Send + Sync {
    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<SearchResult>>>;
}
