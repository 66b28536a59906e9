//! Deterministic stub collaborators for dry runs. Real network-facing
//! implementations live outside this crate.

use super::traits::{BoxFuture, Generator, Publisher, RssSource, SearchSource, TargetPost};
use crate::factpack::{RssItem, SearchResult};

/// Produces a fixed calm reply built from the prompt's topic line.
pub struct TemplateGenerator;

impl Generator for TemplateGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        _max_tokens: usize,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            let topic = prompt
                .lines()
                .find_map(|line| line.strip_prefix("Topic: "))
                .unwrap_or("this")
                .to_string();
            Ok(format!(
                "Thinking about {topic} lately and there is a steady pattern worth naming. \
                 Small consistent steps tend to beat big sporadic pushes, and writing down \
                 what changed each time makes the next decision easier."
            ))
        })
    }
}

/// Publisher that never finds a target and accepts every post.
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn fetch_target<'a>(
        &'a self,
        _pools: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<Option<TargetPost>>> {
        Box::pin(async { Ok(None) })
    }

    fn post_comment<'a>(
        &'a self,
        _target_id: &'a str,
        _body: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// RSS source with nothing to say.
pub struct SilentRssSource;

impl RssSource for SilentRssSource {
    fn fetch<'a>(
        &'a self,
        _feed_url: &'a str,
        _limit: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<RssItem>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Search source with nothing to say.
pub struct SilentSearchSource;

impl SearchSource for SilentSearchSource {
    fn search<'a>(
        &'a self,
        _query: &'a str,
        _limit: usize,
    ) -> BoxFuture<'a, anyhow::Result<Vec<SearchResult>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
