//! Produced JSON envelopes.
//!
//! Every export carries context-specific metadata plus a `processedAt`
//! timestamp; the child collection key depends on the operation
//! (`posts`, `replies`, or `quotePosts`).

use chrono::Utc;
use serde::Serialize;

use crate::anonymize::AnonymizedPost;
use crate::feed::PostFilter;
use crate::thread::ThreadNode;

fn processed_at() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    /// Which listing produced this export: `profile`, `feed`, `list`, or
    /// `starterpack`.
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<PostFilter>,
    pub requested: usize,
    pub returned: usize,
    pub total_fetched: usize,
    pub request_count: usize,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedExport {
    pub metadata: FeedMetadata,
    pub posts: Vec<AnonymizedPost>,
}

impl FeedExport {
    pub fn new(
        source: &str,
        target: &str,
        filters: Option<PostFilter>,
        requested: usize,
        total_fetched: usize,
        request_count: usize,
        posts: Vec<AnonymizedPost>,
    ) -> Self {
        Self {
            metadata: FeedMetadata {
                source: source.to_string(),
                target: target.to_string(),
                filters,
                requested,
                returned: posts.len(),
                total_fetched,
                request_count,
                processed_at: processed_at(),
            },
            posts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub query: String,
    pub sort: String,
    pub requested: usize,
    pub returned: usize,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchExport {
    pub metadata: SearchMetadata,
    pub posts: Vec<AnonymizedPost>,
}

impl SearchExport {
    pub fn new(query: &str, sort: &str, requested: usize, posts: Vec<AnonymizedPost>) -> Self {
        Self {
            metadata: SearchMetadata {
                query: query.to_string(),
                sort: sort.to_string(),
                requested,
                returned: posts.len(),
                processed_at: processed_at(),
            },
            posts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMetadata {
    pub uri: String,
    pub total_replies: usize,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadExport {
    pub metadata: ThreadMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<AnonymizedPost>,
    pub replies: Vec<ThreadNode>,
}

impl ThreadExport {
    pub fn new(uri: &str, root: Option<AnonymizedPost>, replies: Vec<ThreadNode>) -> Self {
        Self {
            metadata: ThreadMetadata {
                uri: uri.to_string(),
                total_replies: crate::thread::count_all(&replies),
                processed_at: processed_at(),
            },
            root,
            replies,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesMetadata {
    pub uri: String,
    pub returned: usize,
    /// Whether the search fallback produced these results instead of the
    /// dedicated quotes endpoint.
    pub fallback_used: bool,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesExport {
    pub metadata: QuotesMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<AnonymizedPost>,
    pub quote_posts: Vec<AnonymizedPost>,
}

impl QuotesExport {
    pub fn new(
        uri: &str,
        root: Option<AnonymizedPost>,
        quote_posts: Vec<AnonymizedPost>,
        fallback_used: bool,
    ) -> Self {
        Self {
            metadata: QuotesMetadata {
                uri: uri.to_string(),
                returned: quote_posts.len(),
                fallback_used,
                processed_at: processed_at(),
            },
            root,
            quote_posts,
        }
    }
}
