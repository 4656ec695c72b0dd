//! Quote discovery: posts that embed a given post.
//!
//! The dedicated `getQuotes` endpoint is preferred; when it fails (it is
//! newer than some PDS deployments and occasionally rejects valid URIs),
//! discovery falls back to full-text search seeded from the target's
//! record key, filtered down to posts whose embed actually references the
//! target.

use async_trait::async_trait;
use tracing::warn;

use crate::anonymize::{anonymize, anonymize_all, AnonymizeOptions, CollectionOptions};
use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};
use crate::export::QuotesExport;
use crate::paginate::{collect, PageConfig, XrpcPageSource};
use crate::post::{Embed, RawItem, RawPost};
use crate::uri::at_uri_rkey;

/// How much of the record key seeds the fallback search query.
const FALLBACK_QUERY_CHARS: usize = 20;

/// Quote retrieval seam, split from HTTP so the fallback path is testable.
#[async_trait]
pub trait QuoteLookup: Send + Sync {
    /// Dedicated quotes listing for the target.
    async fn quotes(&self, uri: &str, limit: usize) -> Result<Vec<RawPost>>;

    /// Full-text candidates for the fallback path.
    async fn search_candidates(&self, query: &str, limit: usize) -> Result<Vec<RawPost>>;
}

struct ClientQuoteLookup<'a> {
    client: &'a XrpcClient,
    config: &'a PageConfig,
}

#[async_trait]
impl QuoteLookup for ClientQuoteLookup<'_> {
    async fn quotes(&self, uri: &str, limit: usize) -> Result<Vec<RawPost>> {
        let source = XrpcPageSource::<RawPost>::new(
            self.client,
            "app.bsky.feed.getQuotes",
            vec![("uri".to_string(), uri.to_string())],
            "posts",
        );
        Ok(collect(&source, limit, self.config).await?.items)
    }

    async fn search_candidates(&self, query: &str, limit: usize) -> Result<Vec<RawPost>> {
        let source = XrpcPageSource::<RawPost>::new(
            self.client,
            "app.bsky.feed.searchPosts",
            vec![("q".to_string(), query.to_string())],
            "posts",
        );
        Ok(collect(&source, limit, self.config).await?.items)
    }
}

/// Whether `post` carries a quote embed referencing `target_uri`, at
/// either the record or the view level.
pub fn embed_references(post: &RawPost, target_uri: &str) -> bool {
    let record_embed = post.record.as_ref().and_then(|r| r.embed.as_ref());
    [post.embed.as_ref(), record_embed]
        .into_iter()
        .flatten()
        .any(|embed| embed_target(embed) == Some(target_uri))
}

fn embed_target(embed: &Embed) -> Option<&str> {
    match embed {
        Embed::Record(rec) => rec.record.as_ref().and_then(|r| r.target_uri()),
        Embed::RecordWithMedia(rec) => rec.record.as_ref().and_then(|r| r.target_uri()),
        _ => None,
    }
}

/// Run discovery against a lookup, returning the quote posts and whether
/// the fallback produced them.
pub(crate) async fn discover_quotes(
    lookup: &dyn QuoteLookup,
    target_uri: &str,
    limit: usize,
) -> Result<(Vec<RawPost>, bool)> {
    match lookup.quotes(target_uri, limit).await {
        Ok(posts) => Ok((posts, false)),
        Err(primary) => {
            warn!(
                "getQuotes failed for {} ({}), falling back to search",
                target_uri, primary
            );
            let rkey = at_uri_rkey(target_uri).ok_or_else(|| {
                SkeinError::invalid_input(format!("not an AT-URI: {}", target_uri))
            })?;
            let query: String = rkey.chars().take(FALLBACK_QUERY_CHARS).collect();

            // Over-ask: most candidates will not reference the target.
            let candidates = lookup.search_candidates(&query, limit.max(25) * 4).await?;
            let mut matched: Vec<RawPost> = candidates
                .into_iter()
                .filter(|post| embed_references(post, target_uri))
                .collect();
            matched.truncate(limit);
            Ok((matched, true))
        }
    }
}

/// Fetch the posts quoting `uri`, plus the quoted post itself.
pub async fn fetch_quotes(
    client: &XrpcClient,
    uri: &str,
    limit: usize,
    config: &PageConfig,
) -> Result<QuotesExport> {
    if !uri.starts_with("at://") {
        return Err(SkeinError::invalid_input(format!("not an AT-URI: {}", uri)));
    }

    let root = fetch_root_post(client, uri).await;

    let lookup = ClientQuoteLookup { client, config };
    let (posts, fallback_used) = discover_quotes(&lookup, uri, limit).await?;

    let items: Vec<RawItem> = posts.into_iter().map(RawItem::Post).collect();
    let options = CollectionOptions {
        include_quoted_snippet: true,
        ..Default::default()
    };
    let quote_posts = anonymize_all(&items, &options);

    Ok(QuotesExport::new(uri, root, quote_posts, fallback_used))
}

/// Hydrate the quoted post itself; absence is tolerated (deleted post,
/// stale URI) and leaves the export's root empty.
async fn fetch_root_post(client: &XrpcClient, uri: &str) -> Option<crate::anonymize::AnonymizedPost> {
    let envelope = match client
        .get(
            "app.bsky.feed.getPosts",
            &[("uris".to_string(), uri.to_string())],
        )
        .await
    {
        Ok(v) => v,
        Err(e) => {
            warn!("could not hydrate quoted post {}: {}", uri, e);
            return None;
        }
    };

    let post: RawPost = envelope
        .get("posts")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())?;

    Some(anonymize(
        &post,
        &AnonymizeOptions::default().with_post_type().with_alt_text(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    const TARGET: &str = "at://did:plc:target/app.bsky.feed.post/3kabc123xyz456789mnop";

    fn quoting_post(uri: &str, quoted: &str) -> RawPost {
        serde_json::from_value(json!({
            "uri": uri,
            "record": {"text": "look at this", "createdAt": "2024-05-01T00:00:00Z"},
            "embed": {
                "$type": "app.bsky.embed.record#view",
                "record": {"uri": quoted, "value": {"text": "the original"}}
            }
        }))
        .unwrap()
    }

    fn plain_post(uri: &str) -> RawPost {
        serde_json::from_value(json!({
            "uri": uri,
            "record": {"text": "unrelated", "createdAt": "2024-05-01T00:00:00Z"}
        }))
        .unwrap()
    }

    struct ScriptedLookup {
        quotes_fail: bool,
        search_results: Vec<RawPost>,
        search_queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QuoteLookup for ScriptedLookup {
        async fn quotes(&self, uri: &str, _limit: usize) -> Result<Vec<RawPost>> {
            if self.quotes_fail {
                return Err(SkeinError::UpstreamHttp {
                    endpoint: "app.bsky.feed.getQuotes".to_string(),
                    status: 400,
                    body: "InvalidRequest".to_string(),
                });
            }
            Ok(vec![quoting_post("at://did:plc:a/app.bsky.feed.post/1", uri)])
        }

        async fn search_candidates(&self, query: &str, _limit: usize) -> Result<Vec<RawPost>> {
            self.search_queries.lock().unwrap().push(query.to_string());
            Ok(self.search_results.clone())
        }
    }

    #[tokio::test]
    async fn test_primary_path_no_fallback() {
        let lookup = ScriptedLookup {
            quotes_fail: false,
            search_results: Vec::new(),
            search_queries: Mutex::new(Vec::new()),
        };
        let (posts, fallback) = discover_quotes(&lookup, TARGET, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(!fallback);
        assert!(lookup.search_queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_filters_by_embed_reference() {
        let lookup = ScriptedLookup {
            quotes_fail: true,
            search_results: vec![
                quoting_post("at://did:plc:a/app.bsky.feed.post/1", TARGET),
                plain_post("at://did:plc:b/app.bsky.feed.post/2"),
                quoting_post(
                    "at://did:plc:c/app.bsky.feed.post/3",
                    "at://did:plc:other/app.bsky.feed.post/different",
                ),
            ],
            search_queries: Mutex::new(Vec::new()),
        };
        let (posts, fallback) = discover_quotes(&lookup, TARGET, 10).await.unwrap();
        assert!(fallback);
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].uri.as_deref(),
            Some("at://did:plc:a/app.bsky.feed.post/1")
        );

        // Query is the leading slice of the record key
        let queries = lookup.search_queries.lock().unwrap();
        assert_eq!(queries.as_slice(), ["3kabc123xyz456789mno"]);
    }

    #[test]
    fn test_embed_reference_at_record_level() {
        let post: RawPost = serde_json::from_value(json!({
            "uri": "at://did:plc:a/app.bsky.feed.post/1",
            "record": {
                "text": "quoting without hydration",
                "embed": {
                    "$type": "app.bsky.embed.record",
                    "record": {"uri": TARGET}
                }
            }
        }))
        .unwrap();
        assert!(embed_references(&post, TARGET));
        assert!(!embed_references(
            &post,
            "at://did:plc:x/app.bsky.feed.post/nope"
        ));
    }

    #[test]
    fn test_record_with_media_counts_as_reference() {
        let post: RawPost = serde_json::from_value(json!({
            "uri": "at://did:plc:a/app.bsky.feed.post/1",
            "embed": {
                "$type": "app.bsky.embed.recordWithMedia#view",
                "record": {"record": {"uri": TARGET}},
                "media": {"$type": "app.bsky.embed.images#view", "images": []}
            }
        }))
        .unwrap();
        assert!(embed_references(&post, TARGET));
    }
}
