//! Feed orchestrators: author feed with post-type filtering, custom and
//! list feeds, and starter-pack fan-out.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::anonymize::{anonymize_all, CollectionOptions};
use crate::classify::{classify, PostType};
use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};
use crate::export::FeedExport;
use crate::paginate::{collect, collect_filtered, PageConfig, XrpcPageSource};
use crate::post::{FeedItem, RawItem};

/// Caller-selected subset of post kinds for the author feed.
///
/// Matches the three selectable options upstream: posts (original +
/// thread continuations), reposts, quotes. Replies are never
/// independently selectable and are always excluded.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PostFilter {
    pub posts: bool,
    pub reposts: bool,
    pub quotes: bool,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            posts: true,
            reposts: true,
            quotes: true,
        }
    }
}

impl PostFilter {
    pub fn accepts(&self, post_type: PostType) -> bool {
        match post_type {
            PostType::Original | PostType::Thread => self.posts,
            PostType::Repost => self.reposts,
            PostType::Quote => self.quotes,
            PostType::Reply => false,
        }
    }

    pub fn selects_nothing(&self) -> bool {
        !self.posts && !self.reposts && !self.quotes
    }
}

/// Fetch an actor's feed, keeping only the selected post kinds.
pub async fn fetch_author_feed(
    client: &XrpcClient,
    actor: &str,
    filter: PostFilter,
    limit: usize,
    config: &PageConfig,
) -> Result<FeedExport> {
    if actor.trim().is_empty() {
        return Err(SkeinError::invalid_input("missing actor"));
    }
    if filter.selects_nothing() {
        return Err(SkeinError::invalid_input(
            "select at least one of posts, reposts, or quotes",
        ));
    }

    let source = XrpcPageSource::<FeedItem>::new(
        client,
        "app.bsky.feed.getAuthorFeed",
        vec![("actor".to_string(), actor.to_string())],
        "feed",
    );

    let result = collect_filtered(
        &source,
        |item: &FeedItem| filter.accepts(classify(&item.post, Some(item))),
        limit,
        config,
    )
    .await?;

    let items: Vec<RawItem> = result.items.into_iter().map(RawItem::Feed).collect();
    let posts = anonymize_all(&items, &CollectionOptions::default());

    Ok(FeedExport::new(
        "profile",
        actor,
        Some(filter),
        limit,
        result.total_fetched,
        result.request_count,
        posts,
    ))
}

/// Fetch a custom feed generator's output.
pub async fn fetch_custom_feed(
    client: &XrpcClient,
    feed_uri: &str,
    limit: usize,
    config: &PageConfig,
) -> Result<FeedExport> {
    fetch_listing(client, "feed", "app.bsky.feed.getFeed", "feed", feed_uri, limit, config).await
}

/// Fetch a list feed.
pub async fn fetch_list_feed(
    client: &XrpcClient,
    list_uri: &str,
    limit: usize,
    config: &PageConfig,
) -> Result<FeedExport> {
    fetch_listing(client, "list", "app.bsky.feed.getListFeed", "list", list_uri, limit, config)
        .await
}

async fn fetch_listing(
    client: &XrpcClient,
    source_name: &str,
    endpoint: &'static str,
    param: &str,
    uri: &str,
    limit: usize,
    config: &PageConfig,
) -> Result<FeedExport> {
    if uri.trim().is_empty() {
        return Err(SkeinError::invalid_input(format!("missing {} URI", source_name)));
    }

    let source = XrpcPageSource::<FeedItem>::new(
        client,
        endpoint,
        vec![(param.to_string(), uri.to_string())],
        "feed",
    );
    let result = collect(&source, limit, config).await?;

    let items: Vec<RawItem> = result.items.into_iter().map(RawItem::Feed).collect();
    let posts = anonymize_all(&items, &CollectionOptions::default());

    Ok(FeedExport::new(
        source_name,
        uri,
        None,
        limit,
        result.total_fetched,
        result.request_count,
        posts,
    ))
}

/// Per-member author-feed access, seam for the starter-pack fan-out.
#[async_trait]
pub trait MemberFeeds: Send + Sync {
    async fn member_feed(&self, actor: &str, limit: usize) -> Result<Vec<FeedItem>>;
}

struct ClientMemberFeeds<'a> {
    client: &'a XrpcClient,
    config: &'a PageConfig,
}

#[async_trait]
impl MemberFeeds for ClientMemberFeeds<'_> {
    async fn member_feed(&self, actor: &str, limit: usize) -> Result<Vec<FeedItem>> {
        let source = XrpcPageSource::<FeedItem>::new(
            self.client,
            "app.bsky.feed.getAuthorFeed",
            vec![("actor".to_string(), actor.to_string())],
            "feed",
        );
        Ok(collect(&source, limit, self.config).await?.items)
    }
}

/// Export recent posts from a starter pack's member sample.
///
/// Resolution uses the bounded `listItemsSample` from `getStarterPack`,
/// not the full membership. Members are fetched sequentially; a failing
/// member contributes zero posts and the fan-out continues.
pub async fn fetch_starter_pack(
    client: &XrpcClient,
    pack_uri: &str,
    limit: usize,
    config: &PageConfig,
) -> Result<FeedExport> {
    if pack_uri.trim().is_empty() {
        return Err(SkeinError::invalid_input("missing starter pack URI"));
    }

    let envelope = client
        .get(
            "app.bsky.graph.getStarterPack",
            &[("starterPack".to_string(), pack_uri.to_string())],
        )
        .await?;

    let members: Vec<String> = envelope
        .pointer("/starterPack/listItemsSample")
        .and_then(|v| v.as_array())
        .map(|sample| {
            sample
                .iter()
                .filter_map(|entry| {
                    entry
                        .pointer("/subject/did")
                        .or_else(|| entry.pointer("/subject/handle"))
                        .and_then(|id| id.as_str())
                        .map(str::to_owned)
                })
                .collect()
        })
        .unwrap_or_default();

    if members.is_empty() {
        return Ok(FeedExport::new("starterpack", pack_uri, None, limit, 0, 0, Vec::new()));
    }

    let feeds = ClientMemberFeeds { client, config };
    let items = collect_member_posts(&feeds, &members, limit).await;

    let raw: Vec<RawItem> = items.into_iter().map(RawItem::Feed).collect();
    let total = raw.len();
    let posts = anonymize_all(&raw, &CollectionOptions::default());

    Ok(FeedExport::new(
        "starterpack",
        pack_uri,
        None,
        limit,
        total,
        members.len(),
        posts,
    ))
}

/// Sequential fan-out over pack members with a per-member share of the
/// overall limit. Partial failure is not fatal.
pub(crate) async fn collect_member_posts(
    feeds: &dyn MemberFeeds,
    members: &[String],
    limit: usize,
) -> Vec<FeedItem> {
    let share = limit.div_ceil(members.len().max(1)).max(1);
    let mut collected: Vec<FeedItem> = Vec::new();

    for member in members {
        if collected.len() >= limit {
            break;
        }
        match feeds.member_feed(member, share).await {
            Ok(items) => {
                info!("starter pack member {} contributed {} posts", member, items.len());
                collected.extend(items);
            }
            Err(e) => {
                warn!("skipping starter pack member {}: {}", member, e);
            }
        }
    }

    collected.truncate(limit);
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::{Page, PageSource};
    use serde_json::json;
    use std::sync::Mutex;

    fn feed_item(value: serde_json::Value) -> FeedItem {
        serde_json::from_value(value).unwrap()
    }

    fn five_mixed_items() -> Vec<FeedItem> {
        vec![
            // Two originals
            feed_item(json!({"post": {
                "uri": "at://did:plc:a/app.bsky.feed.post/1",
                "author": {"did": "did:plc:a"},
                "record": {"text": "original one", "createdAt": "2024-01-01T00:00:00Z"}
            }})),
            feed_item(json!({"post": {
                "uri": "at://did:plc:a/app.bsky.feed.post/2",
                "author": {"did": "did:plc:a"},
                "record": {"text": "original two", "createdAt": "2024-01-02T00:00:00Z"}
            }})),
            // One repost
            feed_item(json!({
                "post": {
                    "uri": "at://did:plc:b/app.bsky.feed.post/3",
                    "author": {"did": "did:plc:b"},
                    "record": {"text": "reposted", "createdAt": "2024-01-03T00:00:00Z"}
                },
                "reason": {"$type": "app.bsky.feed.defs#reasonRepost"}
            })),
            // One quote
            feed_item(json!({"post": {
                "uri": "at://did:plc:a/app.bsky.feed.post/4",
                "author": {"did": "did:plc:a"},
                "record": {"text": "quoting", "createdAt": "2024-01-04T00:00:00Z"},
                "embed": {
                    "$type": "app.bsky.embed.record#view",
                    "record": {"uri": "at://did:plc:c/app.bsky.feed.post/q", "value": {"text": "inner"}}
                }
            }})),
            // One reply to another author
            feed_item(json!({"post": {
                "uri": "at://did:plc:a/app.bsky.feed.post/5",
                "author": {"did": "did:plc:a"},
                "record": {
                    "text": "replying",
                    "createdAt": "2024-01-05T00:00:00Z",
                    "reply": {"parent": {"uri": "at://did:plc:other/app.bsky.feed.post/p"}}
                }
            }})),
        ]
    }

    struct OnePageSource {
        items: Vec<FeedItem>,
    }

    #[async_trait]
    impl PageSource<FeedItem> for OnePageSource {
        async fn page(&self, _limit: usize, _cursor: Option<&str>) -> Result<Page<FeedItem>> {
            Ok(Page {
                items: self.items.clone(),
                cursor: None,
            })
        }
    }

    #[tokio::test]
    async fn test_profile_filter_keeps_only_originals() {
        let filter = PostFilter {
            posts: true,
            reposts: false,
            quotes: false,
        };
        let source = OnePageSource {
            items: five_mixed_items(),
        };
        let result = collect_filtered(
            &source,
            |item: &FeedItem| filter.accepts(classify(&item.post, Some(item))),
            10,
            &PageConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].post.text(), "original one");
        assert_eq!(result.items[1].post.text(), "original two");
        assert_eq!(result.total_fetched, 5);
    }

    #[test]
    fn test_filter_never_accepts_replies() {
        let everything = PostFilter::default();
        assert!(!everything.accepts(PostType::Reply));
        assert!(everything.accepts(PostType::Thread));
        assert!(everything.accepts(PostType::Original));
    }

    struct FlakyFeeds {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MemberFeeds for FlakyFeeds {
        async fn member_feed(&self, actor: &str, limit: usize) -> Result<Vec<FeedItem>> {
            self.calls.lock().unwrap().push(actor.to_string());
            if actor == "did:plc:broken" {
                return Err(SkeinError::UpstreamHttp {
                    endpoint: "app.bsky.feed.getAuthorFeed".to_string(),
                    status: 502,
                    body: String::new(),
                });
            }
            Ok((0..limit)
                .map(|i| {
                    feed_item(json!({"post": {
                        "uri": format!("at://{}/app.bsky.feed.post/{}", actor, i),
                        "record": {"text": format!("{} {}", actor, i), "createdAt": "2024-01-01T00:00:00Z"}
                    }}))
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_starter_pack_survives_member_failure() {
        let feeds = FlakyFeeds {
            calls: Mutex::new(Vec::new()),
        };
        let members = vec![
            "did:plc:alice".to_string(),
            "did:plc:broken".to_string(),
            "did:plc:carol".to_string(),
        ];
        let items = collect_member_posts(&feeds, &members, 9).await;

        // ceil(9 / 3) = 3 per member, broken member contributes nothing
        assert_eq!(items.len(), 6);
        assert_eq!(feeds.calls.lock().unwrap().len(), 3);
        assert!(items
            .iter()
            .all(|item| !item.post.text().starts_with("did:plc:broken")));
    }

    #[tokio::test]
    async fn test_starter_pack_stops_at_overall_limit() {
        let feeds = FlakyFeeds {
            calls: Mutex::new(Vec::new()),
        };
        let members = vec![
            "did:plc:a".to_string(),
            "did:plc:b".to_string(),
            "did:plc:c".to_string(),
            "did:plc:d".to_string(),
        ];
        let items = collect_member_posts(&feeds, &members, 2).await;

        assert_eq!(items.len(), 2);
        // First member's share (ceil(2/4) = 1)... fan-out stops once the
        // overall limit is reached, so not every member is queried.
        assert!(feeds.calls.lock().unwrap().len() <= 2);
    }
}
