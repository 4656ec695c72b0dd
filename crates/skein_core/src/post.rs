//! Wire-level types for the Bluesky read API.
//!
//! The upstream returns the same logical "post" nested differently per
//! endpoint, and any field may be absent. Every field here is optional;
//! absence means "unknown/zero", never an error. Default resolution is
//! centralized in the anonymizer rather than scattered at use sites.

use serde::Deserialize;
use serde_json::Value;

/// A post view as returned by feed, search, and thread endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub uri: Option<String>,
    pub cid: Option<String>,
    pub author: Option<Author>,
    pub record: Option<RawRecord>,
    /// View-level embed (hydrated by the AppView).
    pub embed: Option<Embed>,
    pub like_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub repost_count: Option<u64>,
    pub quote_count: Option<u64>,
    pub indexed_at: Option<String>,
}

impl RawPost {
    /// Text of the post record, empty when absent.
    pub fn text(&self) -> &str {
        self.record
            .as_ref()
            .and_then(|r| r.text.as_deref())
            .unwrap_or("")
    }

    /// Author DID, when the upstream included one.
    pub fn author_did(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.did.as_deref())
    }

    /// The record-level reply reference, if this post is a reply.
    pub fn reply_refs(&self) -> Option<&ReplyRefs> {
        self.record.as_ref().and_then(|r| r.reply.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Author {
    pub did: Option<String>,
    pub handle: Option<String>,
    pub display_name: Option<String>,
}

/// The authored record payload (`app.bsky.feed.post`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRecord {
    pub text: Option<String>,
    pub created_at: Option<String>,
    pub langs: Option<Vec<String>>,
    pub reply: Option<ReplyRefs>,
    /// Record-level embed (as authored, not hydrated).
    pub embed: Option<Embed>,
    pub facets: Option<Vec<Facet>>,
}

/// Root/parent URI pair carried by reply records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplyRefs {
    pub root: Option<UriRef>,
    pub parent: Option<UriRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UriRef {
    pub uri: Option<String>,
    pub cid: Option<String>,
}

/// Rich-text annotation over a byte range of the post text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Facet {
    pub features: Option<Vec<FacetFeature>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FacetFeature {
    #[serde(rename = "$type")]
    pub kind: Option<String>,
    pub uri: Option<String>,
}

impl FacetFeature {
    pub fn is_link(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.ends_with("#link"))
    }
}

/// Structured attachment on a post.
///
/// Record-level (`app.bsky.embed.images`) and view-level
/// (`app.bsky.embed.images#view`) shapes map to the same variant; the
/// fields we read are spelled identically in both.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(
        rename = "app.bsky.embed.images",
        alias = "app.bsky.embed.images#view"
    )]
    Images(ImagesEmbed),
    #[serde(
        rename = "app.bsky.embed.external",
        alias = "app.bsky.embed.external#view"
    )]
    External(ExternalEmbed),
    #[serde(
        rename = "app.bsky.embed.record",
        alias = "app.bsky.embed.record#view"
    )]
    Record(RecordEmbed),
    #[serde(
        rename = "app.bsky.embed.recordWithMedia",
        alias = "app.bsky.embed.recordWithMedia#view"
    )]
    RecordWithMedia(RecordWithMediaEmbed),
    #[serde(
        rename = "app.bsky.embed.video",
        alias = "app.bsky.embed.video#view"
    )]
    Video(VideoEmbed),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImagesEmbed {
    pub images: Option<Vec<ImageItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageItem {
    pub alt: Option<String>,
    pub thumb: Option<String>,
    pub fullsize: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExternalEmbed {
    pub external: Option<ExternalLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExternalLink {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumb: Option<Value>,
}

/// Quoted-record reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordEmbed {
    pub record: Option<EmbeddedRecord>,
}

/// The referenced record inside a quote embed.
///
/// Record-level embeds carry just `uri`/`cid`; view-level embeds carry a
/// `value` with the quoted record's body, and `recordWithMedia` views nest
/// one level deeper (`record.record`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddedRecord {
    pub uri: Option<String>,
    pub cid: Option<String>,
    pub value: Option<Box<RawRecord>>,
    pub record: Option<Box<EmbeddedRecord>>,
}

impl EmbeddedRecord {
    /// URI of the referenced record, following the nested shape if needed.
    pub fn target_uri(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .or_else(|| self.record.as_ref().and_then(|r| r.target_uri()))
    }

    /// Text of the quoted record, when the view included it.
    pub fn quoted_text(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|v| v.text.as_deref())
            .or_else(|| self.record.as_ref().and_then(|r| r.quoted_text()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordWithMediaEmbed {
    pub record: Option<EmbeddedRecord>,
    pub media: Option<Box<Embed>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoEmbed {
    pub alt: Option<String>,
    pub thumbnail: Option<String>,
}

/// One element of a feed listing: a post plus its container context.
///
/// The `reason` marks reposts; `reply` is feed-level reply context that may
/// duplicate the record's own reply field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedItem {
    pub post: RawPost,
    pub reason: Option<FeedReason>,
    pub reply: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedReason {
    #[serde(rename = "$type")]
    pub kind: Option<String>,
    pub by: Option<Author>,
}

impl FeedReason {
    pub fn is_repost(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.ends_with("#reasonRepost"))
    }
}

/// Which listing shape an item arrived in.
///
/// Feed endpoints nest the post inside a container; search and thread
/// endpoints return the post directly. The caller declares the shape once
/// instead of probing fields at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Feed,
    Search,
    Thread,
}

/// A listing item tagged with its source shape.
#[derive(Debug, Clone)]
pub enum RawItem {
    Feed(FeedItem),
    Post(RawPost),
}

impl RawItem {
    /// Deserialize a raw JSON item according to its declared source shape.
    pub fn from_value(value: Value, kind: SourceKind) -> serde_json::Result<Self> {
        Ok(match kind {
            SourceKind::Feed => RawItem::Feed(serde_json::from_value(value)?),
            SourceKind::Search | SourceKind::Thread => {
                RawItem::Post(serde_json::from_value(value)?)
            }
        })
    }

    /// The underlying post, whatever the container shape.
    pub fn post(&self) -> &RawPost {
        match self {
            RawItem::Feed(item) => &item.post,
            RawItem::Post(post) => post,
        }
    }

    /// The feed container, when this item came from a feed listing.
    pub fn container(&self) -> Option<&FeedItem> {
        match self {
            RawItem::Feed(item) => Some(item),
            RawItem::Post(_) => None,
        }
    }
}

/// One node of a `getPostThread` response tree.
///
/// Only used to flatten the nested shape back into a parent-pointer list;
/// reconstruction works from record-level reply references alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThreadView {
    pub post: Option<RawPost>,
    pub replies: Option<Vec<ThreadView>>,
}

impl ThreadView {
    /// Collect every descendant post (not the subject itself) depth-first.
    pub fn flatten_replies(&self) -> Vec<RawPost> {
        let mut out = Vec::new();
        if let Some(replies) = &self.replies {
            for reply in replies {
                reply.collect_into(&mut out);
            }
        }
        out
    }

    fn collect_into(&self, out: &mut Vec<RawPost>) {
        if let Some(post) = &self.post {
            out.push(post.clone());
        }
        if let Some(replies) = &self.replies {
            for reply in replies {
                reply.collect_into(out);
            }
        }
    }
}
