//! Post-kind classification and fact extraction.
//!
//! Pure functions over the wire model. Classification never inspects the
//! network and never mutates its input; the same post always yields the
//! same tag.

use serde::Serialize;

use crate::post::{Embed, FeedItem, RawPost};
use crate::uri::at_uri_authority;

/// Snippet length cap for quoted post text (chars).
pub const QUOTE_SNIPPET_CHARS: usize = 100;

/// The kind of a post. Exactly one tag per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Original,
    Reply,
    /// A reply whose parent was authored by the same identity
    /// (self-reply / thread continuation).
    Thread,
    Repost,
    Quote,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Original => "original",
            PostType::Reply => "reply",
            PostType::Thread => "thread",
            PostType::Repost => "repost",
            PostType::Quote => "quote",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a post given its optional feed container.
///
/// Precedence, first match wins: repost (container reason) > quote (embed
/// shape) > thread/reply (record reply field + author comparison) >
/// original. A malformed parent URI or a missing identity on either side
/// falls through to `Reply`.
pub fn classify(post: &RawPost, container: Option<&FeedItem>) -> PostType {
    if container
        .and_then(|c| c.reason.as_ref())
        .is_some_and(|r| r.is_repost())
    {
        return PostType::Repost;
    }

    if has_quote_embed(post) {
        return PostType::Quote;
    }

    if let Some(parent_uri) = post
        .reply_refs()
        .and_then(|r| r.parent.as_ref())
        .and_then(|p| p.uri.as_deref())
    {
        let parent_identity = at_uri_authority(parent_uri);
        return match (parent_identity, post.author_did()) {
            (Some(parent), Some(author)) if parent == author => PostType::Thread,
            _ => PostType::Reply,
        };
    }

    PostType::Original
}

fn is_record_reference(embed: &Embed) -> bool {
    matches!(embed, Embed::Record(_) | Embed::RecordWithMedia(_))
}

fn has_quote_embed(post: &RawPost) -> bool {
    let record_embed = post.record.as_ref().and_then(|r| r.embed.as_ref());
    record_embed.is_some_and(is_record_reference)
        || post.embed.as_ref().is_some_and(is_record_reference)
}

/// Whether the post carries attached media.
///
/// Image galleries, external link cards, video, and record-with-media all
/// count; a pure record reference (quote) or no embed at all does not.
pub fn has_media(post: &RawPost) -> bool {
    let is_media = |embed: &Embed| {
        matches!(
            embed,
            Embed::Images(_) | Embed::External(_) | Embed::RecordWithMedia(_) | Embed::Video(_)
        )
    };
    post.record
        .as_ref()
        .and_then(|r| r.embed.as_ref())
        .is_some_and(is_media)
        || post.embed.as_ref().is_some_and(is_media)
}

/// Whether any rich-text facet carries a link feature.
pub fn has_links(post: &RawPost) -> bool {
    post.record
        .as_ref()
        .and_then(|r| r.facets.as_ref())
        .is_some_and(|facets| {
            facets.iter().any(|facet| {
                facet
                    .features
                    .as_ref()
                    .is_some_and(|features| features.iter().any(|f| f.is_link()))
            })
        })
}

/// Ordered list of non-empty alt strings from an embed's image entries.
///
/// Checks the image-gallery shape directly and the media sub-object of the
/// record-with-media shape. Anything else yields nothing.
pub fn extract_alt_text(embed: Option<&Embed>) -> Vec<String> {
    match embed {
        Some(Embed::Images(images)) => images
            .images
            .iter()
            .flatten()
            .filter_map(|img| img.alt.as_deref())
            .filter(|alt| !alt.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Embed::RecordWithMedia(rwm)) => {
            extract_alt_text(rwm.media.as_deref())
        }
        _ => Vec::new(),
    }
}

/// First 100 characters of the quoted post's text, with an ellipsis when
/// truncated. `None` when the embed doesn't reference a record or the view
/// didn't include its text.
pub fn extract_quoted_snippet(embed: Option<&Embed>) -> Option<String> {
    let text = match embed? {
        Embed::Record(rec) => rec.record.as_ref()?.quoted_text()?,
        Embed::RecordWithMedia(rwm) => rwm.record.as_ref()?.quoted_text()?,
        _ => return None,
    };
    Some(truncate_chars(text, QUOTE_SNIPPET_CHARS))
}

/// Truncate to at most `max` chars, appending `"..."` only when text was cut.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{FeedReason, RawRecord, ReplyRefs, UriRef};
    use serde_json::json;

    fn post_with_reply(author_did: &str, parent_uri: &str) -> RawPost {
        RawPost {
            author: Some(crate::post::Author {
                did: Some(author_did.to_string()),
                ..Default::default()
            }),
            record: Some(RawRecord {
                reply: Some(ReplyRefs {
                    parent: Some(UriRef {
                        uri: Some(parent_uri.to_string()),
                        cid: None,
                    }),
                    root: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn repost_container() -> FeedItem {
        FeedItem {
            reason: Some(FeedReason {
                kind: Some("app.bsky.feed.defs#reasonRepost".to_string()),
                by: None,
            }),
            ..Default::default()
        }
    }

    fn quote_post() -> RawPost {
        serde_json::from_value(json!({
            "embed": {
                "$type": "app.bsky.embed.record#view",
                "record": {
                    "uri": "at://did:plc:other/app.bsky.feed.post/q",
                    "value": {"text": "quoted"}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_default_is_original() {
        assert_eq!(classify(&RawPost::default(), None), PostType::Original);
    }

    #[test]
    fn test_repost_beats_quote() {
        // Container repost signal wins even when the embed signals quote
        let post = quote_post();
        let container = repost_container();
        assert_eq!(classify(&post, Some(&container)), PostType::Repost);
        assert_eq!(classify(&post, None), PostType::Quote);
    }

    #[test]
    fn test_self_reply_is_thread() {
        let post = post_with_reply(
            "did:plc:alice",
            "at://did:plc:alice/app.bsky.feed.post/parent",
        );
        assert_eq!(classify(&post, None), PostType::Thread);
    }

    #[test]
    fn test_reply_to_other_author() {
        let post = post_with_reply(
            "did:plc:alice",
            "at://did:plc:bob/app.bsky.feed.post/parent",
        );
        assert_eq!(classify(&post, None), PostType::Reply);
    }

    #[test]
    fn test_malformed_parent_uri_falls_through_to_reply() {
        let post = post_with_reply("did:plc:alice", "not-an-at-uri");
        assert_eq!(classify(&post, None), PostType::Reply);
    }

    #[test]
    fn test_missing_author_falls_through_to_reply() {
        let mut post = post_with_reply(
            "did:plc:alice",
            "at://did:plc:alice/app.bsky.feed.post/parent",
        );
        post.author = None;
        assert_eq!(classify(&post, None), PostType::Reply);
    }

    #[test]
    fn test_classification_is_pure() {
        let post = quote_post();
        let first = classify(&post, None);
        let second = classify(&post, None);
        assert_eq!(first, second);
        assert_eq!(first, PostType::Quote);
    }

    #[test]
    fn test_has_media_shapes() {
        let images: RawPost = serde_json::from_value(json!({
            "embed": {"$type": "app.bsky.embed.images#view", "images": []}
        }))
        .unwrap();
        assert!(has_media(&images));

        let quote = quote_post();
        assert!(!has_media(&quote));

        assert!(!has_media(&RawPost::default()));
    }

    #[test]
    fn test_has_links_from_facets() {
        let post: RawPost = serde_json::from_value(json!({
            "record": {
                "text": "see link",
                "facets": [
                    {"features": [{"$type": "app.bsky.richtext.facet#tag"}]},
                    {"features": [{"$type": "app.bsky.richtext.facet#link", "uri": "https://example.com"}]}
                ]
            }
        }))
        .unwrap();
        assert!(has_links(&post));

        let no_link: RawPost = serde_json::from_value(json!({
            "record": {
                "facets": [{"features": [{"$type": "app.bsky.richtext.facet#mention"}]}]
            }
        }))
        .unwrap();
        assert!(!has_links(&no_link));
    }

    #[test]
    fn test_alt_text_skips_empty_and_preserves_order() {
        let embed: Embed = serde_json::from_value(json!({
            "$type": "app.bsky.embed.images#view",
            "images": [
                {"alt": "first"},
                {"alt": ""},
                {"alt": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(extract_alt_text(Some(&embed)), vec!["first", "second"]);
    }

    #[test]
    fn test_alt_text_through_record_with_media() {
        let embed: Embed = serde_json::from_value(json!({
            "$type": "app.bsky.embed.recordWithMedia#view",
            "record": {"record": {"uri": "at://did:plc:x/app.bsky.feed.post/1"}},
            "media": {
                "$type": "app.bsky.embed.images#view",
                "images": [{"alt": "attached"}]
            }
        }))
        .unwrap();
        assert_eq!(extract_alt_text(Some(&embed)), vec!["attached"]);
        assert!(extract_alt_text(None).is_empty());
    }

    #[test]
    fn test_snippet_truncation_boundary() {
        let exactly_100 = "x".repeat(100);
        let over = "x".repeat(101);

        let make = |text: &str| -> Embed {
            serde_json::from_value(json!({
                "$type": "app.bsky.embed.record#view",
                "record": {"uri": "at://did:plc:x/app.bsky.feed.post/1", "value": {"text": text}}
            }))
            .unwrap()
        };

        // Exactly 100 chars is left unmodified
        assert_eq!(
            extract_quoted_snippet(Some(&make(&exactly_100))),
            Some(exactly_100.clone())
        );

        // 101 chars is cut to 100 + ellipsis
        let snipped = extract_quoted_snippet(Some(&make(&over))).unwrap();
        assert_eq!(snipped.chars().count(), 103);
        assert!(snipped.ends_with("..."));
        assert_eq!(&snipped[..100], exactly_100.as_str());
    }

    #[test]
    fn test_snippet_absent_for_non_quote_embeds() {
        let embed: Embed = serde_json::from_value(json!({
            "$type": "app.bsky.embed.images#view",
            "images": [{"alt": "pic"}]
        }))
        .unwrap();
        assert_eq!(extract_quoted_snippet(Some(&embed)), None);
        assert_eq!(extract_quoted_snippet(None), None);
    }
}
