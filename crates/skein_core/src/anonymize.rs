//! Mapping raw posts into the canonical anonymized record.
//!
//! All default resolution for absent upstream fields lives here: counts
//! become zero, the language becomes `"unknown"`, the timestamp falls back
//! from the authored time to the server-indexed time to empty. Nothing in
//! this module can fail.

use serde::Serialize;

use crate::classify::{
    classify, extract_alt_text, extract_quoted_snippet, has_links, has_media, PostType,
};
use crate::post::{FeedItem, RawItem, RawPost};

/// The canonical output unit.
///
/// `id` values are unique and densely ordered within one produced
/// collection. Optional fields are omitted from serialized output when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedPost {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub like_count: u64,
    pub reply_count: u64,
    pub repost_count: u64,
    pub has_media: bool,
    pub has_links: bool,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_type: Option<PostType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_post_snippet: Option<String>,
}

/// Options for a single anonymization.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymizeOptions<'a> {
    /// Include the `postType` tag.
    pub include_post_type: bool,
    /// Pre-computed type, skipping classification.
    pub post_type: Option<PostType>,
    /// Feed container for classification, when the item came from a feed.
    pub container: Option<&'a FeedItem>,
    /// Include the merged alt-text list.
    pub include_alt_text: bool,
    /// Include the quoted snippet (honored only for quote-type posts).
    pub include_quoted_snippet: bool,
    /// 0-based position within the produced collection; forms `post_<n+1>`.
    pub index: usize,
}

impl<'a> AnonymizeOptions<'a> {
    pub fn with_post_type(mut self) -> Self {
        self.include_post_type = true;
        self
    }

    pub fn with_known_type(mut self, post_type: PostType) -> Self {
        self.include_post_type = true;
        self.post_type = Some(post_type);
        self
    }

    pub fn with_container(mut self, container: &'a FeedItem) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_alt_text(mut self) -> Self {
        self.include_alt_text = true;
        self
    }

    pub fn with_quoted_snippet(mut self) -> Self {
        self.include_quoted_snippet = true;
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// Collection-level options applied by [`anonymize_all`].
#[derive(Debug, Clone, Copy)]
pub struct CollectionOptions {
    pub include_post_type: bool,
    pub include_alt_text: bool,
    pub include_quoted_snippet: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            include_post_type: true,
            include_alt_text: true,
            include_quoted_snippet: false,
        }
    }
}

/// Map one raw post to its anonymized form. Never fails; every absent
/// field has a documented default.
pub fn anonymize(post: &RawPost, options: &AnonymizeOptions<'_>) -> AnonymizedPost {
    let record = post.record.as_ref();

    let created_at = record
        .and_then(|r| r.created_at.as_deref())
        .or(post.indexed_at.as_deref())
        .unwrap_or("")
        .to_string();

    let language = record
        .and_then(|r| r.langs.as_ref())
        .and_then(|langs| langs.first())
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    let post_type = if options.include_post_type {
        Some(
            options
                .post_type
                .unwrap_or_else(|| classify(post, options.container)),
        )
    } else {
        None
    };

    let alt_text = if options.include_alt_text {
        let mut merged = extract_alt_text(record.and_then(|r| r.embed.as_ref()));
        for alt in extract_alt_text(post.embed.as_ref()) {
            if !merged.contains(&alt) {
                merged.push(alt);
            }
        }
        if merged.is_empty() { None } else { Some(merged) }
    } else {
        None
    };

    let quoted_post_snippet = if options.include_quoted_snippet
        && post_type == Some(PostType::Quote)
    {
        extract_quoted_snippet(post.embed.as_ref())
            .or_else(|| extract_quoted_snippet(record.and_then(|r| r.embed.as_ref())))
    } else {
        None
    };

    AnonymizedPost {
        id: format!("post_{}", options.index + 1),
        text: post.text().to_string(),
        created_at,
        like_count: post.like_count.unwrap_or(0),
        reply_count: post.reply_count.unwrap_or(0),
        repost_count: post.repost_count.unwrap_or(0),
        has_media: has_media(post),
        has_links: has_links(post),
        language,
        post_type,
        alt_text,
        quote_count: post.quote_count,
        quoted_post_snippet,
    }
}

/// Anonymize a whole collection, assigning sequential ids and threading
/// each item's feed container (when present) through classification.
pub fn anonymize_all(items: &[RawItem], options: &CollectionOptions) -> Vec<AnonymizedPost> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut opts = AnonymizeOptions {
                include_post_type: options.include_post_type,
                include_alt_text: options.include_alt_text,
                include_quoted_snippet: options.include_quoted_snippet,
                index,
                ..Default::default()
            };
            if let Some(container) = item.container() {
                opts.container = Some(container);
            }
            anonymize(item.post(), &opts)
        })
        .collect()
}
