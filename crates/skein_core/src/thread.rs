//! Thread reconstruction from a flat parent-pointer list.
//!
//! Reply listings carry only record-level root/parent references; this
//! module rebuilds the hierarchy, orders every sibling list
//! chronologically, and promotes orphans (replies whose parent was pruned
//! or deleted upstream) to the top level instead of dropping them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::anonymize::{anonymize, AnonymizeOptions, AnonymizedPost};
use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};
use crate::export::ThreadExport;
use crate::post::{RawPost, ThreadView};

/// A reply and its transitive descendants, each level sorted by creation
/// time ascending.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub post: AnonymizedPost,
    pub replies: Vec<ThreadNode>,
}

/// What the anonymizer should include for each node.
#[derive(Debug, Clone, Copy)]
pub struct ThreadBuildOptions {
    pub include_post_type: bool,
    pub include_alt_text: bool,
}

impl Default for ThreadBuildOptions {
    fn default() -> Self {
        Self {
            include_post_type: true,
            include_alt_text: true,
        }
    }
}

/// Construction-only scaffolding; projected to [`ThreadNode`] at the end
/// and never exposed.
struct BuildNode {
    uri: String,
    parent_uri: String,
    created_at: DateTime<Utc>,
    post: AnonymizedPost,
    children: Vec<usize>,
}

/// Rebuild the reply forest for one thread.
///
/// The synthetic root URI is taken from the first reply's declared thread
/// root (all replies in one thread share it). Items lacking both text and
/// embed, or lacking a usable creation instant, are treated as corrupt
/// upstream data and excluded before construction.
pub fn build_thread(flat_replies: &[RawPost], options: &ThreadBuildOptions) -> Vec<ThreadNode> {
    let usable: Vec<&RawPost> = flat_replies
        .iter()
        .filter(|post| !is_corrupt(post))
        .collect();

    let Some(first) = usable.first() else {
        return Vec::new();
    };

    let root_uri = first
        .reply_refs()
        .and_then(|r| r.root.as_ref())
        .and_then(|root| root.uri.clone())
        .unwrap_or_default();

    // First pass: anonymize and decorate with construction scaffolding.
    let mut nodes: Vec<BuildNode> = Vec::with_capacity(usable.len());
    for (index, post) in usable.iter().enumerate() {
        // is_corrupt guaranteed a parseable instant
        let Some(created_at) = creation_instant(post) else {
            continue;
        };

        let mut opts = AnonymizeOptions::default().at_index(index);
        opts.include_post_type = options.include_post_type;
        opts.include_alt_text = options.include_alt_text;

        let parent_uri = post
            .reply_refs()
            .and_then(|r| r.parent.as_ref())
            .and_then(|p| p.uri.clone())
            // Direct top-level replies may omit the explicit parent
            .unwrap_or_else(|| root_uri.clone());

        nodes.push(BuildNode {
            uri: post.uri.clone().unwrap_or_default(),
            parent_uri,
            created_at,
            post: anonymize(post, &opts),
            children: Vec::new(),
        });
    }

    // Second pass: link children to parents, promoting orphans.
    let by_uri: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| !n.uri.is_empty())
        .map(|(i, n)| (n.uri.clone(), i))
        .collect();

    let mut top_level: Vec<usize> = Vec::new();
    for index in 0..nodes.len() {
        let parent_uri = nodes[index].parent_uri.clone();
        if parent_uri == root_uri {
            top_level.push(index);
        } else if let Some(&parent) = by_uri.get(&parent_uri) {
            if parent == index {
                // A record claiming to be its own parent is upstream noise
                warn!("reply {} claims itself as parent, promoting", nodes[index].uri);
                top_level.push(index);
            } else {
                nodes[parent].children.push(index);
            }
        } else {
            debug!(
                "parent {} not in reply set, promoting {} to top level",
                parent_uri, nodes[index].uri
            );
            top_level.push(index);
        }
    }

    // Chronological order at every level; sort_by_key is stable so ties
    // keep encounter order.
    let stamps: Vec<DateTime<Utc>> = nodes.iter().map(|n| n.created_at).collect();
    for node in nodes.iter_mut() {
        node.children.sort_by_key(|&child| stamps[child]);
    }
    top_level.sort_by_key(|&index| stamps[index]);

    // Project to the public shape, dropping the scaffolding.
    let mut slots: Vec<Option<BuildNode>> = nodes.into_iter().map(Some).collect();
    top_level
        .into_iter()
        .filter_map(|index| project(index, &mut slots))
        .collect()
}

fn project(index: usize, slots: &mut [Option<BuildNode>]) -> Option<ThreadNode> {
    let node = slots[index].take()?;
    let replies = node
        .children
        .iter()
        .filter_map(|&child| project(child, slots))
        .collect();
    Some(ThreadNode {
        post: node.post,
        replies,
    })
}

/// Fetch a post's thread and rebuild its reply forest.
///
/// `getPostThread` returns a nested view; it is flattened back to a
/// parent-pointer list and reconstructed from record-level references, so
/// ordering and orphan handling are identical however the replies arrive.
pub async fn fetch_thread(
    client: &XrpcClient,
    uri: &str,
    options: &ThreadBuildOptions,
) -> Result<ThreadExport> {
    if !uri.starts_with("at://") {
        return Err(SkeinError::invalid_input(format!("not an AT-URI: {}", uri)));
    }

    let envelope = client
        .get(
            "app.bsky.feed.getPostThread",
            &[
                ("uri".to_string(), uri.to_string()),
                ("depth".to_string(), "1000".to_string()),
            ],
        )
        .await?;

    let view: ThreadView = envelope
        .get("thread")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| SkeinError::Decode {
            endpoint: "app.bsky.feed.getPostThread".to_string(),
            source: e,
        })?
        .unwrap_or_default();

    let root = view.post.as_ref().map(|post| {
        let mut opts = AnonymizeOptions::default();
        opts.include_post_type = options.include_post_type;
        opts.include_alt_text = options.include_alt_text;
        anonymize(post, &opts)
    });

    let flat = view.flatten_replies();
    let replies = build_thread(&flat, options);

    Ok(ThreadExport::new(uri, root, replies))
}

/// Total node count across the whole forest.
pub fn count_all(nodes: &[ThreadNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_all(&node.replies))
        .sum()
}

fn is_corrupt(post: &RawPost) -> bool {
    let has_content = !post.text().is_empty()
        || post.record.as_ref().is_some_and(|r| r.embed.is_some())
        || post.embed.is_some();
    !has_content || creation_instant(post).is_none()
}

fn creation_instant(post: &RawPost) -> Option<DateTime<Utc>> {
    let raw = post
        .record
        .as_ref()
        .and_then(|r| r.created_at.as_deref())
        .or(post.indexed_at.as_deref())?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(
        uri: &str,
        parent: Option<&str>,
        root: &str,
        created: &str,
        text: &str,
    ) -> RawPost {
        let mut record = json!({
            "text": text,
            "createdAt": created,
            "reply": {"root": {"uri": root}}
        });
        if let Some(parent) = parent {
            record["reply"]["parent"] = json!({"uri": parent});
        }
        serde_json::from_value(json!({"uri": uri, "record": record})).unwrap()
    }

    const ROOT: &str = "at://did:plc:op/app.bsky.feed.post/root";

    #[test]
    fn test_empty_input_yields_empty_forest() {
        assert!(build_thread(&[], &ThreadBuildOptions::default()).is_empty());
    }

    #[test]
    fn test_round_trip_chronological_nesting() {
        // A (parent = root), B (parent = A), C (parent = root, created
        // before A) -> top level [C, A], with B under A.
        let a = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            Some(ROOT),
            ROOT,
            "2024-03-01T12:00:00Z",
            "A",
        );
        let b = reply(
            "at://did:plc:y/app.bsky.feed.post/b",
            Some("at://did:plc:x/app.bsky.feed.post/a"),
            ROOT,
            "2024-03-01T13:00:00Z",
            "B",
        );
        let c = reply(
            "at://did:plc:z/app.bsky.feed.post/c",
            Some(ROOT),
            ROOT,
            "2024-03-01T11:00:00Z",
            "C",
        );

        let forest = build_thread(&[a, b, c], &ThreadBuildOptions::default());
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].post.text, "C");
        assert_eq!(forest[1].post.text, "A");
        assert_eq!(forest[1].replies.len(), 1);
        assert_eq!(forest[1].replies[0].post.text, "B");
        assert_eq!(count_all(&forest), 3);
    }

    #[test]
    fn test_missing_parent_defaults_to_root() {
        let direct = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            None,
            ROOT,
            "2024-03-01T12:00:00Z",
            "direct",
        );
        let forest = build_thread(&[direct], &ThreadBuildOptions::default());
        assert_eq!(forest.len(), 1);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_orphan_promoted_not_dropped() {
        let a = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            Some(ROOT),
            ROOT,
            "2024-03-01T12:00:00Z",
            "A",
        );
        let orphan = reply(
            "at://did:plc:y/app.bsky.feed.post/orphan",
            Some("at://did:plc:gone/app.bsky.feed.post/deleted"),
            ROOT,
            "2024-03-01T13:00:00Z",
            "orphan",
        );

        let forest = build_thread(&[a, orphan], &ThreadBuildOptions::default());
        assert_eq!(forest.len(), 2);
        assert_eq!(count_all(&forest), 2);
        assert!(forest.iter().any(|n| n.post.text == "orphan"));
    }

    #[test]
    fn test_corrupt_entries_excluded() {
        let good = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            Some(ROOT),
            ROOT,
            "2024-03-01T12:00:00Z",
            "good",
        );
        // No text, no embed
        let empty: RawPost = serde_json::from_value(json!({
            "uri": "at://did:plc:y/app.bsky.feed.post/empty",
            "record": {"createdAt": "2024-03-01T12:30:00Z", "reply": {"root": {"uri": ROOT}}}
        }))
        .unwrap();
        // No timestamp anywhere
        let undated: RawPost = serde_json::from_value(json!({
            "uri": "at://did:plc:z/app.bsky.feed.post/undated",
            "record": {"text": "when?", "reply": {"root": {"uri": ROOT}}}
        }))
        .unwrap();

        let forest = build_thread(&[good, empty, undated], &ThreadBuildOptions::default());
        assert_eq!(count_all(&forest), 1);
        assert_eq!(forest[0].post.text, "good");
    }

    #[test]
    fn test_deep_nesting_and_count() {
        let a = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            Some(ROOT),
            ROOT,
            "2024-03-01T10:00:00Z",
            "A",
        );
        let b = reply(
            "at://did:plc:x/app.bsky.feed.post/b",
            Some("at://did:plc:x/app.bsky.feed.post/a"),
            ROOT,
            "2024-03-01T11:00:00Z",
            "B",
        );
        let c = reply(
            "at://did:plc:x/app.bsky.feed.post/c",
            Some("at://did:plc:x/app.bsky.feed.post/b"),
            ROOT,
            "2024-03-01T12:00:00Z",
            "C",
        );
        let d = reply(
            "at://did:plc:x/app.bsky.feed.post/d",
            Some("at://did:plc:x/app.bsky.feed.post/a"),
            ROOT,
            "2024-03-01T09:30:00Z",
            "D",
        );

        let forest = build_thread(&[a, b, c, d], &ThreadBuildOptions::default());
        assert_eq!(forest.len(), 1);
        assert_eq!(count_all(&forest), 4);
        // A's children sorted chronologically: D (09:30) before B (11:00)
        assert_eq!(forest[0].replies[0].post.text, "D");
        assert_eq!(forest[0].replies[1].post.text, "B");
        assert_eq!(forest[0].replies[1].replies[0].post.text, "C");
    }

    #[test]
    fn test_node_serialization_flattens_post() {
        let a = reply(
            "at://did:plc:x/app.bsky.feed.post/a",
            Some(ROOT),
            ROOT,
            "2024-03-01T10:00:00Z",
            "A",
        );
        let forest = build_thread(&[a], &ThreadBuildOptions::default());
        let value = serde_json::to_value(&forest[0]).unwrap();
        let obj = value.as_object().unwrap();
        // Post fields sit beside the replies list; no scaffolding remains
        assert_eq!(obj["text"], "A");
        assert!(obj["replies"].as_array().unwrap().is_empty());
        assert!(!obj.contains_key("uri"));
        assert!(!obj.contains_key("parentUri"));
    }
}
