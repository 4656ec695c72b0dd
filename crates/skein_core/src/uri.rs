//! AT-URI helpers and bsky.app share-URL parsing.
//!
//! AT-URIs look like `at://<authority>/<collection>/<rkey>`. The authority
//! is a DID or handle; DIDs contain `:` which general-purpose URL parsers
//! read as a host/port split, so the components are extracted with a
//! dedicated parser here. Authorities never contain `/`.

use tracing::warn;
use url::Url;

use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";
pub const LIST_COLLECTION: &str = "app.bsky.graph.list";
pub const STARTER_PACK_COLLECTION: &str = "app.bsky.graph.starterpack";

/// The identity segment of an AT-URI (the repo owner).
///
/// Returns `None` for anything that is not a well-formed `at://` URI.
pub fn at_uri_authority(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        None
    } else {
        Some(authority)
    }
}

/// The record key (final segment) of an AT-URI.
pub fn at_uri_rkey(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    let mut segments = rest.split('/');
    let _authority = segments.next()?;
    let _collection = segments.next()?;
    let rkey = segments.next()?;
    if rkey.is_empty() { None } else { Some(rkey) }
}

/// Assemble an AT-URI from its components.
pub fn make_at_uri(authority: &str, collection: &str, rkey: &str) -> String {
    format!("at://{}/{}/{}", authority, collection, rkey)
}

/// A parsed bsky.app share URL (or a raw AT-URI passed through).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BskyTarget {
    Profile { actor: String },
    Post { actor: String, rkey: String },
    Feed { actor: String, rkey: String },
    List { actor: String, rkey: String },
    StarterPack { actor: String, rkey: String },
    AtUri { uri: String },
}

/// Parse user input: a raw `at://` URI, a bsky.app URL, or a bare actor.
pub fn parse_target(input: &str) -> Result<BskyTarget> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SkeinError::invalid_input("empty target"));
    }

    if input.starts_with("at://") {
        // Validate enough structure to be addressable
        if at_uri_authority(input).is_none() {
            return Err(SkeinError::invalid_input(format!(
                "malformed AT-URI: {}",
                input
            )));
        }
        return Ok(BskyTarget::AtUri {
            uri: input.to_string(),
        });
    }

    if input.starts_with("https://") || input.starts_with("http://") {
        return parse_share_url(input);
    }

    // Bare handle or DID
    Ok(BskyTarget::Profile {
        actor: input.to_string(),
    })
}

fn parse_share_url(input: &str) -> Result<BskyTarget> {
    let url = Url::parse(input)
        .map_err(|e| SkeinError::invalid_input(format!("unparseable URL {}: {}", input, e)))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["profile", actor] => Ok(BskyTarget::Profile {
            actor: (*actor).to_string(),
        }),
        ["profile", actor, "post", rkey] => Ok(BskyTarget::Post {
            actor: (*actor).to_string(),
            rkey: (*rkey).to_string(),
        }),
        ["profile", actor, "feed", rkey] => Ok(BskyTarget::Feed {
            actor: (*actor).to_string(),
            rkey: (*rkey).to_string(),
        }),
        ["profile", actor, "lists", rkey] => Ok(BskyTarget::List {
            actor: (*actor).to_string(),
            rkey: (*rkey).to_string(),
        }),
        ["starter-pack", actor, rkey] => Ok(BskyTarget::StarterPack {
            actor: (*actor).to_string(),
            rkey: (*rkey).to_string(),
        }),
        _ => Err(SkeinError::invalid_input(format!(
            "unrecognized Bluesky URL: {}",
            input
        ))),
    }
}

/// Build a record URI for an actor, resolving the handle to its DID.
///
/// Handle resolution failure degrades to a handle-based URI (the upstream
/// accepts either form in many contexts) rather than propagating.
pub async fn build_record_uri(
    client: &XrpcClient,
    actor: &str,
    collection: &str,
    rkey: &str,
) -> String {
    if actor.starts_with("did:") {
        return make_at_uri(actor, collection, rkey);
    }
    match client.resolve_handle(actor).await {
        Ok(did) => make_at_uri(&did, collection, rkey),
        Err(e) => {
            warn!("handle resolution for {} failed ({}), using handle-based URI", actor, e);
            make_at_uri(actor, collection, rkey)
        }
    }
}
