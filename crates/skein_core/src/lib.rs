//! skein-core: read-side toolkit for Bluesky.
//!
//! Fetches public posts over XRPC, classifies them (original, reply,
//! thread continuation, repost, quote), strips identifying fields into a
//! canonical anonymized record, and reassembles reply trees from flat
//! parent-pointer lists. Everything exports as plain JSON envelopes.
//!
//! The HTTP layer is deliberately thin; the interesting parts (adaptive
//! filtered pagination, classification precedence, thread reconstruction)
//! are pure and run against trait seams, so they test without a network.

pub mod anonymize;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod feed;
pub mod paginate;
pub mod post;
pub mod quotes;
pub mod search;
pub mod session;
pub mod thread;
pub mod uri;

pub use anonymize::{anonymize, anonymize_all, AnonymizedPost};
pub use classify::{classify, PostType};
pub use client::XrpcClient;
pub use config::SkeinConfig;
pub use error::{Result, SkeinError};
pub use export::{FeedExport, QuotesExport, SearchExport, ThreadExport};
pub use feed::{fetch_author_feed, fetch_custom_feed, fetch_list_feed, fetch_starter_pack, PostFilter};
pub use paginate::{collect, collect_filtered, PageConfig, PaginationResult};
pub use quotes::fetch_quotes;
pub use search::{search_posts, SearchSort};
pub use session::Session;
pub use thread::{build_thread, fetch_thread, ThreadBuildOptions, ThreadNode};
pub use uri::{parse_target, BskyTarget};
