//! Full-text post search.

use crate::anonymize::{anonymize_all, CollectionOptions};
use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};
use crate::export::SearchExport;
use crate::paginate::{collect, PageConfig, XrpcPageSource};
use crate::post::{RawItem, RawPost};

/// Result ordering accepted by `searchPosts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchSort {
    #[default]
    Latest,
    Top,
}

impl SearchSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::Latest => "latest",
            SearchSort::Top => "top",
        }
    }
}

impl std::fmt::Display for SearchSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchSort {
    type Err = SkeinError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latest" => Ok(SearchSort::Latest),
            "top" => Ok(SearchSort::Top),
            other => Err(SkeinError::invalid_input(format!(
                "unknown sort '{}', expected 'latest' or 'top'",
                other
            ))),
        }
    }
}

/// Search posts matching `query`, anonymized and wrapped for export.
pub async fn search_posts(
    client: &XrpcClient,
    query: &str,
    sort: SearchSort,
    limit: usize,
    config: &PageConfig,
) -> Result<SearchExport> {
    if query.trim().is_empty() {
        return Err(SkeinError::invalid_input("empty search query"));
    }

    let source = XrpcPageSource::<RawPost>::new(
        client,
        "app.bsky.feed.searchPosts",
        vec![
            ("q".to_string(), query.to_string()),
            ("sort".to_string(), sort.as_str().to_string()),
        ],
        "posts",
    );

    let result = collect(&source, limit, config).await?;
    let items: Vec<RawItem> = result.items.into_iter().map(RawItem::Post).collect();
    let posts = anonymize_all(&items, &CollectionOptions::default());

    Ok(SearchExport::new(query, sort.as_str(), limit, posts))
}
