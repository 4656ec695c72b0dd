//! Subcommand implementations: resolve the target, run the core
//! orchestrator, emit the JSON export.

use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use skein_core::uri::{
    self, BskyTarget, FEED_GENERATOR_COLLECTION, LIST_COLLECTION, POST_COLLECTION,
    STARTER_PACK_COLLECTION,
};
use skein_core::{
    feed, quotes, search, thread, PostFilter, SearchSort, SkeinConfig, SkeinError,
    ThreadBuildOptions, XrpcClient,
};

use crate::output::Output;

pub struct Context {
    pub client: XrpcClient,
    pub config: SkeinConfig,
    pub limit: usize,
    pub destination: Option<PathBuf>,
    pub output: Output,
}

impl Context {
    fn write_export<T: Serialize>(&self, export: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(export).into_diagnostic()?;
        match &self.destination {
            Some(path) => {
                std::fs::write(path, json).into_diagnostic()?;
                self.output
                    .success(&format!("wrote export to {}", path.display()));
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

pub async fn profile(ctx: &Context, actor: &str, filter: PostFilter) -> Result<()> {
    let actor = match uri::parse_target(actor)? {
        BskyTarget::Profile { actor } => actor,
        other => {
            return Err(SkeinError::invalid_input(format!(
                "expected a handle, DID, or profile URL, got {:?}",
                other
            ))
            .into());
        }
    };

    ctx.output.info("profile:", &actor);
    let export =
        feed::fetch_author_feed(&ctx.client, &actor, filter, ctx.limit, &ctx.config.pagination)
            .await?;
    ctx.write_export(&export)
}

pub async fn custom_feed(ctx: &Context, target: &str) -> Result<()> {
    let uri = resolve_record_uri(ctx, target, FEED_GENERATOR_COLLECTION, "feed").await?;
    ctx.output.info("feed:", &uri);
    let export =
        feed::fetch_custom_feed(&ctx.client, &uri, ctx.limit, &ctx.config.pagination).await?;
    ctx.write_export(&export)
}

pub async fn list_feed(ctx: &Context, target: &str) -> Result<()> {
    let uri = resolve_record_uri(ctx, target, LIST_COLLECTION, "list").await?;
    ctx.output.info("list:", &uri);
    let export =
        feed::fetch_list_feed(&ctx.client, &uri, ctx.limit, &ctx.config.pagination).await?;
    ctx.write_export(&export)
}

pub async fn starter_pack(ctx: &Context, target: &str) -> Result<()> {
    let uri = resolve_record_uri(ctx, target, STARTER_PACK_COLLECTION, "starter pack").await?;
    ctx.output.info("starter pack:", &uri);
    let export =
        feed::fetch_starter_pack(&ctx.client, &uri, ctx.limit, &ctx.config.pagination).await?;
    ctx.write_export(&export)
}

pub async fn search(ctx: &Context, query: &str, sort: &str) -> Result<()> {
    let sort: SearchSort = sort.parse()?;
    ctx.output.info("search:", query);
    let export =
        search::search_posts(&ctx.client, query, sort, ctx.limit, &ctx.config.pagination).await?;
    ctx.write_export(&export)
}

pub async fn thread(ctx: &Context, target: &str) -> Result<()> {
    let uri = resolve_record_uri(ctx, target, POST_COLLECTION, "post").await?;
    ctx.output.info("thread:", &uri);
    let export =
        thread::fetch_thread(&ctx.client, &uri, &ThreadBuildOptions::default()).await?;
    ctx.write_export(&export)
}

pub async fn quotes(ctx: &Context, target: &str) -> Result<()> {
    let uri = resolve_record_uri(ctx, target, POST_COLLECTION, "post").await?;
    ctx.output.info("quotes of:", &uri);
    let export = quotes::fetch_quotes(&ctx.client, &uri, ctx.limit, &ctx.config.pagination).await?;
    if export.metadata.fallback_used {
        ctx.output
            .warning("quotes endpoint unavailable, results came from search fallback");
    }
    ctx.write_export(&export)
}

/// Turn user input (AT-URI, share URL) into the record URI `collection`
/// expects, resolving handles along the way.
async fn resolve_record_uri(
    ctx: &Context,
    target: &str,
    collection: &str,
    what: &str,
) -> Result<String> {
    let parsed = uri::parse_target(target)?;
    let (actor, rkey) = match parsed {
        BskyTarget::AtUri { uri } => return Ok(uri),
        BskyTarget::Post { actor, rkey } if collection == POST_COLLECTION => (actor, rkey),
        BskyTarget::Feed { actor, rkey } if collection == FEED_GENERATOR_COLLECTION => {
            (actor, rkey)
        }
        BskyTarget::List { actor, rkey } if collection == LIST_COLLECTION => (actor, rkey),
        BskyTarget::StarterPack { actor, rkey } if collection == STARTER_PACK_COLLECTION => {
            (actor, rkey)
        }
        _ => {
            return Err(SkeinError::invalid_input(format!(
                "{} is not a {} URL or AT-URI",
                target, what
            ))
            .into());
        }
    };
    Ok(uri::build_record_uri(&ctx.client, &actor, collection, &rkey).await)
}
