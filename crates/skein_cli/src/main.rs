mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use skein_core::{PostFilter, SkeinConfig, XrpcClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Anonymized Bluesky post collection and thread reconstruction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// How many posts to collect (overrides config)
    #[arg(long, short = 'l', global = true)]
    limit: Option<usize>,

    /// Write the JSON export to this file instead of stdout
    #[arg(long, short = 'o', global = true)]
    output: Option<PathBuf>,

    /// AppView service URL override
    #[arg(long, global = true)]
    service: Option<String>,

    /// Log in as this handle or DID before fetching (app password read
    /// from SKEIN_APP_PASSWORD or prompted)
    #[arg(long, global = true)]
    identifier: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect an actor's own posts
    Profile {
        /// Handle, DID, or profile URL
        actor: String,

        /// Include original posts and thread continuations
        #[arg(long)]
        posts: bool,

        /// Include reposts
        #[arg(long)]
        reposts: bool,

        /// Include quote posts
        #[arg(long)]
        quotes: bool,
    },
    /// Collect a feed generator's output
    Feed {
        /// Feed AT-URI or bsky.app feed URL
        target: String,
    },
    /// Collect a list feed
    List {
        /// List AT-URI or bsky.app list URL
        target: String,
    },
    /// Collect recent posts from a starter pack's member sample
    StarterPack {
        /// Starter pack AT-URI or share URL
        target: String,
    },
    /// Full-text post search
    Search {
        /// Search query
        query: String,

        /// Result ordering (latest, top)
        #[arg(long, default_value = "latest")]
        sort: String,
    },
    /// Rebuild a post's reply tree
    Thread {
        /// Post AT-URI or bsky.app post URL
        target: String,
    },
    /// Find posts quoting a post
    Quotes {
        /// Post AT-URI or bsky.app post URL
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_panic_hook();
    let cli = Cli::parse();

    let env_filter = if cli.debug {
        EnvFilter::new("skein_core=debug,skein_cli=debug,info")
    } else {
        EnvFilter::new("skein_core=info,skein_cli=info,warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = SkeinConfig::load(cli.config.as_deref())?;

    let out = output::Output::new();
    let client = build_client(&cli, &config, &out).await?;

    let ctx = commands::Context {
        client,
        limit: cli.limit.unwrap_or(config.defaults.limit),
        config,
        destination: cli.output.clone(),
        output: out,
    };

    match &cli.command {
        Commands::Profile {
            actor,
            posts,
            reposts,
            quotes,
        } => {
            // No flags means everything selectable
            let filter = if !posts && !reposts && !quotes {
                PostFilter::default()
            } else {
                PostFilter {
                    posts: *posts,
                    reposts: *reposts,
                    quotes: *quotes,
                }
            };
            commands::profile(&ctx, actor, filter).await?;
        }
        Commands::Feed { target } => commands::custom_feed(&ctx, target).await?,
        Commands::List { target } => commands::list_feed(&ctx, target).await?,
        Commands::StarterPack { target } => commands::starter_pack(&ctx, target).await?,
        Commands::Search { query, sort } => commands::search(&ctx, query, sort).await?,
        Commands::Thread { target } => commands::thread(&ctx, target).await?,
        Commands::Quotes { target } => commands::quotes(&ctx, target).await?,
    }

    Ok(())
}

/// Public AppView client by default; authenticated PDS client when an
/// identifier was given.
async fn build_client(cli: &Cli, config: &SkeinConfig, out: &output::Output) -> Result<XrpcClient> {
    let Some(identifier) = &cli.identifier else {
        let service = cli.service.as_deref().unwrap_or(&config.service.appview);
        return Ok(XrpcClient::new(service)?);
    };

    let password = match std::env::var("SKEIN_APP_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password(format!("App password for {}: ", identifier))
            .into_diagnostic()?,
    };

    let service = cli.service.as_deref().unwrap_or(&config.service.pds);
    let mut client = XrpcClient::new(service)?;
    let handle = client.login(identifier, &password).await?.handle.clone();
    info!("logged in as {}", handle);
    out.success(&format!("authenticated as {}", handle));
    Ok(client)
}
