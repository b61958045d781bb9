//! Catalog Browser CLI
//!
//! Drives the catalog core from the command line and prints results as JSON.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog_browser::catalog::ListQuery;
use catalog_browser::{CatalogConfig, CatalogContext};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Processed overview page for raw `key=value` query pairs
    Overview { pairs: Vec<(String, String)> },
    /// One item from the overview collection
    Item { id: String },
    /// Detail record with a window of enriched assets
    Detail {
        id: String,
        page: Option<usize>,
        lookahead: Option<usize>,
    },
    /// Rebuild the overview cache
    Refresh,
    /// Rebuild one detail cache entry
    RefreshDetail { id: String },
    /// Remove every cache entry
    ClearCache,
    /// List comments of a detail page
    Messages { id: String, limit: i64 },
    /// Post a comment on a detail page
    PostMessage { id: String, text: String },
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"Catalog Browser - browse a remote collection through a local JSON cache

USAGE:
    catalog-browser overview [key=value ...]
    catalog-browser item <id>
    catalog-browser detail <id> [page] [lookahead]
    catalog-browser refresh
    catalog-browser refresh-detail <id>
    catalog-browser clear-cache
    catalog-browser messages <id> [limit]
    catalog-browser post-message <id> <text>
    catalog-browser help

COMMANDS:
    overview        Search, filter, sort and paginate the collection
    item            Show one item of the collection
    detail          Show a detail record, enriching assets page..page+lookahead
    refresh         Drop and rebuild the overview cache
    refresh-detail  Drop and rebuild one detail cache entry
    clear-cache     Remove every cached entry
    messages        List comments for a detail page (limit -1 = all)
    post-message    Post a comment for a detail page
    help            Show this help message

EXAMPLES:
    catalog-browser overview search=kaart jaar=1690,1700 sortBy=jaar sortOrder=desc page=2
    catalog-browser overview "auteur=Blaeu, J." plaats_van_uitgave=Amsterdam
    catalog-browser detail 42 3

ENVIRONMENT:
    CATALOG_CACHE_DIR             Cache directory
    CATALOG_CACHE_EXPIRY_SECS     Cache lifetime in seconds (default 3600)
    CATALOG_API_URL               Collection API base URL
    CATALOG_MESSAGES_URL          Comment API base URL
    CATALOG_MESSAGE_AUTHOR        Author tag for comments
    CATALOG_REQUEST_TIMEOUT_SECS  Per-request timeout (default 30)
    CATALOG_DEFAULT_LIMIT         Overview page size (default 12)
    CATALOG_LOOKAHEAD             Detail assets enriched per view (default 5)
    RUST_LOG                      Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    let arg = |index: usize, usage: &str| -> Result<String> {
        args.get(index)
            .cloned()
            .ok_or_else(|| anyhow!("Usage: catalog-browser {}", usage))
    };

    match args[1].as_str() {
        "overview" => {
            let pairs = args[2..]
                .iter()
                .map(|pair| match pair.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (pair.clone(), String::new()),
                })
                .collect();
            Ok(Command::Overview { pairs })
        }
        "item" => Ok(Command::Item {
            id: arg(2, "item <id>")?,
        }),
        "detail" => {
            let id = arg(2, "detail <id> [page] [lookahead]")?;
            let page = parse_optional(args.get(3), "page")?;
            let lookahead = parse_optional(args.get(4), "lookahead")?;
            Ok(Command::Detail { id, page, lookahead })
        }
        "refresh" => Ok(Command::Refresh),
        "refresh-detail" => Ok(Command::RefreshDetail {
            id: arg(2, "refresh-detail <id>")?,
        }),
        "clear-cache" => Ok(Command::ClearCache),
        "messages" => {
            let id = arg(2, "messages <id> [limit]")?;
            let limit = parse_optional(args.get(3), "limit")?.unwrap_or(-1);
            Ok(Command::Messages { id, limit })
        }
        "post-message" => {
            if args.len() < 4 {
                return Err(anyhow!("Usage: catalog-browser post-message <id> <text>"));
            }
            Ok(Command::PostMessage {
                id: args[2].clone(),
                text: args[3..].join(" "),
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

fn parse_optional<T: std::str::FromStr>(value: Option<&String>, name: &str) -> Result<Option<T>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| anyhow!("Invalid {}: {}", name, v))
        })
        .transpose()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, stdout carries the JSON output)
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if let Command::Help = command {
        print_help();
        return Ok(());
    }

    let config = CatalogConfig::from_env();
    let ctx = Arc::new(CatalogContext::new(config).context("Failed to set up HTTP client")?);

    match command {
        Command::Overview { pairs } => {
            let query = ListQuery::default()
                .with_page(1, ctx.config.default_limit)
                .merge_pairs(pairs);
            let page = ctx
                .overview()
                .get_processed_data(&query)
                .await
                .context("Failed to load overview")?;
            print_json(&page)?;
        }
        Command::Item { id } => match ctx.overview().get_item_by_id(&id).await? {
            Some(item) => print_json(&item)?,
            None => {
                error!(id = %id, "Item not found");
                std::process::exit(1);
            }
        },
        Command::Detail {
            id,
            page,
            lookahead,
        } => {
            let item = ctx
                .detail(&id)
                .get_data_with_processed_assets(
                    page.unwrap_or(0),
                    lookahead.unwrap_or(ctx.config.default_lookahead),
                )
                .await
                .with_context(|| format!("Failed to load detail {}", id))?;
            print_json(&item)?;
        }
        Command::Refresh => {
            let items = ctx
                .overview()
                .refresh_cache()
                .await
                .context("Failed to refresh overview")?;
            info!(count = items.len(), "Overview cache refreshed");
        }
        Command::RefreshDetail { id } => {
            let item = ctx
                .detail(&id)
                .refresh_cache()
                .await
                .with_context(|| format!("Failed to refresh detail {}", id))?;
            print_json(&item)?;
        }
        Command::ClearCache => {
            ctx.cache.clear().await;
        }
        Command::Messages { id, limit } => {
            let messages = ctx
                .messages
                .get_messages(&id, limit)
                .await
                .context("Failed to load messages")?;
            print_json(&messages)?;
        }
        Command::PostMessage { id, text } => {
            let response = ctx
                .messages
                .post_message(&text, &id)
                .await
                .context("Failed to post message")?;
            print_json(&response)?;
        }
        Command::Help => print_help(),
    }

    Ok(())
}
