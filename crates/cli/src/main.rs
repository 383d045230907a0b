//! THEHUB CLI - cart and catalog from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the current cart
//! hub cart show
//!
//! # Add two units of product 7
//! hub cart add 7 -q 2
//!
//! # Browse the catalog
//! hub products list --category audio --limit 24
//!
//! # Place the order
//! hub cart checkout --address-id 3 --payment-method card
//! ```
//!
//! # Commands
//!
//! - `cart` - Show and edit the cart, check out
//! - `products` - List, show and find related products
//!
//! The cart id survives between invocations in `$THEHUB_STATE_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use thehub_storefront::config::BackendConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "hub")]
#[command(author, version, about = "THEHUB storefront client")]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the current cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set the quantity of a line
    Set {
        /// Cart line ID
        item: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Add one unit to a line
    Inc {
        /// Cart line ID
        item: String,
    },
    /// Remove one unit from a line
    Dec {
        /// Cart line ID
        item: String,
    },
    /// Remove a line
    Remove {
        /// Cart line ID
        item: String,
    },
    /// Remove every line
    Clear,
    /// Turn the cart into an order
    Checkout {
        /// Ordering user ID
        #[arg(long)]
        user_id: Option<String>,

        /// Shipping address ID
        #[arg(long)]
        address_id: Option<String>,

        /// Payment method (e.g. `card`, `pix`)
        #[arg(long)]
        payment_method: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        /// Category (`todas` or `all` for every category)
        #[arg(long)]
        category: Option<String>,

        /// Free-text search
        #[arg(long)]
        search: Option<String>,

        /// Page number
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,

        /// Sort key
        #[arg(long)]
        sort: Option<String>,

        /// Only featured (or only non-featured) products
        #[arg(long)]
        featured: Option<bool>,
    },
    /// Show one product
    Show {
        /// Product ID
        id: String,
    },
    /// Products related to a product
    Related {
        /// Product ID
        id: String,

        /// How many to return
        #[arg(short, default_value_t = thehub_storefront::catalog::DEFAULT_RELATED)]
        n: u32,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &BackendConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    if guard.is_enabled() {
        tracing::info!("Sentry initialized");
    }

    Some(guard)
}

/// Errors and warnings become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = BackendConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "thehub_storefront=info,thehub_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &BackendConfig) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::from_json_flag(cli.json);

    match cli.command {
        Commands::Cart { action } => {
            let store = commands::cart::open_store(config)?;
            match action {
                CartAction::Show => commands::cart::show(&store, format).await?,
                CartAction::Add { product, quantity } => {
                    commands::cart::add(&store, &product, quantity, format).await?;
                }
                CartAction::Set { item, quantity } => {
                    commands::cart::set(&store, &item, quantity, format).await?;
                }
                CartAction::Inc { item } => {
                    commands::cart::step(&store, &item, commands::cart::Step::Up, format).await?;
                }
                CartAction::Dec { item } => {
                    commands::cart::step(&store, &item, commands::cart::Step::Down, format).await?;
                }
                CartAction::Remove { item } => {
                    commands::cart::remove(&store, &item, format).await?;
                }
                CartAction::Clear => commands::cart::clear(&store, format).await?,
                CartAction::Checkout {
                    user_id,
                    address_id,
                    payment_method,
                } => {
                    commands::cart::checkout(&store, user_id, address_id, payment_method, format)
                        .await?;
                }
            }
        }
        Commands::Products { action } => {
            let catalog = commands::products::open_catalog(config)?;
            match action {
                ProductsAction::List {
                    category,
                    search,
                    page,
                    limit,
                    sort,
                    featured,
                } => {
                    let query = thehub_storefront::catalog::ProductQuery {
                        limit,
                        page,
                        sort,
                        category,
                        search,
                        featured,
                    };
                    commands::products::list(&catalog, &query, format).await?;
                }
                ProductsAction::Show { id } => {
                    commands::products::show(&catalog, &id, format).await?;
                }
                ProductsAction::Related { id, n } => {
                    commands::products::related(&catalog, &id, n, format).await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_quantity_reaches_validation() {
        let cli = Cli::try_parse_from(["hub", "cart", "set", "41", "-1"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Cart {
                action: CartAction::Set { quantity: -1, .. }
            })
        ));
    }

    #[test]
    fn test_add_defaults_to_one_unit() {
        let cli = Cli::try_parse_from(["hub", "--json", "cart", "add", "7"]);
        let Ok(cli) = cli else {
            panic!("parse failed");
        };
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Cart {
                action: CartAction::Add { quantity: 1, .. }
            }
        ));
    }
}
