//! Atelier CLI - Cart and wishlist client.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! atelier cart list
//!
//! # Add two units of a product in size M
//! atelier cart add prod_123 --quantity 2 --size M --name "Linen shirt" --price 89.00
//!
//! # Save a product for later, then move it to the cart
//! atelier wishlist toggle prod_456
//! atelier wishlist move-to-cart prod_456
//!
//! # Work against the local store only
//! atelier --offline wishlist list
//! ```
//!
//! # Environment Variables
//!
//! See `atelier_commerce::config`. `ATELIER_API_TOKEN` is required unless
//! `--offline` is passed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use atelier_commerce::{
    CommerceConfig, CommerceState, FileStore, HttpGateway, KeyValueStore, SessionSignal,
};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier cart and wishlist client")]
struct Cli {
    /// Use the local store only; nothing is sent to the backend
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show every line
    List,
    /// Add units of a product
    Add {
        /// Product identifier
        id: String,

        #[command(flatten)]
        line: LineArgs,
    },
    /// Remove a line
    Remove {
        /// Product identifier
        id: String,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Replace the quantity of a line (0 or less removes it)
    SetQuantity {
        /// Product identifier
        id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Remove every line
    Clear,
    /// Show the cart total and item count
    Total,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Show every saved product
    List,
    /// Save a product
    Add {
        /// Product identifier
        id: String,
    },
    /// Forget a product
    Remove {
        /// Product identifier
        id: String,
    },
    /// Save the product if absent, forget it if present
    Toggle {
        /// Product identifier
        id: String,
    },
    /// Add the product to the cart, then forget it
    MoveToCart {
        /// Product identifier
        id: String,

        #[command(flatten)]
        line: LineArgs,
    },
    /// Forget every product
    Clear,
    /// Show the number of saved products
    Total,
}

/// Size and color of a cart line.
#[derive(Args)]
struct VariantArgs {
    /// Selected size
    #[arg(short, long)]
    size: Option<String>,

    /// Selected color
    #[arg(short, long)]
    color: Option<String>,
}

/// Cart line input.
#[derive(Args)]
struct LineArgs {
    /// Units to add
    #[arg(short, long, default_value_t = 1)]
    quantity: u32,

    #[command(flatten)]
    variant: VariantArgs,

    /// Product name, kept for offline display
    #[arg(long)]
    name: Option<String>,

    /// Unit price (e.g. 49.90), kept for offline display
    #[arg(long)]
    price: Option<String>,

    /// ISO 4217 currency of the price
    #[arg(long, default_value = "USD")]
    currency: String,
}

fn init_sentry(config: &CommerceConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed for Sentry, which must start before tracing
    let config = CommerceConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_commerce=info,atelier_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: CommerceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.store_dir));
    let state = CommerceState::new(store, gateway, SessionSignal::new(false));

    if cli.offline {
        state.cart().force_local();
        state.wishlist().force_local();
    } else if !state.gateway().has_credential() {
        return Err(CliError::NoSession.into());
    }
    state.start_session(None).await;

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(state.cart()),
            CartAction::Add { id, line } => {
                commands::cart::add(state.cart(), &id, line.into_attributes()?).await?;
            }
            CartAction::Remove { id, variant } => {
                commands::cart::remove(state.cart(), &id, variant.size, variant.color).await?;
            }
            CartAction::SetQuantity {
                id,
                quantity,
                variant,
            } => {
                commands::cart::set_quantity(
                    state.cart(),
                    &id,
                    quantity,
                    variant.size,
                    variant.color,
                )
                .await?;
            }
            CartAction::Clear => commands::cart::clear(state.cart()).await?,
            CartAction::Total => commands::cart::total(state.cart()),
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(state.wishlist()),
            WishlistAction::Add { id } => commands::wishlist::add(state.wishlist(), &id).await?,
            WishlistAction::Remove { id } => {
                commands::wishlist::remove(state.wishlist(), &id).await?;
            }
            WishlistAction::Toggle { id } => {
                commands::wishlist::toggle(state.wishlist(), &id).await?;
            }
            WishlistAction::MoveToCart { id, line } => {
                commands::wishlist::move_to_cart(&state, &id, line.into_attributes()?).await?;
            }
            WishlistAction::Clear => commands::wishlist::clear(state.wishlist()).await?,
            WishlistAction::Total => commands::wishlist::total(state.wishlist()),
        },
    }
    Ok(())
}

impl LineArgs {
    fn into_attributes(self) -> Result<atelier_commerce::CartAttributes, CliError> {
        commands::cart::attributes(
            self.quantity,
            self.variant.size,
            self.variant.color,
            self.name,
            self.price.as_deref(),
            &self.currency,
        )
    }
}
