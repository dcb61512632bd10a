//! Cartsync CLI - a shopping cart in the terminal.
//!
//! The cart is saved locally between runs. When `CART_BACKEND_URL` is set,
//! commands run with `--user` also keep the user's saved cart on the server
//! in sync.
//!
//! # Usage
//!
//! ```bash
//! # Add two medium red tees at $19.99 as a guest
//! cartsync add tee --size M --color Red --quantity 2 --price 19.99
//!
//! # Add a product priced from the catalog
//! cartsync --user u_123 add mug
//!
//! # Sign in and reconcile with the saved cart
//! cartsync login u_123
//!
//! # Show the cart as JSON
//! cartsync show --json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::{self, Write};

use cartsync_client::CartConfig;
use cartsync_core::{ProductId, UserId, VariantKey};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod context;
mod error;
mod output;

use commands::cart::AddRequest;
use context::Context;
use error::CliError;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Shopping cart with local persistence and account sync")]
struct Cli {
    /// Signed-in user; omit to act as a guest
    #[arg(short, long, global = true, env = "CART_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart
    Show {
        /// Print the cart as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product to the cart
    Add {
        /// Product ID
        product: String,

        #[command(flatten)]
        variant: VariantArgs,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Unit price; looked up in the catalog when omitted
        #[arg(short, long)]
        price: Option<Decimal>,

        /// Display title
        #[arg(short, long)]
        title: Option<String>,

        /// Thumbnail URL
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// Remove a product (every variant unless --size or --color is given)
    Remove {
        /// Product ID
        product: String,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Set the quantity of a line; zero or less removes it
    Update {
        /// Product ID
        product: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Empty the cart
    Clear,
    /// Sign in and reconcile with the saved cart
    Login {
        /// User ID
        user: String,
    },
    /// Print the order summary and empty the cart
    Checkout,
}

#[derive(Args)]
struct VariantArgs {
    /// Variant size
    #[arg(short, long)]
    size: Option<String>,

    /// Variant color
    #[arg(short, long)]
    color: Option<String>,
}

impl VariantArgs {
    fn key(&self) -> VariantKey {
        VariantKey::new(self.size.as_deref(), self.color.as_deref())
    }

    /// `None` when neither option was given.
    fn key_if_given(&self) -> Option<VariantKey> {
        Some(self.key()).filter(|key| !key.is_default())
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
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

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = CartConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays clean on stdout
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync_client=warn,cartsync_cli=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        sentry::capture_error(&e);
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), CliError> {
    let ctx = Context::open(config, cli.user.map(UserId::new))?;
    let mut out = io::stdout().lock();

    let result = dispatch(&ctx, &mut out, cli.command).await;
    out.flush()?;
    ctx.finish().await;
    result
}

async fn dispatch(ctx: &Context, out: &mut impl Write, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Show { json } => commands::cart::show(ctx, out, json),
        Commands::Add {
            product,
            variant,
            quantity,
            price,
            title,
            thumbnail,
        } => {
            let request = AddRequest {
                product_id: ProductId::new(product),
                variant: variant.key(),
                quantity,
                price,
                title,
                thumbnail,
            };
            commands::cart::add(ctx, out, request).await
        }
        Commands::Remove { product, variant } => commands::cart::remove(
            ctx,
            out,
            &ProductId::new(product),
            variant.key_if_given().as_ref(),
        ),
        Commands::Update {
            product,
            quantity,
            variant,
        } => commands::cart::update(ctx, out, &ProductId::new(product), &variant.key(), quantity),
        Commands::Clear => commands::cart::clear(ctx, out).await,
        Commands::Login { user } => commands::session::login(ctx, out, UserId::new(user)).await,
        Commands::Checkout => commands::cart::checkout(ctx, out).await,
    }
}
