use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pos_checkout::application::checkout::{Checkout, ConfirmationOutcome};
use pos_checkout::application::history::OrderHistory;
use pos_checkout::application::reconciler::Reconciler;
use pos_checkout::config::{
    CheckoutConfig, DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_STORE_TIMEOUT,
};
use pos_checkout::domain::catalog::Catalog;
use pos_checkout::domain::ports::{OrderStoreBox, PendingPaymentStoreBox};
use pos_checkout::error::{self as pos, PosError};
use pos_checkout::infrastructure::gateway::{SimulatedGateway, SimulatedOutcome};
use pos_checkout::infrastructure::in_memory::{
    InMemoryCatalog, InMemoryOrderStore, InMemoryPendingPaymentStore,
};
use pos_checkout::infrastructure::notifications::BroadcastNotificationChannel;
#[cfg(feature = "storage-rocksdb")]
use pos_checkout::infrastructure::rocksdb::RocksDBStore;
use pos_checkout::interfaces::csv::catalog_reader::CatalogReader;
use pos_checkout::interfaces::csv::order_writer::OrderWriter;
use pos_checkout::interfaces::csv::script_reader::{ScriptReader, SessionCommand};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Replays a point-of-sale session against a menu", long_about = None)]
struct Cli {
    /// Menu CSV file (id, name, price)
    catalog: PathBuf,

    /// Session script CSV file (command, item, value)
    script: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "POS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Simulated customer response to STK pushes: success, failure, silent or reject
    #[arg(long, env = "POS_MPESA_OUTCOME", default_value = "success")]
    mpesa_outcome: SimulatedOutcome,

    #[arg(long, env = "POS_GATEWAY_TIMEOUT_SECS", default_value_t = DEFAULT_GATEWAY_TIMEOUT.as_secs())]
    gateway_timeout_secs: u64,

    #[arg(long, env = "POS_STORE_TIMEOUT_SECS", default_value_t = DEFAULT_STORE_TIMEOUT.as_secs())]
    store_timeout_secs: u64,

    #[arg(long, env = "POS_CONFIRMATION_TIMEOUT_SECS", default_value_t = DEFAULT_CONFIRMATION_TIMEOUT.as_secs())]
    confirmation_timeout_secs: u64,

    /// Pending payments older than this are reported as orphans
    #[arg(long, env = "POS_ORPHAN_AGE_SECS", default_value_t = 900)]
    orphan_age_secs: i64,
}

fn open_stores(db_path: Option<PathBuf>) -> pos::Result<(OrderStoreBox, PendingPaymentStoreBox)> {
    #[cfg(feature = "storage-rocksdb")]
    {
        if let Some(path) = db_path {
            let store = RocksDBStore::open(path)?;
            return Ok((Arc::new(store.clone()), Arc::new(store)));
        }
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    {
        if db_path.is_some() {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
    }

    Ok((
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryPendingPaymentStore::new()),
    ))
}

async fn run_command(
    command: SessionCommand,
    catalog: &dyn Catalog,
    checkout: &mut Checkout,
    history: &mut OrderHistory,
) -> pos::Result<()> {
    match command {
        SessionCommand::Add { item } => {
            let entry = catalog
                .get(&item)
                .ok_or_else(|| PosError::InvalidCommand(format!("unknown item '{item}'")))?;
            checkout.cart_mut().add_item(&entry);
        }
        SessionCommand::SetQuantity { item, quantity } => {
            checkout.cart_mut().update_quantity(&item, quantity);
        }
        SessionCommand::Clear => checkout.cart_mut().clear(),
        SessionCommand::PayCash { cash_received } => {
            let completion = checkout.pay_cash(cash_received).await?;
            tracing::info!("{completion}");
            history.record(completion.order);
        }
        SessionCommand::PayMpesa { phone } => {
            checkout.initiate_mpesa(&phone).await?;
            match checkout.await_confirmation().await? {
                ConfirmationOutcome::Completed(completion) => {
                    tracing::info!("{completion}");
                    history.record(completion.order);
                }
                ConfirmationOutcome::Failed { description, .. } => {
                    return Err(PosError::PaymentFailed(description));
                }
                ConfirmationOutcome::TimedOut { correlation_id } => {
                    return Err(PosError::PaymentFailed(format!(
                        "no confirmation received for {correlation_id}"
                    )));
                }
                ConfirmationOutcome::Duplicate { .. } | ConfirmationOutcome::Ignored => {}
            }
        }
        SessionCommand::ClearHistory => history.clear().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let config = CheckoutConfig::from_secs(
        cli.gateway_timeout_secs,
        cli.store_timeout_secs,
        cli.confirmation_timeout_secs,
    );
    let (orders, pending) = open_stores(cli.db_path)?;

    // Load the menu
    let mut items = Vec::new();
    let file = File::open(&cli.catalog).into_diagnostic()?;
    for item in CatalogReader::new(file).items() {
        match item {
            Ok(item) => items.push(item),
            Err(e) => tracing::error!("Error reading catalog item: {e}"),
        }
    }
    let catalog = InMemoryCatalog::new(items);

    let channel = BroadcastNotificationChannel::new();
    let gateway = SimulatedGateway::new(channel.clone(), cli.mpesa_outcome);
    let mut checkout = Checkout::new(
        orders.clone(),
        pending.clone(),
        Arc::new(gateway),
        Arc::new(channel),
        config,
    );
    let mut history = OrderHistory::new(orders.clone(), config.store_timeout);

    // Replay the session
    let file = File::open(&cli.script).into_diagnostic()?;
    for command in ScriptReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = run_command(command, &catalog, &mut checkout, &mut history).await {
                    tracing::error!("Error processing command: {e}");
                }
            }
            Err(e) => tracing::error!("Error reading command: {e}"),
        }
    }

    let reconciler = Reconciler::new(orders, pending, config);
    let orphans = reconciler
        .stale_pending(Utc::now(), chrono::Duration::seconds(cli.orphan_age_secs))
        .await?;
    if !orphans.is_empty() {
        tracing::warn!(count = orphans.len(), "pending payments need manual reconciliation");
    }

    let view = history.load().await;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(view.into_orders())?;

    Ok(())
}
