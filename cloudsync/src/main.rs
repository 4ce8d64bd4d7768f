//! cloudsync: mirrors one cloud account's inventory into the local store.
//!
//! Every pass reconciles all resource types of the selected vendor
//! concurrently. With `--interval 0` a single pass runs and its failures
//! set the exit status; otherwise failed types are retried on the next pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use cloudsync::resources::firewall_rule::GcpFirewallRuleSync;
use cloudsync::resources::region::AwsRegionSync;
use cloudsync::resources::security_group::AzureSecurityGroupSync;
use cloudsync::{
    Audited, InventoryAdaptor, Reconcile, Reconciler, Store, SyncConfig, SyncResource, SyncScope,
    Vendor,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cloud inventory reconciler
#[derive(Parser, Debug)]
#[command(name = "cloudsync", version, about)]
struct Args {
    /// Directory holding metadata.db
    #[arg(long, default_value = "/var/lib/cloudsync")]
    data_dir: PathBuf,

    /// JSON cloud inventory to reconcile from
    #[arg(long)]
    inventory: PathBuf,

    #[arg(long, value_enum)]
    vendor: Vendor,

    /// Account (or subscription, or project) id
    #[arg(long)]
    account: String,

    /// Narrow regional resource types to one region; account-wide types
    /// ignore it
    #[arg(long)]
    region: Option<String>,

    /// Seconds between passes; 0 runs a single pass
    #[arg(long, default_value = "0")]
    interval: u64,

    /// Most rows written by one store call
    #[arg(
        long,
        default_value_t = cloudsync::config::DEFAULT_MAX_BATCH,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=500)
    )]
    max_batch: usize,

    /// Rows per page when reading the store
    #[arg(
        long,
        default_value_t = cloudsync::config::DEFAULT_PAGE_SIZE,
        value_parser = clap::value_parser!(u32).range(1..=500)
    )]
    page_size: u32,
}

fn reconciler<R: SyncResource>(
    store: &Store,
    inventory: &Path,
    config: &SyncConfig,
) -> Result<Box<dyn Reconcile>>
where
    R::Cloud: serde::de::DeserializeOwned,
{
    let adaptor = Arc::new(InventoryAdaptor::<R::Cloud>::new(inventory, R::NAME));
    let dao = Arc::new(store.dao::<R>()?);
    let reconciler = Reconciler::<R>::new(adaptor, dao, config.clone())?;
    Ok(Box::new(Audited::new(reconciler)))
}

fn reconcilers(
    vendor: Vendor,
    store: &Store,
    inventory: &Path,
    config: &SyncConfig,
) -> Result<Vec<Box<dyn Reconcile>>> {
    let reconcilers = match vendor {
        Vendor::Aws => vec![reconciler::<AwsRegionSync>(store, inventory, config)?],
        Vendor::Azure => vec![reconciler::<AzureSecurityGroupSync>(
            store, inventory, config,
        )?],
        Vendor::Gcp => vec![reconciler::<GcpFirewallRuleSync>(store, inventory, config)?],
        Vendor::TCloud => bail!("no resource types are reconciled for vendor {}", vendor),
    };
    Ok(reconcilers)
}

/// One pass over every reconciler. Returns the number that failed; each
/// failure has already been logged.
async fn run_pass(reconcilers: &[Box<dyn Reconcile>], scope: &SyncScope) -> usize {
    let results =
        futures::future::join_all(reconcilers.iter().map(|r| r.reconcile(scope))).await;
    results.iter().filter(|r| r.is_err()).count()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudsync=info,cloudsync_dal=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = SyncConfig {
        max_batch: args.max_batch,
        page_size: args.page_size,
    };
    config.validate()?;

    let mut scope = SyncScope::new(args.vendor, args.account);
    if let Some(region) = args.region {
        scope = scope.with_region(region);
    }
    scope.validate()?;

    tokio::fs::create_dir_all(&args.data_dir).await?;
    let store = Store::new(&args.data_dir).await?;
    let reconcilers = reconcilers(args.vendor, &store, &args.inventory, &config)?;

    info!("Starting cloudsync for {}", scope);
    info!("Data directory: {}", args.data_dir.display());

    if args.interval == 0 {
        let failed = run_pass(&reconcilers, &scope).await;
        if failed > 0 {
            bail!("{} of {} resource types failed", failed, reconcilers.len());
        }
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let failed = run_pass(&reconcilers, &scope).await;
                if failed > 0 {
                    error!("{} resource types failed, retrying in {}s", failed, args.interval);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
