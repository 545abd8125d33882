//! Move children created under generated `child_<random>` ids to
//! address-as-id. A child that already owns a wallet moves to that
//! address; the others get a fresh wallet generated in-process. Credentials
//! follow, the old id is kept in `legacy_id`, and stored hashes keep
//! verifying.
//!
//! Usage: migrate-legacy-ids [--dry-run]
//!   --dry-run : list the children that would be migrated, change nothing
//!
//! Output is one `old id<TAB>new id<TAB>seed` line per child; the seed is
//! `-` when an existing wallet was reused. Seeds are printed exactly once.
//! Capture them for custody; they are not stored anywhere.

use std::time::Duration;

use clap::Parser;

use ngo_identity_api::{
    db::{self, PgRegistryStore, RegistryStore},
    models::child::AnchorNetwork,
    services::{
        children::ChildService,
        ledger::xrpl::{XrplConfig, XrplRpcGateway},
    },
};

#[derive(Parser)]
#[command(name = "migrate-legacy-ids", about = "Re-key legacy child ids to ledger addresses")]
struct Args {
    /// Only list legacy ids
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    let pool = db::create_pool(&database_url, 2).await?;
    db::run_migrations(&pool).await?;
    let store = PgRegistryStore::new(pool);

    let legacy = store.legacy_child_ids().await?;
    tracing::info!("{} children carry a legacy id", legacy.len());
    if args.dry_run {
        for id in &legacy {
            println!("{id}");
        }
        return Ok(());
    }
    if legacy.is_empty() {
        return Ok(());
    }

    let network: AnchorNetwork = std::env::var("XRPL_NETWORK")
        .unwrap_or_else(|_| "testnet".into())
        .parse()?;
    let gateway = XrplRpcGateway::new(XrplConfig {
        rpc_url: std::env::var("XRPL_RPC_URL")
            .unwrap_or_else(|_| "https://s.altnet.rippletest.net:51234".into()),
        network,
        poll_interval: Duration::from_secs(1),
        max_polls: 1,
    });

    let mut migrated = 0usize;
    for old_id in legacy {
        match ChildService::migrate_legacy(&store, &gateway, &old_id).await {
            Ok(Some(rekey)) => {
                migrated += 1;
                let seed = rekey.seed.as_ref().map_or("-", |seed| seed.expose());
                println!("{}\t{}\t{}", rekey.old_id, rekey.new_id, seed);
            }
            Ok(None) => tracing::warn!("Child {} disappeared before migration", old_id),
            Err(e) => tracing::error!("Error migrating {}: {}", old_id, e),
        }
    }

    tracing::info!("Migrated {} children", migrated);
    Ok(())
}
