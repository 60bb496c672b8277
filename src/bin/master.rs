//! Master binary

use clap::{Parser, Subcommand};
use regionmeta::{
    common::{parse_duration, Config},
    master::{MemMetaStore, MetaRegion, MetaStore, ServerAddress},
    Master,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "regionmeta-master")]
#[command(about = "regionmeta master: records region locations in meta")]
#[command(version = regionmeta::BUILD_INFO)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the master
    Serve {
        /// Config file (defaults to ./regionmeta.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bind address for the admin API
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Event worker count
        #[arg(long)]
        workers: Option<usize>,

        /// Meta regions that must be online before the initial scan completes
        #[arg(long)]
        expected_meta_regions: Option<usize>,

        /// Delay before a deferred event is retried (e.g. "500ms", "2s")
        #[arg(long, value_parser = parse_duration)]
        requeue_delay: Option<Duration>,

        /// Server hosting the root region
        #[arg(long)]
        root: Option<ServerAddress>,

        /// Keep meta rows in a RocksDB directory instead of memory
        #[cfg(feature = "rocksdb")]
        #[arg(long)]
        meta_db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            workers,
            expected_meta_regions,
            requeue_delay,
            root,
            #[cfg(feature = "rocksdb")]
            meta_db,
        } => {
            let config = Config::load(config.as_deref())?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            // CLI arguments take priority over the file and environment
            let mut master_config = config.master;
            if let Some(bind) = bind {
                master_config.bind_addr = bind;
            }
            if let Some(workers) = workers {
                master_config.workers = workers;
            }
            if let Some(expected) = expected_meta_regions {
                master_config.expected_meta_regions = expected;
            }
            if let Some(delay) = requeue_delay {
                master_config.set_requeue_delay(delay)?;
            }
            master_config.validate()?;

            let store: Arc<dyn MetaStore> = Arc::new(MemMetaStore::new());
            #[cfg(feature = "rocksdb")]
            let store: Arc<dyn MetaStore> = match meta_db {
                Some(path) => Arc::new(regionmeta::master::RocksMetaStore::open(path)?),
                None => store,
            };

            let (master, events) = Master::new(master_config, store);
            if let Some(root) = root {
                master.set_root_region(MetaRegion::root(root));
            }
            master.serve(events).await?;
        }
    }

    Ok(())
}
