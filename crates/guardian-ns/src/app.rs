use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use guardian_ns_api::ApiServer;
use guardian_ns_db::SqliteDb;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinSet;

use crate::handler::QueryHandler;
use crate::targets::{
    import_targets_file, read_checksum, write_checksum, SqliteTargetRepository, TargetLoader, TargetRepository,
    TARGETS_CHECKSUM_FILE,
};
use crate::throttle_logger::{ThrottleLogger, ThrottleSink};
use crate::{Args, DnsServer, Reloader};

pub struct App;

impl App {
    pub async fn run_until_completion(args: Args) -> anyhow::Result<()> {
        let dns_bind_addr = SocketAddr::new(args.host, args.port);
        let policy = args.rate_limit_policy()?;
        let data_dir = args.data_dir()?;

        let sqlite_db = SqliteDb::new(&data_dir)
            .await
            .context("failed to establish an SQLite DB connection")?;

        sqlite_db
            .init_tables()
            .await
            .context("failed to initialize DB tables")?;

        if let Some(path) = args.targets_path.as_ref() {
            App::import_targets(&sqlite_db, path, &data_dir).await?;
        }

        let loader = Arc::new(TargetLoader::new(SqliteTargetRepository::new(sqlite_db.clone())));
        let entries = loader.reload().await.context("failed to load the initial targets")?;
        tracing::info!("Loaded {} targets", entries);

        // Channel for throttle logs
        let (log_tx, log_rx) = unbounded_channel();
        let throttle_logger = ThrottleLogger::new(log_rx, sqlite_db.clone());

        let handler = Arc::new(QueryHandler::new(policy, loader.clone(), log_tx));

        let (command_tx, command_rx) = tokio::sync::mpsc::channel(10);
        let reloader = Reloader::new(loader, command_rx, args.reload_interval());

        let mut server = DnsServer::new(dns_bind_addr, handler.clone())
            .await
            .context("failed to instantiate the DNS server")?;
        tracing::info!(addr = %dns_bind_addr, "Listening for DNS queries");

        let mut tasks = JoinSet::new();
        server.add_workers(args.max_parallel_connections as usize);
        tasks.spawn(server.block_until_completion());
        tasks.spawn(throttle_logger.watch_for_logs());
        tasks.spawn(reloader.watch_for_triggers());
        tasks.spawn(evict_idle_clients(handler, args.client_sweep_interval()));
        if !args.disable_api_server {
            let api_server_bind_addr = SocketAddr::new(args.host, args.api_server_port);
            let api_server = ApiServer::new(sqlite_db, command_tx);
            tasks.spawn(api_server.serve(api_server_bind_addr));
        } else {
            drop(command_tx);
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result.context("failed to execute a task")? {
                tracing::error!("Error: {:#}", e);
            }
        }

        Ok(())
    }

    async fn import_targets(sqlite_db: &SqliteDb, path: &Path, data_dir: &Path) -> anyhow::Result<()> {
        let checksum_path = data_dir.join(TARGETS_CHECKSUM_FILE);
        // Read the previous checksum (if present)
        let checksum = read_checksum(&checksum_path)
            .await
            .context("failed to read targets checksum")?;

        let mut txn = sqlite_db.begin_transaction().await?;
        let updated_checksum = import_targets_file(path, &mut txn, checksum)
            .await
            .context("error while importing the targets file")?;
        txn.commit()
            .await
            .context("failed to commit targets from the targets file")?;

        if let Some(updated_checksum) = updated_checksum {
            write_checksum(&checksum_path, &updated_checksum)
                .await
                .context("failed to write the updated targets checksum")?;
        }

        Ok(())
    }
}

async fn evict_idle_clients<R, S>(handler: Arc<QueryHandler<R, S>>, period: Duration) -> anyhow::Result<()>
where
    R: TargetRepository,
    S: ThrottleSink,
{
    let mut sweep_interval = tokio::time::interval(period);
    loop {
        sweep_interval.tick().await;
        let evicted = handler.evict_idle_clients();
        if evicted > 0 {
            tracing::trace!("Evicted {} idle clients, {} left", evicted, handler.client_count());
        }
    }
}
