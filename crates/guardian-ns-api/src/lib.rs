mod handlers;
mod routes;
mod util;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use guardian_ns_common::ServerCommand;
use guardian_ns_db::SqliteDb;
use routes::get_router;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;

pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    pub fn new(db: SqliteDb, command_tx: Sender<ServerCommand>) -> Self {
        let state = ApiState { db, command_tx };
        let router = get_router(state);

        ApiServer { router }
    }

    pub async fn serve(self, listen_on: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_on)
            .await
            .context("failed to bind a listener")?;

        tracing::info!(addr = %listen_on, "Serving the API");

        axum::serve(listener, self.router)
            .await
            .context("error while serving requests")
    }
}

struct ApiState {
    db: SqliteDb,
    command_tx: Sender<ServerCommand>,
}

impl ApiState {
    /// Asks the DNS server to reload its targets and waits for the outcome
    async fn reload_targets(&self) -> anyhow::Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(ServerCommand::ReloadTargets(reply_tx))
            .await
            .context("DNS server is not accepting commands")?;

        reply_rx
            .await
            .context("DNS server dropped the reload request")?
    }
}
