use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use guardian_ns_common::ServerCommand;
use tokio::sync::mpsc::Receiver;
use tokio::time::{interval_at, Instant, Interval};

use crate::targets::{TargetLoader, TargetRepository};

/// Owns every trigger that reloads the target table
pub struct Reloader<R> {
    loader: Arc<TargetLoader<R>>,
    command_rx: Receiver<ServerCommand>,
    reload_interval: Option<Duration>,
}

impl<R: TargetRepository> Reloader<R> {
    pub fn new(loader: Arc<TargetLoader<R>>, command_rx: Receiver<ServerCommand>, reload_interval: Option<Duration>) -> Self {
        Reloader {
            loader,
            command_rx,
            reload_interval,
        }
    }

    pub async fn watch_for_triggers(mut self) -> anyhow::Result<()> {
        let mut hangup = Hangup::new()?;
        let mut ticker = self
            .reload_interval
            .filter(|period| !period.is_zero())
            .map(|period| interval_at(Instant::now() + period, period));
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = self.command_rx.recv(), if commands_open => {
                    match command {
                        Some(ServerCommand::ReloadTargets(reply_tx)) => {
                            let result = self.reload("command").await;
                            // The requester may have given up waiting
                            let _ = reply_tx.send(result);
                        }
                        None => {
                            tracing::debug!("command channel was closed");
                            commands_open = false;
                        }
                    }
                }
                _ = hangup.recv() => {
                    let _ = self.reload("SIGHUP").await;
                }
                _ = next_tick(&mut ticker) => {
                    let _ = self.reload("interval").await;
                }
            }
        }
    }

    async fn reload(&self, trigger: &'static str) -> anyhow::Result<usize> {
        match self.loader.reload().await {
            Ok(entries) => {
                tracing::info!(%trigger, "Reloaded {} targets", entries);
                Ok(entries)
            }
            Err(e) => {
                tracing::warn!(%trigger, "Failed to reload targets, keeping the previous table: {:#}", e);
                Err(e)
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> anyhow::Result<Self> {
        use anyhow::Context as _;
        use tokio::signal::unix::{signal, SignalKind};

        signal(SignalKind::hangup())
            .map(Hangup)
            .context("failed to register a SIGHUP handler")
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            pending().await
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> anyhow::Result<Self> {
        Ok(Hangup)
    }

    async fn recv(&mut self) {
        pending().await
    }
}
