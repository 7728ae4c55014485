// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use arena_net::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    net::{Request, Router, Server},
    state::MemoryStore,
};
use async_trait::async_trait;
use tracing::{info, warn};

/// Message id answered by the demo echo route.
const MSG_ECHO: u32 = 1;

struct EchoRouter;

#[async_trait]
impl Router for EchoRouter {
    async fn handle(&self, req: &Request) {
        if let Err(err) = req.conn().send(req.msg_id(), req.data()).await {
            warn!(
                conn_id = req.conn().conn_id(),
                msg_id = req.msg_id(),
                %err,
                "echo reply failed"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Config path comes from argv; with none given the built-in defaults
    // apply, which is enough for a local echo server.
    let cfg = match std::env::args().nth(1) {
        Some(path) => resolve_config_path(&path)
            .and_then(Config::load_from_file)
            .context("failed to resolve or load config")?,
        None => {
            let mut cfg = Config::default();
            cfg.validate_and_normalize()?;
            cfg
        },
    };

    let _logger_guard = init_logger(&cfg.log)?;

    let server = Server::new(cfg);
    server.set_state_store(Arc::new(MemoryStore::new()));
    server.add_router(MSG_ECHO, Arc::new(EchoRouter))?;

    server.set_on_conn_start(|conn| {
        info!(conn_id = conn.conn_id(), peer = %conn.remote_addr(), "player connected");
    });
    server.set_on_conn_stop(|conn| {
        info!(conn_id = conn.conn_id(), "player disconnected");
    });

    server.start().await?;
    server.serve().await;

    Ok(())
}
