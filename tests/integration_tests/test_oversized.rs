// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use arena_net::net::{Request, Router, Server};
use async_trait::async_trait;
use serial_test::serial;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    time::timeout,
};

use super::common::{connect, test_config};

struct CountingRouter {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Router for CountingRouter {
    async fn handle(&self, _req: &Request) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
#[serial]
async fn oversized_frame_closes_the_connection_without_dispatch() -> Result<()> {
    let mut cfg = test_config(1)?;
    cfg.server.max_packet_size = 16;

    let hits = Arc::new(AtomicUsize::new(0));
    let server = Server::new(cfg);
    server.add_router(1, Arc::new(CountingRouter {
        hits: Arc::clone(&hits),
    }))?;
    server.start().await?;

    let mut client = connect(&server).await?;

    // Header declares 17 bytes of body against a limit of 16.
    let mut frame = Vec::new();
    frame.extend_from_slice(&17u32.to_le_bytes());
    frame.extend_from_slice(&1u32.to_le_bytes());
    frame.extend_from_slice(&[0u8; 17]);
    client.write_all(&frame).await?;
    client.flush().await?;

    // The server must drop us: the next read ends in EOF.
    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await??;
    assert_eq!(n, 0, "expected the server to close the connection");

    assert_eq!(hits.load(Ordering::SeqCst), 0, "no handler may run");

    server.stop().await;
    Ok(())
}
