// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use arena_net::net::{Request, Router, Server};
use async_trait::async_trait;
use serial_test::serial;
use tokio::{io::AsyncReadExt, time::timeout};

use super::common::{connect, read_frame, send_frame, test_config, wait_until};

struct EchoRouter;

#[async_trait]
impl Router for EchoRouter {
    async fn handle(&self, req: &Request) {
        req.conn()
            .send(req.msg_id(), req.data())
            .await
            .expect("echo send");
    }
}

#[tokio::test]
#[serial]
async fn connections_past_the_limit_are_closed_immediately() -> Result<()> {
    let mut cfg = test_config(1)?;
    cfg.server.max_conn = 1;

    let server = Server::new(cfg);
    server.add_router(7, Arc::new(EchoRouter))?;
    server.start().await?;

    let mut first = connect(&server).await?;
    wait_until(
        "the first connection to register",
        || server.conn_count() == 1,
        Duration::from_secs(5),
    )
    .await?;

    // The second socket is admitted by the OS but closed by the server.
    let mut second = connect(&server).await?;
    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(5), second.read(&mut buf)).await??;
    assert_eq!(n, 0, "expected the server to reject the second connection");

    // The first connection is unaffected.
    send_frame(&mut first, 7, b"ping").await?;
    let (msg_id, body) = read_frame(&mut first).await?;
    assert_eq!(msg_id, 7);
    assert_eq!(body, b"ping");

    server.stop().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn stopping_a_connection_frees_an_admission_slot() -> Result<()> {
    let mut cfg = test_config(1)?;
    cfg.server.max_conn = 1;

    let server = Server::new(cfg);
    server.add_router(7, Arc::new(EchoRouter))?;
    server.start().await?;

    let first = connect(&server).await?;
    wait_until(
        "the first connection to register",
        || server.conn_count() == 1,
        Duration::from_secs(5),
    )
    .await?;

    drop(first);
    wait_until(
        "the slot to free",
        || server.conn_count() == 0,
        Duration::from_secs(5),
    )
    .await?;

    let mut replacement = connect(&server).await?;
    send_frame(&mut replacement, 7, b"hi").await?;
    let (msg_id, body) = read_frame(&mut replacement).await?;
    assert_eq!(msg_id, 7);
    assert_eq!(body, b"hi");

    server.stop().await;
    Ok(())
}
