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
use tokio::time::sleep;

use super::common::{connect, send_frame, test_config, wait_until};

struct SlowRouter {
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl Router for SlowRouter {
    async fn handle(&self, _req: &Request) {
        self.handled.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(1500)).await;
    }
}

#[tokio::test]
#[serial]
async fn full_worker_queue_drops_requests_without_killing_the_connection() -> Result<()> {
    let mut cfg = test_config(1)?;
    cfg.server.max_worker_task_len = 1;
    cfg.server.send_task_queue_timeout_ms = 100;

    let handled = Arc::new(AtomicUsize::new(0));
    let server = Server::new(cfg);
    server.add_router(5, Arc::new(SlowRouter {
        handled: Arc::clone(&handled),
    }))?;
    server.start().await?;

    let mut client = connect(&server).await?;

    // Worker takes the first request and sleeps; the second fills the
    // queue of size 1; the remaining three wait 100 ms each and get
    // dropped by the enqueue timeout.
    for tag in 0u8..5 {
        send_frame(&mut client, 5, &[tag]).await?;
    }

    wait_until(
        "the queued request to drain",
        || handled.load(Ordering::SeqCst) == 2,
        Duration::from_secs(5),
    )
    .await?;

    // Give any stray request time to surface, then confirm the drops.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(handled.load(Ordering::SeqCst), 2);

    // Back-pressure never terminates the connection: once the worker is
    // free again, new frames flow.
    send_frame(&mut client, 5, &[9]).await?;
    wait_until(
        "the post-drop request",
        || handled.load(Ordering::SeqCst) == 3,
        Duration::from_secs(5),
    )
    .await?;

    server.stop().await;
    Ok(())
}
