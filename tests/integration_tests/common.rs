// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result, bail};
use arena_net::{cfg::config::Config, net::Server};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, sleep},
};

/// Loopback config on an ephemeral port.
pub fn test_config(pool_size: u32) -> Result<Config> {
    let mut cfg = Config::default();
    cfg.server.ip = "127.0.0.1".to_string();
    cfg.server.port = 0;
    cfg.server.worker_pool_size = pool_size;
    cfg.validate_and_normalize()?;
    Ok(cfg)
}

pub async fn connect(server: &Server) -> Result<TcpStream> {
    let addr = server.local_addr().context("server not started")?;
    Ok(TcpStream::connect(addr).await?)
}

pub async fn send_frame(stream: &mut TcpStream, msg_id: u32, data: &[u8]) -> Result<()> {
    let mut frame = Vec::with_capacity(8 + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(&msg_id.to_le_bytes());
    frame.extend_from_slice(data);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

pub async fn read_frame(stream: &mut TcpStream) -> Result<(u32, Vec<u8>)> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await?;

    let data_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let msg_id = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let mut body = vec![0u8; data_len as usize];
    stream.read_exact(&mut body).await?;
    Ok((msg_id, body))
}

/// Polls a condition until it holds or the deadline passes.
pub async fn wait_until<F>(what: &str, cond: F, max_wait: Duration) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + max_wait;
    while Instant::now() < deadline {
        if cond() {
            return Ok(());
        }
        sleep(Duration::from_millis(20)).await;
    }
    bail!("timed out waiting for {what}")
}
