// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::net::codec::CodecError;

#[derive(Debug, Error)]
pub enum NetError {
    /// `send*` on a stopped connection. Handlers treat this as benign.
    #[error("connection {0} is closed")]
    ConnectionClosed(u64),

    /// Back-pressure: the "must send" channel stayed full past the
    /// configured timeout. The connection itself is untouched.
    #[error("send of msg {msg_id} timed out after {timeout_ms} ms")]
    SendTimeout { msg_id: u32, timeout_ms: u64 },

    /// Back-pressure: the bulk channel is full; the frame was dropped.
    #[error("bulk channel full, msg {msg_id} dropped")]
    ChannelFull { msg_id: u32 },

    /// Back-pressure: the target worker queue stayed full past the
    /// configured timeout.
    #[error("enqueue to worker {worker_id} timed out")]
    EnqueueTimeout { worker_id: u32 },

    #[error("worker pool is not running")]
    PoolNotRunning,

    #[error("router for msg {0} already registered")]
    DuplicateRouter(u32),

    #[error("connection {0} not found")]
    ConnNotFound(u64),

    #[error("{label} timed out")]
    IoTimeout { label: &'static str },

    #[error("{label} cancelled")]
    Cancelled { label: &'static str },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
