// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    net::SocketAddr,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex as StdMutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Result;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{
        Mutex,
        mpsc::{self, error::SendTimeoutError, error::TrySendError},
    },
    time::{Instant, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::Config,
    net::{
        codec::{self, CodecError, Message},
        error::NetError,
        io::io_with_timeout,
        request::Request,
        server::ServerCore,
    },
    value::Value,
};

/// Fired when the connection stops, after the server-level stop hook.
pub type CloseCallback = Box<dyn Fn(&Connection) -> Result<()> + Send + Sync>;

/// One accepted socket and everything that serves it.
///
/// A connection owns exactly one reader task and one writer task. The
/// reader parses frames and hands requests to the worker pool; the writer
/// drains the two outbound channels, always preferring `msg` over
/// `msg_buff`. Lifecycle is strictly one-way: preparing, active,
/// stopping, stopped. Stop is idempotent and only the first caller
/// performs teardown.
pub struct Connection {
    conn_id: u64,
    worker_id: u32,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,

    cfg: Arc<Config>,
    /// Weak so that a stopped server can drop its core while stragglers
    /// are still tearing down.
    core: Weak<ServerCore>,

    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,

    closed: AtomicBool,

    /// Opaque per-connection key/value storage for handlers and scripts.
    properties: DashMap<String, Value>,

    msg_tx: mpsc::Sender<Bytes>,
    buff_tx: mpsc::Sender<Bytes>,
    msg_rx: StdMutex<Option<mpsc::Receiver<Bytes>>>,
    buff_rx: StdMutex<Option<mpsc::Receiver<Bytes>>>,

    cancel: CancellationToken,
    close_callback: OnceCell<CloseCallback>,

    last_activity: StdMutex<Instant>,
}

impl Connection {
    pub(crate) fn new(
        cfg: Arc<Config>,
        core: Weak<ServerCore>,
        stream: TcpStream,
        conn_id: u64,
        worker_id: u32,
    ) -> Result<Arc<Self>, NetError> {
        stream.set_linger(None)?;
        stream.set_nodelay(true)?;

        let remote_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let (r, w) = stream.into_split();

        let (msg_tx, msg_rx) = mpsc::channel(cfg.server.max_msg_chan_len);
        let (buff_tx, buff_rx) = mpsc::channel(cfg.server.max_msg_buff_chan_len);

        Ok(Arc::new(Self {
            conn_id,
            worker_id,
            remote_addr,
            local_addr,
            cfg,
            core,
            reader: Mutex::new(r),
            writer: Mutex::new(w),
            closed: AtomicBool::new(false),
            properties: DashMap::new(),
            msg_tx,
            buff_tx,
            msg_rx: StdMutex::new(Some(msg_rx)),
            buff_rx: StdMutex::new(Some(buff_rx)),
            cancel: CancellationToken::new(),
            close_callback: OnceCell::new(),
            last_activity: StdMutex::new(Instant::now()),
        }))
    }

    /// Launches the reader and writer tasks and fires the user start hook.
    pub fn start(self: &Arc<Self>) {
        if self.is_closed() {
            return;
        }

        let msg_rx = self
            .msg_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let buff_rx = self
            .buff_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let (Some(msg_rx), Some(buff_rx)) = (msg_rx, buff_rx) else {
            warn!(conn_id = self.conn_id, "connection already started");
            return;
        };

        let writer = Arc::clone(self);
        tokio::spawn(async move {
            writer.write_loop(msg_rx, buff_rx).await;
        });

        let reader = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = reader.read_loop().await {
                warn!(conn_id = reader.conn_id, %err, "read loop exited");
            }
            reader.stop();
        });

        if let Some(core) = self.core.upgrade() {
            core.fire_conn_start(self);
        }
        debug!(conn_id = self.conn_id, "connection started");
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cancelled when the connection stops; handlers holding long waits
    /// should race against it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Packs and enqueues a frame on the "must send" channel, blocking up
    /// to `send_msg_timeout_ms`. Timing out is back-pressure to the
    /// caller, not a connection failure.
    pub async fn send(&self, msg_id: u32, data: &[u8]) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::ConnectionClosed(self.conn_id));
        }

        let frame = codec::pack(&Message::new(msg_id, Bytes::copy_from_slice(data)));
        match self
            .msg_tx
            .send_timeout(frame, self.cfg.server.send_msg_timeout())
            .await
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(NetError::SendTimeout {
                msg_id,
                timeout_ms: self.cfg.server.send_msg_timeout_ms,
            }),
            Err(SendTimeoutError::Closed(_)) => {
                Err(NetError::ConnectionClosed(self.conn_id))
            },
        }
    }

    /// Packs and enqueues a frame on the bulk channel without blocking.
    /// Used for broadcasts where dropping on congestion beats stalling
    /// the caller.
    pub fn send_buff(&self, msg_id: u32, data: &[u8]) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::ConnectionClosed(self.conn_id));
        }

        let frame = codec::pack(&Message::new(msg_id, Bytes::copy_from_slice(data)));
        match self.buff_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NetError::ChannelFull { msg_id }),
            Err(TrySendError::Closed(_)) => {
                Err(NetError::ConnectionClosed(self.conn_id))
            },
        }
    }

    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties.get(key).map(|v| v.value().clone())
    }

    pub fn remove_property(&self, key: &str) {
        self.properties.remove(key);
    }

    /// Registers a callback fired once during stop, after the server-level
    /// stop hook. Only the first registration wins.
    pub fn set_close_callback(&self, callback: CloseCallback) {
        if self.close_callback.set(callback).is_err() {
            warn!(conn_id = self.conn_id, "close callback already set");
        }
    }

    /// Stops the connection. Idempotent; the first caller cancels both
    /// I/O tasks, fires the stop hook and close callback under panic
    /// boundaries and removes the connection from the registry. Every
    /// step tolerates downstream resources being gone already.
    pub fn stop(self: &Arc<Self>) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        debug!(conn_id = self.conn_id, "stopping connection");
        self.cancel.cancel();

        if let Some(core) = self.core.upgrade() {
            core.fire_conn_stop(self);
        }

        if let Some(callback) = self.close_callback.get() {
            match catch_unwind(AssertUnwindSafe(|| callback(self))) {
                Ok(Ok(())) => {},
                Ok(Err(err)) => {
                    warn!(conn_id = self.conn_id, %err, "close callback failed");
                },
                Err(_) => {
                    warn!(conn_id = self.conn_id, "close callback panicked");
                },
            }
        }

        if let Some(core) = self.core.upgrade()
            && let Err(err) = core.registry().remove(self.conn_id)
        {
            debug!(conn_id = self.conn_id, %err, "not in registry on stop");
        }

        debug!(conn_id = self.conn_id, "connection stopped");
    }

    /// Frame loop. Returns `Ok` on clean teardown (peer EOF, idle timeout,
    /// cancellation); any `Err` is a protocol or transport failure worth
    /// surfacing before the connection dies.
    async fn read_loop(self: &Arc<Self>) -> Result<(), NetError> {
        let max_packet_size = self.cfg.server.max_packet_size;
        let idle_timeout = self.cfg.server.idle_timeout();
        let read_timeout = self.cfg.server.read_timeout();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let header = {
                let mut r = self.reader.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    res = timeout(idle_timeout, codec::read_header(&mut *r, max_packet_size)) => {
                        match res {
                            Ok(Ok(header)) => header,
                            // Only a clean close stops quietly; a header
                            // cut short, an oversized frame and transport
                            // failures are all surfaced.
                            Ok(Err(CodecError::Eof)) => {
                                debug!(conn_id = self.conn_id, "peer closed the stream");
                                return Ok(());
                            },
                            Ok(Err(err)) => return Err(err.into()),
                            Err(_) => {
                                debug!(conn_id = self.conn_id, "idle timeout, stopping");
                                return Ok(());
                            },
                        }
                    },
                }
            };

            // The body lands in storage this connection owns, so its size
            // is bounded by max_packet_size per frame.
            let data = if header.data_len > 0 {
                let mut body = BytesMut::zeroed(header.data_len as usize);
                {
                    let mut r = self.reader.lock().await;
                    match io_with_timeout(
                        "read body",
                        r.read_exact(&mut body[..]),
                        read_timeout,
                        &self.cancel,
                    )
                    .await
                    {
                        Ok(_) => {},
                        Err(NetError::Cancelled { .. }) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                }
                body.freeze()
            } else {
                Bytes::new()
            };

            self.touch();

            let req = Request::new(Arc::clone(self), Message::new(header.id, data));

            let Some(core) = self.core.upgrade() else {
                return Ok(());
            };
            if core.dispatcher().pool_size() > 0 {
                if let Err(err) = core.dispatcher().enqueue(req).await {
                    warn!(
                        conn_id = self.conn_id,
                        msg_id = header.id,
                        %err,
                        "failed to enqueue request"
                    );
                }
            } else {
                let dispatcher = Arc::clone(core.dispatcher());
                tokio::spawn(async move {
                    dispatcher.dispatch(req).await;
                });
            }
        }
    }

    /// Drains the outbound channels until cancelled or the transport
    /// fails, then half-closes the write side.
    async fn write_loop(
        self: Arc<Self>,
        mut msg_rx: mpsc::Receiver<Bytes>,
        mut buff_rx: mpsc::Receiver<Bytes>,
    ) {
        debug!(conn_id = self.conn_id, "writer started");

        loop {
            // Biased select drains the "must send" channel first; the two
            // channels promise no order relative to each other.
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(frame) = msg_rx.recv() => frame,
                Some(frame) = buff_rx.recv() => frame,
            };

            if let Err(err) = self.write_frame(frame).await {
                warn!(conn_id = self.conn_id, %err, "write failed");
                self.stop();
                break;
            }
        }

        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
        debug!(conn_id = self.conn_id, "writer stopped");
    }

    async fn write_frame(&self, frame: Bytes) -> Result<(), NetError> {
        let mut w = self.writer.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(NetError::Cancelled { label: "write frame" });
            },
            res = async {
                w.write_all(&frame).await?;
                w.flush().await
            } => res?,
        }
        self.touch();
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("conn_id", &self.conn_id)
            .field("worker_id", &self.worker_id)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
