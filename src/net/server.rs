// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    net::SocketAddr,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex as StdMutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tokio::{net::TcpListener, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    aoi::AoiManager,
    cfg::config::Config,
    net::{
        connection::Connection, dispatch::Dispatcher, error::NetError,
        registry::ConnRegistry, router::Router,
    },
    scripting::ScriptEngine,
    state::StateStore,
};

/// Bound on how long a stopping server waits for the accept loop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Fired on connection start/stop under a panic boundary.
pub type ConnHook = Box<dyn Fn(&Arc<Connection>) + Send + Sync>;

/// Everything connections and host bindings reach back into: the config
/// handle, the dispatcher, the registry and the gameplay services.
/// Connections hold it weakly so a stopped server can drop it while
/// stragglers finish tearing down.
pub struct ServerCore {
    cfg: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    registry: ConnRegistry,
    aoi: AoiManager,
    state: OnceCell<Arc<dyn StateStore>>,
    script: OnceCell<Arc<dyn ScriptEngine>>,
    on_conn_start: OnceCell<ConnHook>,
    on_conn_stop: OnceCell<ConnHook>,
    next_conn_id: AtomicU64,
}

impl ServerCore {
    fn new(cfg: Arc<Config>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(&cfg.server)),
            registry: ConnRegistry::new(),
            aoi: AoiManager::from_config(&cfg.aoi),
            state: OnceCell::new(),
            script: OnceCell::new(),
            on_conn_start: OnceCell::new(),
            on_conn_stop: OnceCell::new(),
            next_conn_id: AtomicU64::new(0),
            cfg,
        }
    }

    pub fn cfg(&self) -> &Arc<Config> {
        &self.cfg
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &ConnRegistry {
        &self.registry
    }

    pub fn aoi(&self) -> &AoiManager {
        &self.aoi
    }

    pub fn state(&self) -> Option<&Arc<dyn StateStore>> {
        self.state.get()
    }

    pub fn script(&self) -> Option<&Arc<dyn ScriptEngine>> {
        self.script.get()
    }

    pub(crate) fn fire_conn_start(&self, conn: &Arc<Connection>) {
        if let Some(hook) = self.on_conn_start.get()
            && catch_unwind(AssertUnwindSafe(|| hook(conn))).is_err()
        {
            error!(conn_id = conn.conn_id(), "connection start hook panicked");
        }
    }

    pub(crate) fn fire_conn_stop(&self, conn: &Arc<Connection>) {
        if let Some(hook) = self.on_conn_stop.get()
            && catch_unwind(AssertUnwindSafe(|| hook(conn))).is_err()
        {
            error!(conn_id = conn.conn_id(), "connection stop hook panicked");
        }
    }
}

/// The accepting end of the engine.
///
/// Build it from a validated config, register routers and hooks, then
/// `start` and `serve`. `stop` cascades: accept loop, connections,
/// worker pool, script engine, listener, in that order.
pub struct Server {
    core: Arc<ServerCore>,
    exit: CancellationToken,
    accept_task: StdMutex<Option<JoinHandle<()>>>,
    local_addr: OnceCell<SocketAddr>,
}

impl Server {
    pub fn new(cfg: Config) -> Self {
        Self {
            core: Arc::new(ServerCore::new(Arc::new(cfg))),
            exit: CancellationToken::new(),
            accept_task: StdMutex::new(None),
            local_addr: OnceCell::new(),
        }
    }

    /// Shared core, needed to wire host bindings or reach the registry
    /// from outside a handler.
    pub fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    pub fn aoi(&self) -> &AoiManager {
        self.core.aoi()
    }

    pub fn connection(&self, conn_id: u64) -> Option<Arc<Connection>> {
        self.core.registry.get(conn_id)
    }

    pub fn conn_count(&self) -> usize {
        self.core.registry.len()
    }

    /// The actually bound address; differs from the configured one when
    /// the config asked for port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn add_router(&self, msg_id: u32, router: Arc<dyn Router>) -> Result<(), NetError> {
        self.core.dispatcher.add_router(msg_id, router)
    }

    pub fn set_on_conn_start<F>(&self, hook: F)
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        if self.core.on_conn_start.set(Box::new(hook)).is_err() {
            warn!("connection start hook already set");
        }
    }

    pub fn set_on_conn_stop<F>(&self, hook: F)
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        if self.core.on_conn_stop.set(Box::new(hook)).is_err() {
            warn!("connection stop hook already set");
        }
    }

    pub fn set_state_store(&self, store: Arc<dyn StateStore>) {
        if self.core.state.set(store).is_err() {
            warn!("state store already set");
        }
    }

    pub fn set_script_engine(&self, engine: Arc<dyn ScriptEngine>) {
        if self.core.script.set(engine).is_err() {
            warn!("script engine already set");
        }
    }

    /// Initializes attached collaborators, starts the worker pool, binds
    /// the listener and launches the accept loop. Non-blocking; pair with
    /// `serve` to wait for shutdown.
    pub async fn start(&self) -> Result<()> {
        let server_cfg = &self.core.cfg.server;
        info!(
            name = %server_cfg.name,
            addr = %server_cfg.addr(),
            pool_size = server_cfg.worker_pool_size,
            max_conn = server_cfg.max_conn,
            "starting server"
        );

        if let Some(script) = self.core.script.get() {
            script.init().context("failed to init script engine")?;
        }

        self.core.dispatcher.start_workers();

        let listener = TcpListener::bind(server_cfg.addr())
            .await
            .with_context(|| format!("failed to bind {}", server_cfg.addr()))?;
        let bound = listener.local_addr().context("listener has no local addr")?;
        let _ = self.local_addr.set(bound);

        let core = Arc::clone(&self.core);
        let exit = self.exit.clone();
        let handle = tokio::spawn(async move {
            accept_loop(core, listener, exit).await;
        });
        *self
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);

        info!(addr = %bound, "server started");
        Ok(())
    }

    /// Blocks until Ctrl-C or a programmatic `stop`.
    pub async fn serve(&self) {
        tokio::select! {
            _ = self.exit.cancelled() => {},
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => {
                        info!("received interrupt signal, stopping server");
                        self.stop().await;
                    },
                    Err(err) => {
                        warn!(%err, "cannot listen for interrupt, waiting for stop");
                        self.exit.cancelled().await;
                    },
                }
            },
        }
    }

    /// Cascaded shutdown. Idempotent; later callers return immediately.
    pub async fn stop(&self) {
        if self.exit.is_cancelled() {
            return;
        }
        info!(name = %self.core.cfg.server.name, "stopping server");
        self.exit.cancel();

        let handle = self
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("accept loop did not exit within grace period");
            }
        }

        self.core.registry.clear();
        self.core.dispatcher.stop_workers().await;

        if let Some(script) = self.core.script.get() {
            script.close();
        }

        info!(name = %self.core.cfg.server.name, "server stopped");
    }
}

async fn accept_loop(core: Arc<ServerCore>, listener: TcpListener, exit: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = exit.cancelled() => break,
            res = listener.accept() => res,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            },
        };

        let max_conn = core.cfg.server.max_conn;
        if core.registry.len() >= max_conn {
            warn!(%peer, max_conn, "connection limit reached, closing socket");
            drop(stream);
            continue;
        }

        let conn_id = core.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
        let pool_size = core.cfg.server.worker_pool_size;
        let worker_id = if pool_size > 0 {
            (conn_id % u64::from(pool_size)) as u32
        } else {
            0
        };

        let weak: Weak<ServerCore> = Arc::downgrade(&core);
        match Connection::new(Arc::clone(&core.cfg), weak, stream, conn_id, worker_id) {
            Ok(conn) => {
                core.registry.add(Arc::clone(&conn));
                conn.start();
                info!(conn_id, %peer, worker_id, "connection prepared");
            },
            Err(err) => {
                warn!(%peer, %err, "failed to prepare connection");
            },
        }
    }
    // The listener drops here, releasing the port.
}
