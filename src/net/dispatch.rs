// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use once_cell::sync::OnceCell;
use tokio::{
    sync::mpsc::{self, error::SendTimeoutError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cfg::config::ServerConfig,
    net::{error::NetError, request::Request, router::Router},
};

/// Router table plus the bounded worker pool.
///
/// Each worker owns its own queue and requests are routed by
/// `conn_id % pool_size`, so all work from one connection lands on one
/// worker in arrival order. The flip side is accepted: per-worker queues
/// avoid head-of-line blocking across workers, but a hot connection makes
/// a hot worker.
pub struct Dispatcher {
    apis: RwLock<HashMap<u32, Arc<dyn Router>>>,
    pool_size: u32,
    queue_len: usize,
    enqueue_timeout: Duration,
    enqueue_timeout_ms: u64,
    senders: OnceCell<Vec<mpsc::Sender<Request>>>,
    stop: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(cfg: &ServerConfig) -> Self {
        Self {
            apis: RwLock::new(HashMap::new()),
            pool_size: cfg.worker_pool_size,
            queue_len: cfg.max_worker_task_len,
            enqueue_timeout: cfg.send_task_queue_timeout(),
            enqueue_timeout_ms: cfg.send_task_queue_timeout_ms,
            senders: OnceCell::new(),
            stop: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Binds a handler trio to a message id. Registering the same id twice
    /// is a programmer error and is reported, not silently replaced. The
    /// table must not change once workers are running.
    pub fn add_router(&self, msg_id: u32, router: Arc<dyn Router>) -> Result<(), NetError> {
        let mut apis = self.apis.write().unwrap_or_else(|e| e.into_inner());
        if apis.contains_key(&msg_id) {
            return Err(NetError::DuplicateRouter(msg_id));
        }
        apis.insert(msg_id, router);
        info!(msg_id, "router registered");
        Ok(())
    }

    /// Runs the handler trio for one request. The trio executes inside its
    /// own task whose join handle is awaited, so a panicking handler is
    /// contained and logged while the worker lives on. A message id with
    /// no router is logged and the request discarded.
    pub async fn dispatch(&self, req: Request) {
        let msg_id = req.msg_id();
        let router = {
            let apis = self.apis.read().unwrap_or_else(|e| e.into_inner());
            apis.get(&msg_id).cloned()
        };
        let Some(router) = router else {
            warn!(msg_id, "no router registered, request dropped");
            return;
        };

        let handle = tokio::spawn(async move {
            router.pre_handle(&req).await;
            router.handle(&req).await;
            router.post_handle(&req).await;
        });

        if let Err(err) = handle.await
            && err.is_panic()
        {
            error!(msg_id, "handler panicked: {err}");
        }
    }

    /// Spawns the workers. A pool size of 0 disables the pool entirely;
    /// the reader then runs each request in a detached task.
    pub fn start_workers(self: &Arc<Self>) {
        if self.pool_size == 0 {
            info!("worker pool disabled, requests run in per-request tasks");
            return;
        }

        let mut senders = Vec::with_capacity(self.pool_size as usize);
        let mut handles = Vec::with_capacity(self.pool_size as usize);
        for worker_id in 0..self.pool_size {
            let (tx, rx) = mpsc::channel(self.queue_len);
            senders.push(tx);

            let dispatcher = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                dispatcher.worker_loop(worker_id, rx).await;
            }));
        }

        if self.senders.set(senders).is_err() {
            warn!("worker pool already started");
            for handle in handles {
                handle.abort();
            }
            return;
        }

        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);
        info!(pool_size = self.pool_size, "worker pool started");
    }

    async fn worker_loop(&self, worker_id: u32, mut queue: mpsc::Receiver<Request>) {
        debug!(worker_id, "worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    // Drain whatever is already queued before exiting.
                    while let Ok(req) = queue.try_recv() {
                        self.dispatch(req).await;
                    }
                    debug!(worker_id, "worker stopped");
                    return;
                },
                maybe = queue.recv() => match maybe {
                    Some(req) => self.dispatch(req).await,
                    None => {
                        debug!(worker_id, "worker queue closed");
                        return;
                    },
                },
            }
        }
    }

    /// Routes a request to its connection's worker, waiting up to the
    /// configured enqueue timeout when the queue is full.
    pub async fn enqueue(&self, req: Request) -> Result<(), NetError> {
        let senders = self.senders.get().ok_or(NetError::PoolNotRunning)?;

        let worker_id = req.conn().worker_id();
        let tx = senders
            .get(worker_id as usize)
            .ok_or(NetError::PoolNotRunning)?;

        match tx.send_timeout(req, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                debug!(
                    worker_id,
                    timeout_ms = self.enqueue_timeout_ms,
                    "worker queue full"
                );
                Err(NetError::EnqueueTimeout { worker_id })
            },
            Err(SendTimeoutError::Closed(_)) => Err(NetError::PoolNotRunning),
        }
    }

    /// Broadcasts stop, lets every worker drain its queue and joins them
    /// all. Idempotent.
    pub async fn stop_workers(&self) {
        if self.stop.is_cancelled() {
            debug!("worker pool already stopped");
            return;
        }
        self.stop.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *workers)
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}
