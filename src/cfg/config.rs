// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{LogFormat, LogOutput, RotationFreq, StateAdapter};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Listener, framing and dispatch parameters.
    #[serde(default)]
    pub server: ServerConfig,
    /// Log sink configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// World boundary and split thresholds of the AOI quadtree.
    #[serde(default)]
    pub aoi: AoiConfig,
    /// Key/value state store selection.
    #[serde(default)]
    pub state: StateConfig,
    /// Script engine attachment.
    #[serde(default)]
    pub scripting: ScriptingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Human-readable server name used in logs.
    pub name: String,
    pub ip: String,
    pub port: u16,

    /// Admission limit; sockets past it are closed on accept.
    pub max_conn: usize,

    /// Inbound frames with a larger body are rejected and the connection
    /// terminated.
    pub max_packet_size: u32,

    /// Number of long-lived workers. 0 means every request runs in its own
    /// detached task.
    pub worker_pool_size: u32,
    /// Capacity of each worker's task queue.
    pub max_worker_task_len: usize,

    pub read_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub send_msg_timeout_ms: u64,
    pub send_task_queue_timeout_ms: u64,

    /// Capacity of the per-connection "must send" channel.
    pub max_msg_chan_len: usize,
    /// Capacity of the per-connection bulk channel.
    pub max_msg_buff_chan_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ArenaServer".to_string(),
            ip: "0.0.0.0".to_string(),
            port: 8999,
            max_conn: 1000,
            max_packet_size: 4096,
            worker_pool_size: 10,
            max_worker_task_len: 1024,
            read_timeout_ms: 30_000,
            idle_timeout_ms: 600_000,
            send_msg_timeout_ms: 3_000,
            send_task_queue_timeout_ms: 100,
            max_msg_chan_len: 1,
            max_msg_buff_chan_len: 1024,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn send_msg_timeout(&self) -> Duration {
        Duration::from_millis(self.send_msg_timeout_ms)
    }

    pub fn send_task_queue_timeout(&self) -> Duration {
        Duration::from_millis(self.send_task_queue_timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// EnvFilter directive, e.g. "info" or "arena_net=debug".
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Target file; required when output = "file".
    pub file: Option<LogFileConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stdout,
            file: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LogFileConfig {
    pub path: String,
    #[serde(default)]
    pub rotation_frequency: Option<RotationFreq>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct AoiConfig {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
    /// Points a leaf holds before it subdivides.
    pub capacity: usize,
    /// Leaves at this depth stop subdividing and grow unbounded.
    pub max_depth: usize,
    /// Half-width of the square window answered by `query_surround`.
    pub view_range: f32,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 1000.0,
            min_z: 0.0,
            max_z: 1000.0,
            capacity: 4,
            max_depth: 8,
            view_range: 50.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct StateConfig {
    pub adapter: StateAdapter,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            adapter: StateAdapter::Memory,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptingConfig {
    pub enabled: bool,
    pub script_path: String,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            script_path: "./scripts".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from JSON, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        let mut cfg: Config =
            serde_json::from_str(&s).context("failed to parse config JSON")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.server.name.is_empty(), "server.name must not be empty");
        ensure!(self.server.max_conn >= 1, "server.maxConn must be >= 1");
        ensure!(
            self.server.max_packet_size >= 1,
            "server.maxPacketSize must be >= 1"
        );
        ensure!(
            self.server.max_msg_chan_len >= 1,
            "server.maxMsgChanLen must be >= 1"
        );
        ensure!(
            self.server.max_msg_buff_chan_len >= 1,
            "server.maxMsgBuffChanLen must be >= 1"
        );
        if self.server.worker_pool_size > 0 {
            ensure!(
                self.server.max_worker_task_len >= 1,
                "server.maxWorkerTaskLen must be >= 1 with a worker pool"
            );
        }

        ensure!(
            self.aoi.max_x > self.aoi.min_x && self.aoi.max_z > self.aoi.min_z,
            "aoi boundary must have positive extent"
        );
        ensure!(self.aoi.view_range > 0.0, "aoi.viewRange must be > 0");

        // Degenerate split thresholds are clamped rather than rejected.
        self.aoi.capacity = self.aoi.capacity.max(1);
        if self.aoi.max_depth == 0 {
            self.aoi.max_depth = 8;
        }

        Ok(())
    }
}
