// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use arena_net::cfg::{
    config::Config,
    enums::{LogFormat, LogOutput, StateAdapter},
};

#[test]
fn defaults_are_valid_and_match_the_documented_values() -> Result<()> {
    let mut cfg = Config::default();
    cfg.validate_and_normalize()?;

    assert_eq!(cfg.server.port, 8999);
    assert_eq!(cfg.server.max_conn, 1000);
    assert_eq!(cfg.server.max_packet_size, 4096);
    assert_eq!(cfg.server.worker_pool_size, 10);
    assert_eq!(cfg.server.max_worker_task_len, 1024);
    assert_eq!(cfg.server.send_msg_timeout_ms, 3000);
    assert_eq!(cfg.server.send_task_queue_timeout_ms, 100);
    assert_eq!(cfg.server.max_msg_chan_len, 1);
    assert_eq!(cfg.server.max_msg_buff_chan_len, 1024);

    assert_eq!(cfg.aoi.max_x, 1000.0);
    assert_eq!(cfg.aoi.capacity, 4);
    assert_eq!(cfg.aoi.max_depth, 8);
    assert_eq!(cfg.aoi.view_range, 50.0);

    assert_eq!(cfg.log.format, LogFormat::Text);
    assert_eq!(cfg.log.output, LogOutput::Stdout);
    assert_eq!(cfg.state.adapter, StateAdapter::Memory);
    assert!(!cfg.scripting.enabled);
    Ok(())
}

#[test]
fn partial_json_overrides_merge_with_defaults() -> Result<()> {
    let raw = r#"{
        "server": { "port": 9100, "workerPoolSize": 2 },
        "aoi": { "viewRange": 25.0 },
        "log": { "level": "debug", "format": "json" }
    }"#;

    let mut cfg: Config = serde_json::from_str(raw)?;
    cfg.validate_and_normalize()?;

    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.server.worker_pool_size, 2);
    // Untouched keys keep their defaults.
    assert_eq!(cfg.server.max_packet_size, 4096);
    assert_eq!(cfg.aoi.view_range, 25.0);
    assert_eq!(cfg.log.level, "debug");
    assert_eq!(cfg.log.format, LogFormat::Json);
    Ok(())
}

#[test]
fn zero_worker_pool_is_allowed() -> Result<()> {
    let mut cfg: Config = serde_json::from_str(r#"{"server": {"workerPoolSize": 0}}"#)?;
    cfg.validate_and_normalize()?;
    assert_eq!(cfg.server.worker_pool_size, 0);
    Ok(())
}

#[test]
fn invalid_limits_are_rejected() -> Result<()> {
    let mut cfg: Config = serde_json::from_str(r#"{"server": {"maxConn": 0}}"#)?;
    assert!(cfg.validate_and_normalize().is_err());

    let mut cfg: Config = serde_json::from_str(r#"{"server": {"maxMsgChanLen": 0}}"#)?;
    assert!(cfg.validate_and_normalize().is_err());

    let mut cfg: Config =
        serde_json::from_str(r#"{"aoi": {"minX": 100.0, "maxX": 0.0}}"#)?;
    assert!(cfg.validate_and_normalize().is_err());
    Ok(())
}

#[test]
fn degenerate_aoi_thresholds_are_clamped() -> Result<()> {
    let mut cfg: Config =
        serde_json::from_str(r#"{"aoi": {"capacity": 0, "maxDepth": 0}}"#)?;
    cfg.validate_and_normalize()?;
    assert_eq!(cfg.aoi.capacity, 1);
    assert_eq!(cfg.aoi.max_depth, 8);
    Ok(())
}
