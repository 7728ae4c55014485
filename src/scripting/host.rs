// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Weak};

use tracing::{error, info};

use crate::{
    net::server::ServerCore,
    scripting::{HostFn, ScriptEngine, ScriptError},
    value::Value,
};

/// The core-side implementation of the host functions scripts may call.
///
/// Holds the server core weakly, mirroring how connections reference it:
/// a script outliving the server gets `ServerGone` instead of keeping the
/// whole engine alive.
pub struct HostBindings {
    core: Weak<ServerCore>,
}

impl HostBindings {
    pub fn new(core: Weak<ServerCore>) -> Arc<Self> {
        Arc::new(Self { core })
    }

    fn core(&self) -> Result<Arc<ServerCore>, ScriptError> {
        self.core.upgrade().ok_or(ScriptError::ServerGone)
    }

    pub fn log_info(&self, msg: &str) {
        info!(target: "script", "{msg}");
    }

    pub fn log_error(&self, msg: &str) {
        error!(target: "script", "{msg}");
    }

    /// Serializes a script table to JSON and sends it on the bulk channel
    /// of the addressed connection.
    pub fn send_msg(&self, conn_id: u64, msg_id: u32, table: &Value) -> Result<(), ScriptError> {
        let core = self.core()?;
        let conn = core
            .registry()
            .get(conn_id)
            .ok_or(ScriptError::ConnNotFound(conn_id))?;

        let payload = serde_json::to_vec(table)?;
        conn.send_buff(msg_id, &payload)?;
        Ok(())
    }

    pub fn get_conn_prop(&self, conn_id: u64, key: &str) -> Result<Value, ScriptError> {
        let core = self.core()?;
        let conn = core
            .registry()
            .get(conn_id)
            .ok_or(ScriptError::ConnNotFound(conn_id))?;

        conn.get_property(key)
            .ok_or_else(|| ScriptError::PropertyNotFound {
                conn_id,
                key: key.to_string(),
            })
    }

    pub fn set_conn_prop(
        &self,
        conn_id: u64,
        key: &str,
        value: Value,
    ) -> Result<(), ScriptError> {
        let core = self.core()?;
        let conn = core
            .registry()
            .get(conn_id)
            .ok_or(ScriptError::ConnNotFound(conn_id))?;

        conn.set_property(key, value);
        Ok(())
    }
}

fn arg_u64(host_fn: &'static str, args: &[Value], index: usize) -> Result<u64, ScriptError> {
    args.get(index)
        .and_then(Value::as_u64)
        .ok_or(ScriptError::BadArgument {
            host_fn,
            index,
            expected: "integer",
        })
}

fn arg_u32(host_fn: &'static str, args: &[Value], index: usize) -> Result<u32, ScriptError> {
    arg_u64(host_fn, args, index).and_then(|v| {
        u32::try_from(v).map_err(|_| ScriptError::BadArgument {
            host_fn,
            index,
            expected: "u32",
        })
    })
}

fn arg_str<'a>(
    host_fn: &'static str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, ScriptError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or(ScriptError::BadArgument {
            host_fn,
            index,
            expected: "string",
        })
}

/// Registers the core host API on an engine: `log_info`, `log_error`,
/// `send_msg`, `get_conn_prop`, `set_conn_prop`.
pub fn register_core_api(
    engine: &dyn ScriptEngine,
    bindings: &Arc<HostBindings>,
) -> Result<(), ScriptError> {
    let b = Arc::clone(bindings);
    let log_info: HostFn = Arc::new(move |args| {
        b.log_info(arg_str("log_info", args, 0)?);
        Ok(Vec::new())
    });
    engine.register_host_fn("log_info", log_info)?;

    let b = Arc::clone(bindings);
    let log_error: HostFn = Arc::new(move |args| {
        b.log_error(arg_str("log_error", args, 0)?);
        Ok(Vec::new())
    });
    engine.register_host_fn("log_error", log_error)?;

    let b = Arc::clone(bindings);
    let send_msg: HostFn = Arc::new(move |args| {
        let conn_id = arg_u64("send_msg", args, 0)?;
        let msg_id = arg_u32("send_msg", args, 1)?;
        let table = args.get(2).ok_or(ScriptError::BadArgument {
            host_fn: "send_msg",
            index: 2,
            expected: "table",
        })?;
        b.send_msg(conn_id, msg_id, table)?;
        Ok(vec![Value::Bool(true)])
    });
    engine.register_host_fn("send_msg", send_msg)?;

    let b = Arc::clone(bindings);
    let get_conn_prop: HostFn = Arc::new(move |args| {
        let conn_id = arg_u64("get_conn_prop", args, 0)?;
        let key = arg_str("get_conn_prop", args, 1)?;
        Ok(vec![b.get_conn_prop(conn_id, key)?])
    });
    engine.register_host_fn("get_conn_prop", get_conn_prop)?;

    let b = Arc::clone(bindings);
    let set_conn_prop: HostFn = Arc::new(move |args| {
        let conn_id = arg_u64("set_conn_prop", args, 0)?;
        let key = arg_str("set_conn_prop", args, 1)?;
        let value = args.get(2).cloned().ok_or(ScriptError::BadArgument {
            host_fn: "set_conn_prop",
            index: 2,
            expected: "value",
        })?;
        b.set_conn_prop(conn_id, key, value)?;
        Ok(vec![Value::Bool(true)])
    });
    engine.register_host_fn("set_conn_prop", set_conn_prop)?;

    info!("core host API registered");
    Ok(())
}
