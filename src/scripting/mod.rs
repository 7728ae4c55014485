// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Host functions the core offers to any embedded script environment.
pub mod host;

use std::{path::Path, sync::Arc};

use thiserror::Error;

pub use host::{HostBindings, register_core_api};

use crate::{net::error::NetError, value::{UnsupportedValue, Value}};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script engine is closed")]
    EngineClosed,
    #[error("script function '{0}' not found")]
    FunctionNotFound(String),
    #[error("host function '{0}' already registered")]
    DuplicateHostFn(String),
    #[error("bad argument {index} for '{host_fn}': expected {expected}")]
    BadArgument {
        host_fn: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("connection {0} not found")]
    ConnNotFound(u64),
    #[error("property '{key}' not found on connection {conn_id}")]
    PropertyNotFound { conn_id: u64, key: String },
    #[error("value cannot cross the script boundary: {0}")]
    Unsupported(#[from] UnsupportedValue),
    #[error("failed to serialize table: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("server core is gone")]
    ServerGone,
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("script engine error: {0}")]
    Engine(String),
}

/// A host function callable from scripts. Arguments and results cross the
/// boundary only as the closed [`Value`] variant.
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, ScriptError> + Send + Sync>;

/// The embedding seam for a script interpreter.
///
/// The interpreter itself lives outside this crate; the core only needs
/// somewhere to register its host functions and a way to call into
/// loaded scripts.
pub trait ScriptEngine: Send + Sync {
    fn init(&self) -> Result<(), ScriptError>;

    fn load_script(&self, path: &Path) -> Result<(), ScriptError>;

    fn register_host_fn(&self, name: &str, func: HostFn) -> Result<(), ScriptError>;

    fn call_function(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, ScriptError>;

    fn close(&self);
}
