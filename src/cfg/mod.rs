//! Configuration loading, config-path resolution, and log setup.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Config-path resolution for the daemon binary.
pub mod cli;
/// Configuration schema, defaults and validation.
pub mod config;
/// Enumerations used in configuration.
pub mod enums;
/// Tracing subscriber initialization.
pub mod logger;
